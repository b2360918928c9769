use crate::auth::jwt;
use crate::auth::types::{AuthError, Principal};
use crate::config::AppSettings;
use crate::db::UserDirectory;
use jsonwebtoken::{DecodingKey, Validation};
use std::sync::Arc;
use tracing::{debug, warn};

/// Validates bearer tokens and confirms the subject still exists.
///
/// No caching: every call reads the user directory, so deleting a user
/// rejects that user's tokens from the next request on.
pub struct TokenAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
    directory: Arc<dyn UserDirectory>,
}

impl TokenAuthenticator {
    pub fn new(settings: &AppSettings, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(&settings.secret),
            validation: jwt::validation_for(settings),
            directory,
        }
    }

    /// Validate `token` and resolve its subject to a user.
    ///
    /// Returns the specific rejection reason; callers must not expose it
    /// to clients.
    pub async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = jwt::decode_claims(token, &self.decoding_key, &self.validation)?;

        let user_id: i64 = claims.sub.parse().map_err(|_| {
            warn!(
                subject = %claims.sub,
                error_type = "malformed_subject",
                "Token subject is not a user id"
            );
            AuthError::MalformedSubject
        })?;

        match self.directory.get_by_id(user_id).await {
            Ok(Some(user)) => {
                debug!(user_id = user.id, "Token validated successfully");
                Ok(Principal {
                    user_id: user.id,
                    token: token.to_string(),
                })
            }
            Ok(None) => {
                warn!(
                    user_id,
                    error_type = "user_not_found",
                    "Token subject no longer exists"
                );
                Err(AuthError::UserNotFound)
            }
            Err(e) => {
                warn!(
                    user_id,
                    error = %e,
                    error_type = "directory_error",
                    "User lookup failed during token validation"
                );
                Err(AuthError::Directory(e))
            }
        }
    }
}
