//! Bearer token signing and verification (HS256).
//!
//! Signature and expiry checks are delegated to `jsonwebtoken`. Issuer and
//! audience are checked only when enabled in [`AppSettings`].

use super::types::{Audience, AuthError, Claims};
use crate::config::AppSettings;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

/// Allowed clock drift when checking `exp`, in seconds
pub const CLOCK_SKEW_SECONDS: u64 = 300;

/// A compact JWS has three non-empty dot-separated segments.
pub fn is_well_formed(token: &str) -> bool {
    let mut segments = 0;
    for segment in token.split('.') {
        if segment.is_empty() {
            return false;
        }
        segments += 1;
    }
    segments == 3
}

/// Build the validation rules for `settings`
pub fn validation_for(settings: &AppSettings) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_SECONDS;

    let mut required = vec!["exp"];

    match (&settings.issuer, settings.validate_issuer) {
        (Some(issuer), true) => {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        _ => validation.iss = None,
    }

    match (&settings.audience, settings.validate_audience) {
        (Some(audience), true) => {
            validation.set_audience(&[audience]);
            required.push("aud");
        }
        _ => validation.validate_aud = false,
    }

    validation.set_required_spec_claims(required.as_slice());
    validation
}

/// Verify signature and expiry and return the token's claims
pub fn decode_claims(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<Claims, AuthError> {
    if !is_well_formed(token) {
        return Err(AuthError::MalformedToken);
    }

    decode::<Claims>(token, key, validation)
        .map(|data| data.claims)
        .map_err(map_jwt_error)
}

/// Sign a token for `user_id` that expires after `ttl`
pub fn issue_token(settings: &AppSettings, user_id: i64, ttl: Duration) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + ttl).timestamp().max(0) as u64,
        iat: Some(now.timestamp().max(0) as u64),
        iss: settings.issuer.clone(),
        aud: settings.audience.clone().map(Audience::One),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&settings.secret),
    )
    .map_err(|e| AuthError::Signing(e.to_string()))
}

fn map_jwt_error(error: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    match error.kind() {
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => AuthError::ClaimMismatch,
        _ => AuthError::MalformedToken,
    }
}
