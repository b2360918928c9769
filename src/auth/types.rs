use crate::db::DbError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims carried by bearer tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a decimal string
    pub sub: String,
    /// Expiry (seconds since UNIX epoch)
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
}

/// `aud` may be a single string or an array of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

/// Identity resolved from a validated bearer token, scoped to one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    /// The raw bearer token the request was authenticated with
    pub token: String,
}

/// Reasons a bearer token is rejected.
///
/// These are for server-side logs only; clients see a single 401.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token issuer or audience mismatch")]
    ClaimMismatch,

    #[error("Malformed subject")]
    MalformedSubject,

    #[error("User no longer exists")]
    UserNotFound,

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("User directory unavailable: {0}")]
    Directory(#[from] DbError),
}

impl AuthError {
    /// Short machine-readable label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::ClaimMismatch => "claim_mismatch",
            AuthError::MalformedSubject => "malformed_subject",
            AuthError::UserNotFound => "user_not_found",
            AuthError::Signing(_) => "signing_failed",
            AuthError::Directory(_) => "directory_error",
        }
    }
}
