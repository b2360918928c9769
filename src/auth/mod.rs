pub mod jwt;
pub mod middleware;
pub mod token_validator;
pub mod types;

pub use middleware::require_bearer;
pub use token_validator::TokenAuthenticator;
pub use types::{Audience, AuthError, Claims, Principal};
