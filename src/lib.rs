pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod http_server;
pub mod openapi;

pub use auth::{AuthError, Principal, TokenAuthenticator};
pub use config::{AppSettings, Config, ConfigError, DatabaseConfig, Environment, Provider};
pub use db::{Database, DbError, SqlUserDirectory, UserDirectory};
pub use error::ApiError;
pub use http_server::{create_app, run_server, Access, AppState, RouteTable};
