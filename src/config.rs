use serde::Deserialize;
use std::convert::Infallible;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "appsettings.json";
const DEFAULT_SQLITE_URL: &str = "sqlite://webapi.db";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("AppSettings.Secret is missing or empty")]
    MissingSecret,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("{0} validation is enabled but no expected value is configured")]
    MissingValidationTarget(&'static str),

    #[error("No connection string configured for the {0} provider")]
    MissingConnectionString(Provider),

    #[error("Connection string scheme {scheme} does not match the {provider} provider")]
    ProviderMismatch { provider: Provider, scheme: String },

    #[error("Invalid connection string: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Hosting environment. Only `Production` changes behavior; any other
/// name is accepted and kept for logs and the settings overlay.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
    Other(String),
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Case-insensitive; a blank name means `Development`
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        match name.to_ascii_lowercase().as_str() {
            "" | "development" => Environment::Development,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            _ => Environment::Other(name.to_string()),
        }
    }
}

impl FromStr for Environment {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Environment::from_name(s))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "Development",
            Environment::Staging => "Staging",
            Environment::Production => "Production",
            Environment::Other(name) => name.as_str(),
        };
        f.write_str(name)
    }
}

/// Database provider, chosen once from the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Sqlite,
    Postgres,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Sqlite => f.write_str("sqlite"),
            Provider::Postgres => f.write_str("postgres"),
        }
    }
}

/// Token validation settings
#[derive(Clone)]
pub struct AppSettings {
    /// Symmetric key used to sign and verify bearer tokens
    pub secret: Vec<u8>,

    /// Reject tokens whose `iss` differs from `issuer`
    pub validate_issuer: bool,
    pub issuer: Option<String>,

    /// Reject tokens whose `aud` differs from `audience`
    pub validate_audience: bool,
    pub audience: Option<String>,
}

impl AppSettings {
    /// Settings with only a secret; issuer and audience checks disabled
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            validate_issuer: false,
            issuer: None,
            validate_audience: false,
            audience: None,
        }
    }
}

// The secret never reaches logs.
impl fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSettings")
            .field("secret", &"<redacted>")
            .field("validate_issuer", &self.validate_issuer)
            .field("issuer", &self.issuer)
            .field("validate_audience", &self.validate_audience)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub provider: Provider,
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn sqlite(url: impl Into<String>) -> Self {
        Self {
            provider: Provider::Sqlite,
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Server host for logging without credentials. SQLite has no host.
    pub fn host(&self) -> Option<String> {
        if self.provider != Provider::Postgres {
            return None;
        }
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

/// Configuration file format (appsettings.json)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConfigFile {
    #[serde(default)]
    app_settings: AppSettingsFile,
    #[serde(default)]
    connection_strings: ConnectionStringsFile,
    port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AppSettingsFile {
    secret: Option<String>,
    validate_issuer: Option<bool>,
    issuer: Option<String>,
    validate_audience: Option<bool>,
    audience: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConnectionStringsFile {
    web_api_database: Option<String>,
    sqlite_database: Option<String>,
}

impl ConfigFile {
    /// Fields set in `overlay` win over fields set in `self`
    fn merge(self, overlay: ConfigFile) -> ConfigFile {
        let base = self.app_settings;
        let top = overlay.app_settings;
        ConfigFile {
            app_settings: AppSettingsFile {
                secret: top.secret.or(base.secret),
                validate_issuer: top.validate_issuer.or(base.validate_issuer),
                issuer: top.issuer.or(base.issuer),
                validate_audience: top.validate_audience.or(base.validate_audience),
                audience: top.audience.or(base.audience),
            },
            connection_strings: ConnectionStringsFile {
                web_api_database: overlay
                    .connection_strings
                    .web_api_database
                    .or(self.connection_strings.web_api_database),
                sqlite_database: overlay
                    .connection_strings
                    .sqlite_database
                    .or(self.connection_strings.sqlite_database),
            },
            port: overlay.port.or(self.port),
        }
    }

    /// Read a file if it exists; a missing file is an empty layer
    fn read_optional(path: &Path) -> Result<ConfigFile, ConfigError> {
        if !path.exists() {
            return Ok(ConfigFile::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Base file plus the `{stem}.{Environment}.json` overlay next to it
    fn load_layered(base: &Path, environment: &Environment) -> Result<ConfigFile, ConfigError> {
        let base_layer = Self::read_optional(base)?;
        let overlay_path = environment_overlay_path(base, environment);
        let overlay = Self::read_optional(&overlay_path)?;
        Ok(base_layer.merge(overlay))
    }
}

fn environment_overlay_path(base: &Path, environment: &Environment) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("appsettings");
    base.with_file_name(format!("{}.{}.json", stem, environment))
}

/// Process-wide configuration, built once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,

    pub app_settings: AppSettings,

    pub database: DatabaseConfig,

    /// HTTP listen port
    pub port: u16,
}

impl Config {
    /// Load the JSON settings files, then environment variable overrides.
    /// `.env` is loaded by the binary before this runs.
    ///
    /// Files: `APP_CONFIG_PATH` (default `appsettings.json`) and its
    /// `appsettings.{Environment}.json` overlay. Both are optional.
    pub fn from_env_or_file() -> Result<Self, ConfigError> {
        let environment = env::var("APP_ENVIRONMENT")
            .map(|value| Environment::from_name(&value))
            .unwrap_or_default();

        let config_path = env::var("APP_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let file = ConfigFile::load_layered(&config_path, &environment)?;

        Self::resolve(environment, file, |key| env::var(key).ok())
    }

    /// Combine a file layer with overrides from `lookup` (environment variables)
    fn resolve<F>(environment: Environment, file: ConfigFile, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("APP_SETTINGS__SECRET")
            .or(file.app_settings.secret)
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        let validate_issuer = match lookup("APP_SETTINGS__VALIDATE_ISSUER") {
            Some(value) => parse_bool("APP_SETTINGS__VALIDATE_ISSUER", &value)?,
            None => file.app_settings.validate_issuer.unwrap_or(false),
        };
        let issuer = lookup("APP_SETTINGS__ISSUER").or(file.app_settings.issuer);
        if validate_issuer && issuer.is_none() {
            return Err(ConfigError::MissingValidationTarget("Issuer"));
        }

        let validate_audience = match lookup("APP_SETTINGS__VALIDATE_AUDIENCE") {
            Some(value) => parse_bool("APP_SETTINGS__VALIDATE_AUDIENCE", &value)?,
            None => file.app_settings.validate_audience.unwrap_or(false),
        };
        let audience = lookup("APP_SETTINGS__AUDIENCE").or(file.app_settings.audience);
        if validate_audience && audience.is_none() {
            return Err(ConfigError::MissingValidationTarget("Audience"));
        }

        let provider = if environment.is_production() {
            Provider::Postgres
        } else {
            Provider::Sqlite
        };

        let url = match provider {
            Provider::Postgres => lookup("DATABASE_URL")
                .or_else(|| lookup("CONNECTION_STRINGS__WEB_API_DATABASE"))
                .or(file.connection_strings.web_api_database)
                .ok_or(ConfigError::MissingConnectionString(provider))?,
            Provider::Sqlite => lookup("DATABASE_URL")
                .or_else(|| lookup("CONNECTION_STRINGS__SQLITE_DATABASE"))
                .or(file.connection_strings.sqlite_database)
                .unwrap_or_else(|| DEFAULT_SQLITE_URL.to_string()),
        };
        check_scheme(provider, &url)?;

        let port = match lookup("PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                value,
            })?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        };

        Ok(Config {
            environment,
            app_settings: AppSettings {
                secret: secret.into_bytes(),
                validate_issuer,
                issuer,
                validate_audience,
                audience,
            },
            database: DatabaseConfig {
                provider,
                url,
                max_connections: DEFAULT_MAX_CONNECTIONS,
            },
            port,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn check_scheme(provider: Provider, connection: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(connection)?;
    let scheme = parsed.scheme();
    let matches = match provider {
        Provider::Sqlite => scheme == "sqlite",
        Provider::Postgres => scheme == "postgres" || scheme == "postgresql",
    };

    if matches {
        Ok(())
    } else {
        Err(ConfigError::ProviderMismatch {
            provider,
            scheme: scheme.to_string(),
        })
    }
}
