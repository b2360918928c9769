use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webapi_server::{Config, Database, SqlUserDirectory, TokenAuthenticator, UserDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // LOG_FORMAT=json for production, pretty (or unset) for development
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "webapi_server=info,tower_http=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let config = Config::from_env_or_file()?;
    info!(
        environment = %config.environment,
        provider = %config.database.provider,
        "Configuration loaded"
    );

    let database = Database::connect(&config.database).await?;
    database.migrate().await?;

    let directory: Arc<dyn UserDirectory> = Arc::new(SqlUserDirectory::new(database));
    let authenticator = Arc::new(TokenAuthenticator::new(&config.app_settings, directory));

    webapi_server::run_server(config.port, authenticator).await?;

    Ok(())
}
