use crate::auth::{require_bearer, TokenAuthenticator};
use crate::error::ApiError;
use crate::handlers;
use crate::openapi;
use axum::{http::Uri, middleware, routing::get, routing::MethodRouter, Router};
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<TokenAuthenticator>,
}

/// Whether a route sits behind the bearer auth gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Bearer,
}

/// Route table built once at startup.
///
/// Request order: CORS (answers preflight itself) → trace → route match →
/// auth gate for `Access::Bearer` routes → handler. Unmatched paths get a 404.
pub struct RouteTable {
    state: AppState,
    public: Router<AppState>,
    protected: Router<AppState>,
    has_protected: bool,
}

impl RouteTable {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            public: Router::new(),
            protected: Router::new(),
            has_protected: false,
        }
    }

    pub fn route(mut self, path: &str, method_router: MethodRouter<AppState>, access: Access) -> Self {
        match access {
            Access::Public => self.public = self.public.route(path, method_router),
            Access::Bearer => {
                self.protected = self.protected.route(path, method_router);
                self.has_protected = true;
            }
        }
        self
    }

    /// Mount a prebuilt public router, such as the documentation UI
    pub fn merge(mut self, router: impl Into<Router<AppState>>) -> Self {
        self.public = self.public.merge(router);
        self
    }

    pub fn build(self) -> Router {
        let mut router = self.public;

        // route_layer panics on a router without routes
        if self.has_protected {
            let protected = self.protected.route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                require_bearer,
            ));
            router = router.merge(protected);
        }

        router
            .fallback(not_found)
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer())
            .with_state(self.state)
    }
}

/// Any origin, method and header
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

/// Create the application router with every registered route
pub fn create_app(state: AppState) -> Router {
    RouteTable::new(state)
        .route("/", get(handlers::index), Access::Public)
        .route("/Home", get(handlers::home), Access::Public)
        .merge(openapi::swagger_ui())
        .build()
}

/// Bind the listener and serve until Ctrl-C or SIGTERM
pub async fn run_server(
    port: u16,
    authenticator: Arc<TokenAuthenticator>,
) -> Result<(), std::io::Error> {
    let app = create_app(AppState { authenticator });

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);
    info!("Swagger UI: http://localhost:{}{}/", port, openapi::SWAGGER_UI_PATH);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
