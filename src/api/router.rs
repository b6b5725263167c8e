//! API router configuration.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{any, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    add_account, api_info, cancel_prompt, clear_accounts, current_prompt, get_config, health,
    list_accounts, refresh_config, set_active, set_client_version, submit_code, toggle_active,
    AppState,
};
use super::websocket::events_handler;
use crate::error::BrokerError;
use crate::security::auth_middleware;

/// Create the API router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    let account_routes = Router::new()
        .route("/", get(list_accounts).post(add_account).delete(clear_accounts))
        .route("/active", put(set_active))
        .route("/{id}/toggle", post(toggle_active));

    let multifactor_routes = Router::new()
        .route("/", get(current_prompt))
        .route("/{id}/code", post(submit_code))
        .route("/{id}/cancel", post(cancel_prompt));

    let config_routes = Router::new()
        .route("/{region}", get(get_config))
        .route("/{region}/refresh", post(refresh_config));

    let api_v1 = Router::new()
        .route("/", get(api_info))
        .route("/client-version", put(set_client_version))
        .route("/events", any(events_handler))
        .nest("/accounts", account_routes)
        .nest("/multifactor", multifactor_routes)
        .nest("/configs", config_routes);

    let keys = Arc::clone(&state.keys);
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(middleware::from_fn_with_state(keys, auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Stop accepting connections and drain on Ctrl+C.
    pub graceful_shutdown: bool,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            graceful_shutdown: true,
        }
    }

    pub fn without_graceful_shutdown(mut self) -> Self {
        self.graceful_shutdown = false;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 3900)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// Start the API server.
pub async fn serve(config: ServerConfig, state: AppState) -> crate::Result<()> {
    let addr = config.bind_address();
    let router = create_router(state);

    tracing::info!("Starting account-broker API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(BrokerError::Io)?;

    let server = axum::serve(listener, router);
    let result = if config.graceful_shutdown {
        server.with_graceful_shutdown(shutdown_signal()).await
    } else {
        server.await
    };
    result.map_err(BrokerError::Io)
}
