//! HTTP/JSON gateway over the engine surface.

pub mod handlers;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::engine::Engine;
use state::AppState;

/// Builds the application router. Separate from [`run_server`] so tests
/// can drive handlers without binding a socket.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/v1/accounts/credit", post(handlers::account::credit))
        .route("/api/v1/accounts/debit", post(handlers::account::debit))
        .route("/api/v1/accounts/balance", get(handlers::account::get_balance))
        .route("/api/v1/orders", post(handlers::order::place_order))
        .route("/api/v1/orders/cancel", post(handlers::order::cancel_order))
        .route("/api/v1/orderbook", get(handlers::orderbook::get_orderbook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured address and serves requests until shutdown.
pub async fn run_server(config: &AppConfig, engine: Arc<Engine>) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(engine));
    let app = router(state);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Gateway listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
