//! The daemon's admin HTTP surface: read-only status and stats endpoints,
//! nested under `/api`.

pub mod handlers;
pub mod stats;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;
pub use stats::{DaemonStats, DaemonStatsSnapshot};

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/stats", get(handlers::handle_stats))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    tracing::info!(port, "admin API listening on 127.0.0.1");
    axum::serve(listener, app).await?;
    Ok(())
}
