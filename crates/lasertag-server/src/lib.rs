pub mod clock;
pub mod config;
pub mod health;
pub mod registry;
pub mod state;
pub mod ws;

use axum::Router;
use axum::routing::get;
use tower_http::services::ServeDir;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
///
/// Realtime connections attach at `/ws/{code}/{room}` where the room hint is
/// `lobby`, `game`, or `spectate`; a missing room segment means lobby.
/// Everything else falls back to static files for the browser client.
pub fn build_app(config: ServerConfig) -> (Router, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config);

    let app = Router::new()
        .route("/ws/{code}", get(ws::ws_connect_default))
        .route("/ws/{code}/{room}", get(ws::ws_connect))
        .route("/healthz", get(health::health_check))
        .fallback_service(ServeDir::new(&web_root))
        .with_state(state.clone());

    (app, state)
}
