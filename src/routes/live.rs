use crate::{AppState, handlers::{bootstrap, join_session}, websocket::handler::websocket_handler};
use axum::{routing::get, Router};

/// Bootstrap, join and the realtime channel, at the paths clients hard-code
pub fn create_live_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/", get(bootstrap))
        .route("/session/:session_id", get(join_session))
        .route("/live/:session_id", get(websocket_handler))
}
