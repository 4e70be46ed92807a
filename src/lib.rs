pub mod clients;
pub mod config;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod utils;
pub mod websocket;
pub mod ws;

use std::path::Path;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::{Config, SyncSettings};
use docs::ApiDoc;
use routes::{create_api_routes, create_live_routes};
use ws::SessionRegistry;

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub config: Arc<Config>,
    pub settings: SyncSettings,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(SessionRegistry::with_initial_document(config.initial_document.clone()));
        Self {
            registry,
            settings: config.sync_settings(),
            config: Arc::new(config),
        }
    }
}

/// Assemble the full HTTP + WebSocket router
pub fn build_app(state: AppState) -> Router {
    let index = Path::new(&state.config.static_dir).join("index.html");
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(create_live_routes())
        .nest("/api", create_api_routes())
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Unknown routes get the editor page
        .fallback_service(ServeFile::new(index))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            header::AUTHORIZATION,
        ]);

    match config.cors_origins.as_deref() {
        Some(origins) if !origins.trim().is_empty() => {
            let list: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin '{}'", origin);
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(list))
        }
        _ => layer.allow_origin(Any),
    }
}
