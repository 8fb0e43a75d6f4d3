use anyhow::Result;
use axum::{routing::get, Router};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use super::handlers::{health, lifecycle, settings};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub settings_path: String,
}

pub async fn create_app(
    db: DatabaseConnection,
    settings_path: String,
    cors_origin: Option<&str>,
) -> Result<Router> {
    let state = AppState { db, settings_path };

    let cors = match cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<axum::http::HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_v1_routes())
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state);

    Ok(app)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/lifecycle", get(lifecycle::get_lifecycle))
        .route("/lifecycle/settings", get(settings::get_settings))
}
