pub mod app;
pub mod handlers;

use anyhow::Result;
use tracing::info;

use crate::db::connection::establish_connection;

pub async fn start_server(
    port: u16,
    database_path: &str,
    settings_path: &str,
    cors_origin: Option<&str>,
) -> Result<()> {
    let db = establish_connection(database_path).await?;
    info!("Database ready at {}", database_path);

    let app = app::create_app(db, settings_path.to_string(), cors_origin).await?;

    log_routes();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_routes() {
    info!("API Endpoints:");
    info!("  /health                      - Health check");
    info!("  /api/v1/lifecycle            - Document life-cycle report (GET)");
    info!("  /api/v1/lifecycle/settings   - Cycle profiles and invoice types (GET)");
}
