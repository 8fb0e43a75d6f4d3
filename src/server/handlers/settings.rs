use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::warn;

use crate::errors::ReportResult;
use crate::server::app::AppState;
use crate::server::handlers::lifecycle::error_response;
use crate::services::DocumentService;
use crate::settings::{CycleProfile, LifecycleSettings};

#[derive(Serialize)]
pub struct SettingsResponse {
    pub cycles: Vec<CycleProfile>,
    pub active_cycle_id: Option<String>,
    pub invoice_types: Vec<InvoiceTypeEntry>,
}

#[derive(Serialize)]
pub struct InvoiceTypeEntry {
    pub id: i32,
    pub name: String,
}

pub async fn get_settings(State(state): State<AppState>) -> Response {
    match load_settings(&state).await {
        Ok(payload) => Json(payload).into_response(),
        Err(err) => {
            warn!("Settings lookup failed: {}", err);
            error_response(err)
        }
    }
}

async fn load_settings(state: &AppState) -> ReportResult<SettingsResponse> {
    let settings = LifecycleSettings::load(&state.settings_path)?;
    let types = DocumentService::new(state.db.clone())
        .fetch_type_lookup()
        .await?;

    Ok(SettingsResponse {
        cycles: settings.cycles,
        active_cycle_id: settings.active_cycle_id,
        invoice_types: types
            .into_iter()
            .map(|t| InvoiceTypeEntry {
                id: t.type_id,
                name: t.type_name,
            })
            .collect(),
    })
}
