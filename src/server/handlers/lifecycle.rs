use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::common::{parse_optional_id, parse_optional_id_list};
use crate::errors::{ReportError, ReportResult};
use crate::report::LifecycleResponse;
use crate::server::app::AppState;
use crate::services::{resolve_date_range, LifecycleService, ReportQuery};
use crate::settings::LifecycleSettings;

/// Raw query string of the report endpoint. Everything arrives as optional
/// text; blank and junk values degrade to "not set" instead of failing the
/// whole request, matching the list-parsing contract.
#[derive(Deserialize, Debug, Default)]
pub struct LifecycleParams {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub customer_id: Option<String>,
    pub supplier_id: Option<String>,
    pub stages: Option<String>,
    pub relation_types: Option<String>,
    pub cycle_id: Option<String>,
}

pub async fn get_lifecycle(
    State(state): State<AppState>,
    Query(params): Query<LifecycleParams>,
) -> Response {
    match run_report(&state, &params).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(err) => {
            warn!("Lifecycle report failed: {}", err);
            error_response(err)
        }
    }
}

pub fn error_response(err: ReportError) -> Response {
    (err.status_code(), Json(json!({ "error": err.to_string() }))).into_response()
}

async fn run_report(
    state: &AppState,
    params: &LifecycleParams,
) -> ReportResult<LifecycleResponse> {
    let settings = LifecycleSettings::load(&state.settings_path)?;
    let profile = settings
        .select_profile(params.cycle_id.as_deref())
        .ok_or(ReportError::NoActiveStages)?;

    let (date_from, date_to) =
        resolve_date_range(params.date_from.as_deref(), params.date_to.as_deref())?;

    let query = ReportQuery {
        date_from,
        date_to,
        customer_id: parse_optional_id(params.customer_id.as_deref()),
        supplier_id: parse_optional_id(params.supplier_id.as_deref()),
        stage_type_ids: parse_optional_id_list(params.stages.as_deref()),
        relation_type_ids: parse_optional_id_list(params.relation_types.as_deref()),
    };

    LifecycleService::new(state.db.clone())
        .build_report(&query, profile)
        .await
}
