use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use shopfloor_order::AgingReport;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AgingQuery {
    /// Only items currently carrying this status label
    pub status: Option<String>,
    pub at: Option<DateTime<Utc>>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/reports/aging", get(aging_report))
}

/// GET /v1/reports/aging
async fn aging_report(
    State(state): State<AppState>,
    Query(query): Query<AgingQuery>,
) -> Result<Json<AgingReport>, AppError> {
    let now = query.at.unwrap_or_else(Utc::now);
    let report = state.aging.report(now, query.status.as_deref()).await?;
    Ok(Json(report))
}
