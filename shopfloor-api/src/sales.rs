use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use shopfloor_catalog::{SalesReport, Tier};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub units: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub tiers: BTreeMap<String, Tier>,
}

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    /// Comma separated SKUs or family prefixes
    pub skus: String,
    pub days: Option<i64>,
    pub at: Option<DateTime<Utc>>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/sales/classify", post(classify))
        .route("/v1/sales/records", get(sales_records))
}

/// POST /v1/sales/classify
async fn classify(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let tiers = state.sales.classifier().classify(&req.units)?;
    Ok(Json(ClassifyResponse { tiers }))
}

/// GET /v1/sales/records?skus=PLQ12,MUG01
async fn sales_records(
    State(state): State<AppState>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<SalesReport>, AppError> {
    let skus: Vec<String> = query
        .skus
        .split(',')
        .map(str::trim)
        .filter(|sku| !sku.is_empty())
        .map(String::from)
        .collect();
    if skus.is_empty() {
        return Err(AppError::ValidationError("at least one SKU is required".to_string()));
    }

    let now = query.at.unwrap_or_else(Utc::now);
    let report = state.sales.records(&skus, now, query.days).await?;
    Ok(Json(report))
}
