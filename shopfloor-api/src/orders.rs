use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use shopfloor_core::{Actor, OrderNumber};
use shopfloor_order::{OrderAdvance, ShipOutcome};

use crate::error::AppError;
use crate::items::AdvanceRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ShipRequest {
    pub initials: String,
    pub at: Option<DateTime<Utc>>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders/{order_number}/status", post(advance_order))
        .route("/v1/orders/{order_number}/ship", post(ship_order))
}

/// POST /v1/orders/{order_number}/status
/// Move every physical line of the order to the same status
async fn advance_order(
    State(state): State<AppState>,
    Path(order_number): Path<OrderNumber>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<OrderAdvance>, AppError> {
    req.validate()?;
    let at = req.at.unwrap_or_else(Utc::now);

    let advanced = state
        .tracker
        .order_wide_advance(order_number, &req.status(), at, &req.actor(), &req.options())
        .await?;
    Ok(Json(advanced))
}

/// POST /v1/orders/{order_number}/ship
async fn ship_order(
    State(state): State<AppState>,
    Path(order_number): Path<OrderNumber>,
    Json(req): Json<ShipRequest>,
) -> Result<Json<ShipOutcome>, AppError> {
    if req.initials.trim().is_empty() {
        return Err(AppError::ValidationError("initials are required".to_string()));
    }
    let at = req.at.unwrap_or_else(Utc::now);

    let outcome = state
        .splitter
        .mark_shipped(order_number, &Actor::new(req.initials.trim()), at)
        .await?;
    info!(order_number, state = ?outcome.state(), "Ship request handled");
    Ok(Json(outcome))
}
