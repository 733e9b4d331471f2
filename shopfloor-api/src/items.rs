use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfloor_core::{Actor, ItemKey, ItemStatus, OrderItem};
use shopfloor_order::{AdvanceOptions, StationAge};

use crate::error::AppError;
use crate::state::AppState;

/// Body of a status change, shared by item and order routes
#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub status: String,
    pub initials: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub rework: bool,
    /// Defaults to the time the request is handled
    pub at: Option<DateTime<Utc>>,
}

impl AdvanceRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.status.trim().is_empty() {
            return Err(AppError::ValidationError("status is required".to_string()));
        }
        if self.initials.trim().is_empty() {
            return Err(AppError::ValidationError("initials are required".to_string()));
        }
        Ok(())
    }

    pub fn status(&self) -> ItemStatus {
        ItemStatus::parse(self.status.trim())
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.initials.trim())
    }

    pub fn options(&self) -> AdvanceOptions {
        AdvanceOptions {
            rework: self.rework,
            note: self.note.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemStatusResponse {
    pub key: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AsOfQuery {
    pub at: Option<DateTime<Utc>>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/items/{key}/status", post(advance_item).get(get_item_status))
        .route("/v1/items/{key}/station", get(get_item_station))
}

/// POST /v1/items/{key}/status
async fn advance_item(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<OrderItem>, AppError> {
    req.validate()?;
    let key: ItemKey = key.parse()?;
    let at = req.at.unwrap_or_else(Utc::now);

    let item = state
        .tracker
        .advance(key, &req.status(), at, &req.actor(), &req.options())
        .await?;
    Ok(Json(item))
}

/// GET /v1/items/{key}/status
async fn get_item_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ItemStatusResponse>, AppError> {
    let key: ItemKey = key.parse()?;
    let status = state.tracker.item_status(key).await?;
    Ok(Json(ItemStatusResponse {
        key: key.to_string(),
        status,
    }))
}

/// GET /v1/items/{key}/station
async fn get_item_station(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<StationAge>, AppError> {
    let key: ItemKey = key.parse()?;
    let now = query.at.unwrap_or_else(Utc::now);
    let age = state.tracker.item_age(key, now).await?;
    Ok(Json(age))
}
