use axum::{extract::Query, routing::get, Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use shopfloor_shared::business_days_between;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BusinessDaysQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct BusinessDaysResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub business_days: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/calendar/business-days", get(business_days))
}

/// GET /v1/calendar/business-days?start=2024-03-01&end=2024-03-04
async fn business_days(Query(query): Query<BusinessDaysQuery>) -> Json<BusinessDaysResponse> {
    Json(BusinessDaysResponse {
        start: query.start,
        end: query.end,
        business_days: business_days_between(query.start, query.end),
    })
}
