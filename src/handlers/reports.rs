use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    errors::ServiceError, handlers::common::success_response,
    services::reports::ReportRange, AppState,
};

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/api/v1/establishments/{id}/reports/sales",
    params(
        ("id" = Uuid, Path, description = "Establishment id"),
        ("from" = String, Query, description = "Window start (inclusive, RFC 3339)"),
        ("to" = String, Query, description = "Window end (exclusive, RFC 3339)")
    ),
    responses(
        (status = 200, description = "Sales summary for the window"),
        (status = 400, description = "Invalid window")
    ),
    tag = "reports"
)]
pub async fn sales_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state
        .services
        .reports
        .sales_summary(
            id,
            ReportRange {
                from: query.from,
                to: query.to,
            },
        )
        .await?;
    Ok(success_response(summary))
}

/// Establishment-scoped report routes, mounted under /establishments.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id/reports/sales", get(sales_summary))
}
