use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    handlers::common::{created_response, success_response, validate_input},
    services::cashier::{CloseSessionRequest, OpenSessionRequest, RecordMovementRequest},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct OpenSessionQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    pub establishment_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DailyReportQuery {
    pub establishment_id: Uuid,
    pub date: chrono::NaiveDate,
}

#[utoipa::path(
    post,
    path = "/api/v1/cashier/sessions",
    request_body = OpenSessionRequest,
    responses(
        (status = 201, description = "Session opened"),
        (status = 409, description = "The user already has an open session")
    ),
    tag = "cashier"
)]
pub async fn open_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OpenSessionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let session = state.services.cashier.open_session(payload).await?;
    Ok(created_response(session))
}

#[utoipa::path(
    post,
    path = "/api/v1/cashier/sessions/{id}/close",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = CloseSessionRequest,
    responses(
        (status = 200, description = "Session closed and reconciled"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session already closed")
    ),
    tag = "cashier"
)]
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CloseSessionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.services.cashier.close_session(id, payload).await?;
    Ok(success_response(session))
}

async fn record_movement(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecordMovementRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let movement = state.services.cashier.record_movement(id, payload).await?;
    Ok(created_response(movement))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.services.cashier.get_session(id).await?;
    Ok(success_response(session))
}

async fn get_open_session(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OpenSessionQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.services.cashier.get_open_session(query.user_id).await?;
    Ok(success_response(session))
}

async fn session_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.services.cashier.session_report(id).await?;
    Ok(success_response(report))
}

async fn daily_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DailyReportQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state
        .services
        .cashier
        .daily_report(query.establishment_id, query.date)
        .await?;
    Ok(success_response(report))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let sessions = state
        .services
        .cashier
        .list_sessions(query.establishment_id)
        .await?;
    Ok(success_response(sessions))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(open_session).get(list_sessions))
        .route("/sessions/open", get(get_open_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/close", post(close_session))
        .route("/sessions/:id/movements", post(record_movement))
        .route("/sessions/:id/report", get(session_report))
        .route("/reports/daily", get(daily_report))
}
