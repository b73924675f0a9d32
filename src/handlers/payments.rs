use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    handlers::common::{created_response, success_response},
    services::payments::{ProcessOrderPaymentRequest, RecordPaymentRequest},
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/payments",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = ProcessOrderPaymentRequest,
    responses(
        (status = 201, description = "Payments recorded against the order's sale"),
        (status = 400, description = "Split does not match the order total"),
        (status = 404, description = "Order or payment method not found")
    ),
    tag = "payments"
)]
pub async fn pay_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProcessOrderPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let sale = state
        .services
        .payments
        .process_order_payment(id, payload)
        .await?;
    Ok(created_response(sale))
}

async fn get_order_sale(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let sale = state.services.payments.get_sale_for_order(id).await?;
    Ok(success_response(sale))
}

async fn record_payment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let payment = state.services.payments.record_payment(payload).await?;
    Ok(created_response(payment))
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/refund",
    params(("id" = Uuid, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment refunded"),
        (status = 400, description = "Payment is not in a refundable state"),
        (status = 404, description = "Payment not found")
    ),
    tag = "payments"
)]
pub async fn refund_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let payment = state.services.payments.refund_payment(id).await?;
    Ok(success_response(payment))
}

/// Routes mounted under /payments.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(record_payment))
        .route("/:id/refund", post(refund_payment))
}

/// Order-scoped settlement routes, mounted under /orders.
pub fn order_routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id/payments", post(pay_order).get(get_order_sale))
}
