use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    handlers::common::{
        created_response, no_content_response, success_response, PaginationParams,
    },
    services::order_status::OrderStatus,
    services::orders::{CreateOrderRequest, OrderFilters},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub establishment_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created"),
        (status = 400, description = "Invalid order payload"),
        (status = 404, description = "Establishment or product not found"),
        (status = 409, description = "Duplicate external id")
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.create_order(payload).await?;
    Ok(created_response(order))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrderListQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let filters = OrderFilters {
        establishment_id: query.establishment_id,
        status: query.status,
    };
    let list = state
        .services
        .orders
        .list_orders(filters, pagination.page, pagination.per_page)
        .await?;
    Ok(success_response(list))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its items"),
        (status = 404, description = "Order not found")
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(success_response(order))
}

async fn get_order_items(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let items = state.services.orders.get_order_items(id).await?;
    Ok(success_response(items))
}

async fn get_status_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let history = state.services.orders.get_status_history(id).await?;
    Ok(success_response(history))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Order advanced to the new status"),
        (status = 400, description = "Transition not allowed"),
        (status = 404, description = "Order not found")
    ),
    tag = "orders"
)]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .transition_status(id, payload.status, payload.note)
        .await?;
    Ok(success_response(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.cancel_order(id, payload.reason).await?;
    Ok(success_response(order))
}

async fn delete_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.orders.delete_order(id).await?;
    Ok(no_content_response())
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order).delete(delete_order))
        .route("/:id/items", get(get_order_items))
        .route("/:id/status", put(update_status))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/history", get(get_status_history))
}
