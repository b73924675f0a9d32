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
    handlers::common::{created_response, success_response},
    services::catalog::{
        CreateEstablishmentRequest, CreatePaymentMethodRequest, CreateProductRequest,
    },
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListFilterQuery {
    /// When true, hides unavailable products / inactive methods
    #[serde(default)]
    pub only_active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetAvailabilityRequest {
    pub available: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/establishments",
    request_body = CreateEstablishmentRequest,
    responses(
        (status = 201, description = "Establishment created"),
        (status = 409, description = "Slug already in use")
    ),
    tag = "catalog"
)]
pub async fn create_establishment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateEstablishmentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let model = state.services.catalog.create_establishment(payload).await?;
    Ok(created_response(model))
}

async fn list_establishments(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    let list = state.services.catalog.list_establishments().await?;
    Ok(success_response(list))
}

async fn get_establishment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let model = state.services.catalog.get_establishment(id).await?;
    Ok(success_response(model))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let model = state.services.catalog.create_product(id, payload).await?;
    Ok(created_response(model))
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListFilterQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let list = state
        .services
        .catalog
        .list_products(id, query.only_active)
        .await?;
    Ok(success_response(list))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}/availability",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = SetAvailabilityRequest,
    responses(
        (status = 200, description = "Availability set; idempotent"),
        (status = 404, description = "Product not found")
    ),
    tag = "catalog"
)]
pub async fn set_product_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetAvailabilityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let model = state
        .services
        .catalog
        .set_product_availability(id, payload.available)
        .await?;
    Ok(success_response(model))
}

async fn create_payment_method(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreatePaymentMethodRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let model = state
        .services
        .catalog
        .create_payment_method(id, payload)
        .await?;
    Ok(created_response(model))
}

async fn list_payment_methods(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListFilterQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let list = state
        .services
        .catalog
        .list_payment_methods(id, query.only_active)
        .await?;
    Ok(success_response(list))
}

async fn set_payment_method_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let model = state
        .services
        .catalog
        .set_payment_method_active(id, payload.active)
        .await?;
    Ok(success_response(model))
}

/// Routes mounted under /establishments.
pub fn establishment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_establishment).get(list_establishments))
        .route("/:id", get(get_establishment))
        .route("/:id/products", post(create_product).get(list_products))
        .route(
            "/:id/payment-methods",
            post(create_payment_method).get(list_payment_methods),
        )
}

/// Routes mounted under /products.
pub fn product_routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id/availability", put(set_product_availability))
}

/// Routes mounted under /payment-methods.
pub fn payment_method_routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id/active", put(set_payment_method_active))
}
