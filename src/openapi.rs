use serde_json::Value;
use utoipa::OpenApi;

use crate::errors::ErrorResponse;
use crate::handlers::cashier as cashier_handlers;
use crate::handlers::catalog as catalog_handlers;
use crate::handlers::orders as order_handlers;
use crate::services::cashier::{
    CloseSessionRequest, DailyReport, MovementKind, MovementResponse, OpenSessionRequest,
    RecordMovementRequest, SessionReport, SessionResponse,
};
use crate::services::catalog::{
    CreateEstablishmentRequest, CreatePaymentMethodRequest, CreateProductRequest,
};
use crate::services::order_status::OrderStatus;
use crate::services::orders::{
    CreateOrderItemRequest, CreateOrderRequest, OrderItemResponse, OrderListResponse,
    OrderResponse,
};
use crate::services::payments::{
    PaymentItemRequest, PaymentResponse, PaymentStatus, ProcessOrderPaymentRequest,
    RecordPaymentRequest, SalePaymentStatus, SaleResponse,
};
use crate::services::reports::{
    PaymentMethodBreakdown, PaymentStatusBreakdown, ReportRange, SalesSummary, StatusBreakdown,
    TopProduct,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mesa API",
        description = "Point-of-sale backend: orders, payment settlement, \
                       cashier sessions and sales reporting."
    ),
    paths(
        order_handlers::create_order,
        order_handlers::get_order,
        order_handlers::update_status,
        crate::handlers::payments::pay_order,
        crate::handlers::payments::refund_payment,
        cashier_handlers::open_session,
        cashier_handlers::close_session,
        crate::handlers::reports::sales_summary,
        catalog_handlers::create_establishment,
        catalog_handlers::set_product_availability,
    ),
    components(schemas(
        ErrorResponse,
        OrderStatus,
        CreateOrderRequest,
        CreateOrderItemRequest,
        OrderResponse,
        OrderItemResponse,
        OrderListResponse,
        order_handlers::UpdateStatusRequest,
        order_handlers::CancelOrderRequest,
        PaymentStatus,
        SalePaymentStatus,
        RecordPaymentRequest,
        ProcessOrderPaymentRequest,
        PaymentItemRequest,
        PaymentResponse,
        SaleResponse,
        MovementKind,
        OpenSessionRequest,
        CloseSessionRequest,
        RecordMovementRequest,
        SessionResponse,
        MovementResponse,
        SessionReport,
        DailyReport,
        ReportRange,
        SalesSummary,
        StatusBreakdown,
        PaymentStatusBreakdown,
        PaymentMethodBreakdown,
        TopProduct,
        CreateEstablishmentRequest,
        CreateProductRequest,
        CreatePaymentMethodRequest,
        catalog_handlers::SetAvailabilityRequest,
        catalog_handlers::SetActiveRequest,
    )),
    tags(
        (name = "orders", description = "Order lifecycle"),
        (name = "payments", description = "Payment settlement"),
        (name = "cashier", description = "Cashier sessions and cash movements"),
        (name = "reports", description = "Sales reporting"),
        (name = "catalog", description = "Establishments, products and payment methods")
    )
)]
pub struct ApiDoc;

/// The document as a JSON value, served at /api/v1/openapi.json.
pub fn spec_json() -> Value {
    serde_json::to_value(ApiDoc::openapi()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_core_paths() {
        let spec = spec_json();
        let paths = spec["paths"].as_object().expect("paths object");
        assert!(paths.contains_key("/api/v1/orders"));
        assert!(paths.contains_key("/api/v1/orders/{id}/status"));
        assert!(paths.contains_key("/api/v1/orders/{id}/payments"));
        assert!(paths.contains_key("/api/v1/cashier/sessions"));
        assert!(paths.contains_key("/api/v1/establishments/{id}/reports/sales"));
    }
}
