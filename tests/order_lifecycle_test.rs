mod common;

use assert_matches::assert_matches;
use common::TestCtx;
use rust_decimal_macros::dec;
use uuid::Uuid;

use mesa_api::{
    errors::ServiceError,
    services::order_status::OrderStatus,
    services::orders::{CreateOrderItemRequest, CreateOrderRequest},
};

fn order_request(establishment_id: Uuid, items: Vec<CreateOrderItemRequest>) -> CreateOrderRequest {
    CreateOrderRequest {
        establishment_id,
        customer_id: None,
        waiter_id: None,
        table_id: None,
        order_type: "DINE_IN".to_string(),
        source: "POS".to_string(),
        external_id: None,
        items,
        discount: None,
        delivery_fee: None,
        service_fee: None,
        notes: None,
    }
}

fn item(product_id: Uuid, quantity: i32) -> CreateOrderItemRequest {
    CreateOrderItemRequest {
        product_id,
        quantity,
        unit_price: None,
        discount: None,
    }
}

#[tokio::test]
async fn create_order_computes_totals_and_opens_history() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let burger = ctx.seed_product(est, "Burger", dec!(10.00), None).await;
    let soda = ctx.seed_product(est, "Soda", dec!(5.00), None).await;

    let mut request = order_request(
        est,
        vec![
            item(burger, 2),
            CreateOrderItemRequest {
                product_id: soda,
                quantity: 1,
                unit_price: None,
                discount: Some(dec!(1.00)),
            },
        ],
    );
    request.notes = Some("no onions".to_string());

    let order = ctx
        .services
        .orders
        .create_order(request)
        .await
        .expect("order should be created");

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.order_number, 1);
    assert_eq!(order.subtotal, dec!(24.00));
    assert_eq!(order.total, dec!(24.00));
    assert_eq!(order.items.len(), 2);

    let history = ctx
        .services
        .orders
        .get_status_history(order.id)
        .await
        .expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, "PENDING");
}

#[tokio::test]
async fn items_keep_the_order_they_were_sent_in() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let soda = ctx.seed_product(est, "Soda", dec!(5.00), None).await;
    let burger = ctx.seed_product(est, "Burger", dec!(10.00), None).await;
    let avocado = ctx.seed_product(est, "Avocado Toast", dec!(8.00), None).await;

    // Deliberately not alphabetical
    let order = ctx
        .services
        .orders
        .create_order(order_request(
            est,
            vec![item(soda, 1), item(burger, 1), item(avocado, 1)],
        ))
        .await
        .expect("order");

    let names: Vec<&str> = order.items.iter().map(|i| i.product_name.as_str()).collect();
    assert_eq!(names, vec!["Soda", "Burger", "Avocado Toast"]);
}

#[tokio::test]
async fn order_numbers_increment_within_the_day() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let product = ctx.seed_product(est, "Coffee", dec!(3.50), None).await;

    let first = ctx
        .services
        .orders
        .create_order(order_request(est, vec![item(product, 1)]))
        .await
        .expect("first order");
    let second = ctx
        .services
        .orders
        .create_order(order_request(est, vec![item(product, 2)]))
        .await
        .expect("second order");

    assert_eq!(first.order_number, 1);
    assert_eq!(second.order_number, 2);
}

#[tokio::test]
async fn full_lifecycle_reaches_completed_and_stamps_delivery() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let product = ctx.seed_product(est, "Pasta", dec!(14.00), None).await;

    let order = ctx
        .services
        .orders
        .create_order(order_request(est, vec![item(product, 1)]))
        .await
        .expect("order");

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
    ] {
        ctx.services
            .orders
            .transition_status(order.id, status, None)
            .await
            .unwrap_or_else(|e| panic!("transition to {status} should succeed: {e}"));
    }

    let updated = ctx.services.orders.get_order(order.id).await.expect("order");
    assert_eq!(updated.status, OrderStatus::Completed);
    assert!(updated.delivered_at.is_some());

    let history = ctx
        .services
        .orders
        .get_status_history(order.id)
        .await
        .expect("history");
    assert_eq!(history.len(), 5);
}

#[tokio::test]
async fn backward_transition_is_rejected() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let product = ctx.seed_product(est, "Salad", dec!(9.00), None).await;

    let order = ctx
        .services
        .orders
        .create_order(order_request(est, vec![item(product, 1)]))
        .await
        .expect("order");

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
    ] {
        ctx.services
            .orders
            .transition_status(order.id, status, None)
            .await
            .expect("forward transition");
    }

    let result = ctx
        .services
        .orders
        .transition_status(order.id, OrderStatus::Pending, None)
        .await;
    assert_matches!(result, Err(ServiceError::InvalidStatus(_)));

    // The failed attempt leaves no trace in the history
    let history = ctx
        .services
        .orders
        .get_status_history(order.id)
        .await
        .expect("history");
    assert_eq!(history.len(), 4);
}

#[tokio::test]
async fn duplicate_external_id_conflicts() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let product = ctx.seed_product(est, "Wrap", dec!(8.00), None).await;

    let mut first = order_request(est, vec![item(product, 1)]);
    first.external_id = Some("ifood-123".to_string());
    first.source = "DELIVERY_APP".to_string();
    ctx.services
        .orders
        .create_order(first)
        .await
        .expect("first order");

    let mut second = order_request(est, vec![item(product, 1)]);
    second.external_id = Some("ifood-123".to_string());
    second.source = "DELIVERY_APP".to_string();
    let result = ctx.services.orders.create_order(second).await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn unavailable_product_rejects_the_order() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let product = ctx.seed_product(est, "Soup", dec!(6.00), None).await;
    ctx.services
        .catalog
        .set_product_availability(product, false)
        .await
        .expect("toggle");

    let result = ctx
        .services
        .orders
        .create_order(order_request(est, vec![item(product, 1)]))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn only_cancelled_orders_can_be_deleted() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let product = ctx.seed_product(est, "Tea", dec!(2.50), None).await;

    let order = ctx
        .services
        .orders
        .create_order(order_request(est, vec![item(product, 1)]))
        .await
        .expect("order");

    let result = ctx.services.orders.delete_order(order.id).await;
    assert_matches!(result, Err(ServiceError::BadRequest(_)));

    ctx.services
        .orders
        .cancel_order(order.id, Some("customer left".to_string()))
        .await
        .expect("cancel");
    ctx.services
        .orders
        .delete_order(order.id)
        .await
        .expect("delete after cancel");

    let result = ctx.services.orders.get_order(order.id).await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}
