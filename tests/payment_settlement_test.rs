mod common;

use assert_matches::assert_matches;
use common::TestCtx;
use rust_decimal_macros::dec;
use uuid::Uuid;

use mesa_api::{
    errors::ServiceError,
    services::orders::{CreateOrderItemRequest, CreateOrderRequest},
    services::payments::{
        PaymentItemRequest, PaymentStatus, ProcessOrderPaymentRequest, SalePaymentStatus,
    },
};

async fn seed_order(ctx: &TestCtx, price: rust_decimal::Decimal, quantity: i32) -> (Uuid, Uuid) {
    let est = ctx.seed_establishment().await;
    let product = ctx.seed_product(est, "Combo", price, None).await;
    let order = ctx
        .services
        .orders
        .create_order(CreateOrderRequest {
            establishment_id: est,
            customer_id: None,
            waiter_id: None,
            table_id: None,
            order_type: "DINE_IN".to_string(),
            source: "POS".to_string(),
            external_id: None,
            items: vec![CreateOrderItemRequest {
                product_id: product,
                quantity,
                unit_price: None,
                discount: None,
            }],
            discount: None,
            delivery_fee: None,
            service_fee: None,
            notes: None,
        })
        .await
        .expect("order");
    (est, order.id)
}

fn split(payment_method_id: Uuid, amount: rust_decimal::Decimal) -> PaymentItemRequest {
    PaymentItemRequest {
        payment_method_id,
        amount,
        transaction_id: None,
        authorization_code: None,
    }
}

#[tokio::test]
async fn paying_an_order_creates_a_paid_sale() {
    let ctx = TestCtx::new().await;
    let (est, order_id) = seed_order(&ctx, dec!(25.00), 4).await;
    let cash = ctx.seed_payment_method(est, "Cash", true).await;

    let sale = ctx
        .services
        .payments
        .process_order_payment(
            order_id,
            ProcessOrderPaymentRequest {
                payments: vec![split(cash, dec!(100.00))],
            },
        )
        .await
        .expect("payment");

    assert_eq!(sale.total, dec!(100.00));
    assert_eq!(sale.paid, dec!(100.00));
    assert_eq!(sale.change, dec!(0.00));
    assert_eq!(sale.payment_status, SalePaymentStatus::Paid);
    assert_eq!(sale.payments.len(), 1);
    assert_eq!(sale.payments[0].status, PaymentStatus::Paid);
}

#[tokio::test]
async fn split_across_methods_settles_exactly() {
    let ctx = TestCtx::new().await;
    let (est, order_id) = seed_order(&ctx, dec!(50.00), 2).await;
    let cash = ctx.seed_payment_method(est, "Cash", true).await;
    let card = ctx.seed_payment_method(est, "Card", false).await;

    let sale = ctx
        .services
        .payments
        .process_order_payment(
            order_id,
            ProcessOrderPaymentRequest {
                payments: vec![split(cash, dec!(60.00)), split(card, dec!(40.00))],
            },
        )
        .await
        .expect("split payment");

    assert_eq!(sale.paid, dec!(100.00));
    assert_eq!(sale.payment_status, SalePaymentStatus::Paid);
    assert_eq!(sale.payments.len(), 2);
}

#[tokio::test]
async fn mismatched_split_persists_nothing() {
    let ctx = TestCtx::new().await;
    let (est, order_id) = seed_order(&ctx, dec!(50.00), 2).await;
    let cash = ctx.seed_payment_method(est, "Cash", true).await;

    // 99.50 against a 100.00 order is outside the tolerance
    let result = ctx
        .services
        .payments
        .process_order_payment(
            order_id,
            ProcessOrderPaymentRequest {
                payments: vec![split(cash, dec!(99.50))],
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::BadRequest(_)));

    // No sale row was left behind
    let result = ctx.services.payments.get_sale_for_order(order_id).await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn split_within_tolerance_is_accepted() {
    let ctx = TestCtx::new().await;
    let (est, order_id) = seed_order(&ctx, dec!(50.00), 2).await;
    let cash = ctx.seed_payment_method(est, "Cash", true).await;

    let sale = ctx
        .services
        .payments
        .process_order_payment(
            order_id,
            ProcessOrderPaymentRequest {
                payments: vec![split(cash, dec!(99.99))],
            },
        )
        .await
        .expect("payment within tolerance");

    assert_eq!(sale.paid, dec!(99.99));
    assert_eq!(sale.payment_status, SalePaymentStatus::Partial);
}

#[tokio::test]
async fn inactive_method_is_rejected() {
    let ctx = TestCtx::new().await;
    let (est, order_id) = seed_order(&ctx, dec!(10.00), 1).await;
    let card = ctx.seed_payment_method(est, "Card", false).await;
    ctx.services
        .catalog
        .set_payment_method_active(card, false)
        .await
        .expect("deactivate");

    let result = ctx
        .services
        .payments
        .process_order_payment(
            order_id,
            ProcessOrderPaymentRequest {
                payments: vec![split(card, dec!(10.00))],
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn refund_flips_status_and_recomputes_the_sale() {
    let ctx = TestCtx::new().await;
    let (est, order_id) = seed_order(&ctx, dec!(40.00), 1).await;
    let card = ctx.seed_payment_method(est, "Card", false).await;

    let sale = ctx
        .services
        .payments
        .process_order_payment(
            order_id,
            ProcessOrderPaymentRequest {
                payments: vec![split(card, dec!(40.00))],
            },
        )
        .await
        .expect("payment");
    let payment_id = sale.payments[0].id;

    let refunded = ctx
        .services
        .payments
        .refund_payment(payment_id)
        .await
        .expect("refund");
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    // Amount stays on the row for audit
    assert_eq!(refunded.amount, dec!(40.00));

    let sale = ctx
        .services
        .payments
        .get_sale_for_order(order_id)
        .await
        .expect("sale");
    assert_eq!(sale.paid, dec!(0.00));
    assert_eq!(sale.payment_status, SalePaymentStatus::Pending);

    // A second refund of the same payment is rejected
    let result = ctx.services.payments.refund_payment(payment_id).await;
    assert_matches!(result, Err(ServiceError::BadRequest(_)));
}

#[tokio::test]
async fn settling_an_order_twice_is_rejected() {
    let ctx = TestCtx::new().await;
    let (est, order_id) = seed_order(&ctx, dec!(50.00), 2).await;
    let cash = ctx.seed_payment_method(est, "Cash", true).await;

    ctx.services
        .payments
        .process_order_payment(
            order_id,
            ProcessOrderPaymentRequest {
                payments: vec![split(cash, dec!(100.00))],
            },
        )
        .await
        .expect("first settlement");

    let result = ctx
        .services
        .payments
        .process_order_payment(
            order_id,
            ProcessOrderPaymentRequest {
                payments: vec![split(cash, dec!(100.00))],
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::BadRequest(_)));

    // The sale never collects more than its total
    let sale = ctx
        .services
        .payments
        .get_sale_for_order(order_id)
        .await
        .expect("sale");
    assert_eq!(sale.paid, dec!(100.00));
    assert_eq!(sale.total, dec!(100.00));
    assert_eq!(sale.payments.len(), 1);
}

#[tokio::test]
async fn refunded_order_can_be_settled_again() {
    let ctx = TestCtx::new().await;
    let (est, order_id) = seed_order(&ctx, dec!(20.00), 1).await;
    let card = ctx.seed_payment_method(est, "Card", false).await;

    let sale = ctx
        .services
        .payments
        .process_order_payment(
            order_id,
            ProcessOrderPaymentRequest {
                payments: vec![split(card, dec!(20.00))],
            },
        )
        .await
        .expect("first settlement");
    ctx.services
        .payments
        .refund_payment(sale.payments[0].id)
        .await
        .expect("refund");

    // Refunded payments free the balance for a fresh settlement
    let sale = ctx
        .services
        .payments
        .process_order_payment(
            order_id,
            ProcessOrderPaymentRequest {
                payments: vec![split(card, dec!(20.00))],
            },
        )
        .await
        .expect("second settlement");
    assert_eq!(sale.paid, dec!(20.00));
    assert_eq!(sale.payment_status, SalePaymentStatus::Paid);
}

#[tokio::test]
async fn record_payment_cannot_exceed_remaining_balance() {
    let ctx = TestCtx::new().await;
    let (est, order_id) = seed_order(&ctx, dec!(30.00), 1).await;
    let cash = ctx.seed_payment_method(est, "Cash", true).await;

    let sale = ctx
        .services
        .payments
        .process_order_payment(
            order_id,
            ProcessOrderPaymentRequest {
                payments: vec![split(cash, dec!(30.00))],
            },
        )
        .await
        .expect("payment");

    let result = ctx
        .services
        .payments
        .record_payment(mesa_api::services::payments::RecordPaymentRequest {
            sale_id: sale.id,
            payment_method_id: cash,
            amount: dec!(5.00),
            status: None,
            transaction_id: None,
            authorization_code: None,
        })
        .await;
    assert_matches!(result, Err(ServiceError::BadRequest(_)));
}
