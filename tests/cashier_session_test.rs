mod common;

use assert_matches::assert_matches;
use common::TestCtx;
use rust_decimal_macros::dec;
use uuid::Uuid;

use mesa_api::{
    errors::ServiceError,
    services::cashier::{
        CloseSessionRequest, MovementKind, OpenSessionRequest, RecordMovementRequest,
    },
    services::orders::{CreateOrderItemRequest, CreateOrderRequest},
    services::payments::{PaymentItemRequest, ProcessOrderPaymentRequest},
};

async fn pay_order_with(
    ctx: &TestCtx,
    est: Uuid,
    method: Uuid,
    amount: rust_decimal::Decimal,
) {
    let product = ctx.seed_product(est, "Meal", amount, None).await;
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
                quantity: 1,
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

    ctx.services
        .payments
        .process_order_payment(
            order.id,
            ProcessOrderPaymentRequest {
                payments: vec![PaymentItemRequest {
                    payment_method_id: method,
                    amount,
                    transaction_id: None,
                    authorization_code: None,
                }],
            },
        )
        .await
        .expect("payment");
}

fn open_request(est: Uuid, user: Uuid, opening: rust_decimal::Decimal) -> OpenSessionRequest {
    OpenSessionRequest {
        establishment_id: est,
        user_id: user,
        opening_amount: opening,
        notes: None,
    }
}

#[tokio::test]
async fn reconciliation_counts_cash_and_movements() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let cash = ctx.seed_payment_method(est, "Cash", true).await;
    let user = Uuid::new_v4();

    let session = ctx
        .services
        .cashier
        .open_session(open_request(est, user, dec!(100.00)))
        .await
        .expect("open");

    pay_order_with(&ctx, est, cash, dec!(50.00)).await;

    ctx.services
        .cashier
        .record_movement(
            session.id,
            RecordMovementRequest {
                kind: MovementKind::Deposit,
                amount: dec!(20.00),
                reason: "change float top-up".to_string(),
            },
        )
        .await
        .expect("deposit");
    ctx.services
        .cashier
        .record_movement(
            session.id,
            RecordMovementRequest {
                kind: MovementKind::Withdrawal,
                amount: dec!(10.00),
                reason: "supplier tip".to_string(),
            },
        )
        .await
        .expect("withdrawal");

    let closed = ctx
        .services
        .cashier
        .close_session(
            session.id,
            CloseSessionRequest {
                closing_amount: dec!(150.00),
                notes: None,
            },
        )
        .await
        .expect("close");

    // 100 + 50 + 20 - 10 = 160 expected; drawer declared 150
    assert_eq!(closed.expected_amount, Some(dec!(160.00)));
    assert_eq!(closed.difference, Some(dec!(-10.00)));
    assert!(closed.closed_at.is_some());
}

#[tokio::test]
async fn non_cash_payments_do_not_touch_the_drawer() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let card = ctx.seed_payment_method(est, "Card", false).await;
    let user = Uuid::new_v4();

    let session = ctx
        .services
        .cashier
        .open_session(open_request(est, user, dec!(80.00)))
        .await
        .expect("open");

    pay_order_with(&ctx, est, card, dec!(45.00)).await;

    let closed = ctx
        .services
        .cashier
        .close_session(
            session.id,
            CloseSessionRequest {
                closing_amount: dec!(80.00),
                notes: None,
            },
        )
        .await
        .expect("close");

    assert_eq!(closed.expected_amount, Some(dec!(80.00)));
    assert_eq!(closed.difference, Some(dec!(0.00)));
}

#[tokio::test]
async fn second_open_session_for_the_same_user_conflicts() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let user = Uuid::new_v4();

    ctx.services
        .cashier
        .open_session(open_request(est, user, dec!(50.00)))
        .await
        .expect("first open");

    let result = ctx
        .services
        .cashier
        .open_session(open_request(est, user, dec!(50.00)))
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn closing_twice_conflicts() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let user = Uuid::new_v4();

    let session = ctx
        .services
        .cashier
        .open_session(open_request(est, user, dec!(50.00)))
        .await
        .expect("open");

    ctx.services
        .cashier
        .close_session(
            session.id,
            CloseSessionRequest {
                closing_amount: dec!(50.00),
                notes: None,
            },
        )
        .await
        .expect("close");

    let result = ctx
        .services
        .cashier
        .close_session(
            session.id,
            CloseSessionRequest {
                closing_amount: dec!(50.00),
                notes: None,
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn movements_are_rejected_after_close() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let user = Uuid::new_v4();

    let session = ctx
        .services
        .cashier
        .open_session(open_request(est, user, dec!(50.00)))
        .await
        .expect("open");
    ctx.services
        .cashier
        .close_session(
            session.id,
            CloseSessionRequest {
                closing_amount: dec!(50.00),
                notes: None,
            },
        )
        .await
        .expect("close");

    let result = ctx
        .services
        .cashier
        .record_movement(
            session.id,
            RecordMovementRequest {
                kind: MovementKind::Deposit,
                amount: dec!(5.00),
                reason: "late deposit".to_string(),
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::BadRequest(_)));
}

#[tokio::test]
async fn session_report_breaks_down_the_drawer() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let cash = ctx.seed_payment_method(est, "Cash", true).await;
    let user = Uuid::new_v4();

    let session = ctx
        .services
        .cashier
        .open_session(open_request(est, user, dec!(30.00)))
        .await
        .expect("open");

    pay_order_with(&ctx, est, cash, dec!(12.50)).await;
    ctx.services
        .cashier
        .record_movement(
            session.id,
            RecordMovementRequest {
                kind: MovementKind::Withdrawal,
                amount: dec!(2.50),
                reason: "petty cash".to_string(),
            },
        )
        .await
        .expect("withdrawal");

    let report = ctx
        .services
        .cashier
        .session_report(session.id)
        .await
        .expect("report");

    assert_eq!(report.cash_payments, dec!(12.50));
    assert_eq!(report.withdrawals, dec!(2.50));
    assert_eq!(report.deposits, dec!(0.00));
    assert_eq!(report.expected_amount, dec!(40.00));
    assert_eq!(report.movements.len(), 1);

    assert_eq!(report.sales_count, 1);
    assert_eq!(report.revenue, dec!(12.50));
    assert_eq!(report.average_ticket, dec!(12.50));
    assert_eq!(report.payments_by_method.len(), 1);
    assert_eq!(report.payments_by_method[0].name, "Cash");
    assert_eq!(report.payments_by_method[0].total, dec!(12.50));

    // The open session is discoverable by user
    let open = ctx
        .services
        .cashier
        .get_open_session(user)
        .await
        .expect("query");
    assert_eq!(open.map(|s| s.id), Some(session.id));
}

#[tokio::test]
async fn daily_report_sums_sessions_opened_on_the_day() {
    let ctx = TestCtx::new().await;
    let est = ctx.seed_establishment().await;
    let cash = ctx.seed_payment_method(est, "Cash", true).await;

    let first = ctx
        .services
        .cashier
        .open_session(open_request(est, Uuid::new_v4(), dec!(100.00)))
        .await
        .expect("open first");
    pay_order_with(&ctx, est, cash, dec!(25.00)).await;
    ctx.services
        .cashier
        .close_session(
            first.id,
            CloseSessionRequest {
                closing_amount: dec!(120.00),
                notes: None,
            },
        )
        .await
        .expect("close first");

    // a second drawer stays open
    let second = ctx
        .services
        .cashier
        .open_session(open_request(est, Uuid::new_v4(), dec!(50.00)))
        .await
        .expect("open second");
    pay_order_with(&ctx, est, cash, dec!(10.00)).await;

    let report = ctx
        .services
        .cashier
        .daily_report(est, chrono::Utc::now().date_naive())
        .await
        .expect("daily report");

    assert_eq!(report.sessions_count, 2);
    assert_eq!(report.sessions.len(), 2);
    assert_eq!(report.sessions[0].session.id, first.id);
    assert_eq!(report.sessions[1].session.id, second.id);
    assert_eq!(report.revenue, dec!(35.00));
    assert_eq!(report.cash_payments, dec!(35.00));
    // first drawer closed 5 short (expected 125, declared 120)
    assert_eq!(report.total_difference, dec!(-5.00));
}
