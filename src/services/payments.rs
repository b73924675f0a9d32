use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        order::Entity as OrderEntity,
        payment::{self, Entity as PaymentEntity},
        payment_method::{self, Entity as PaymentMethodEntity},
        sale::{self, Entity as SaleEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Maximum allowed gap between a split-payment total and the order total.
pub const SPLIT_TOLERANCE: Decimal = dec!(0.01);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalePaymentStatus {
    Pending,
    Partial,
    Paid,
}

/// Sale aggregate from the sum of PAID payments: paid, change and the
/// derived payment status. The paid == total boundary counts as PAID.
pub(crate) fn sale_aggregate(
    total: Decimal,
    paid: Decimal,
) -> (Decimal, Decimal, SalePaymentStatus) {
    let change = (paid - total).max(Decimal::ZERO);
    let status = if paid.is_zero() {
        SalePaymentStatus::Pending
    } else if paid < total {
        SalePaymentStatus::Partial
    } else {
        SalePaymentStatus::Paid
    };

    (paid, change, status)
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecordPaymentRequest {
    pub sale_id: Uuid,
    pub payment_method_id: Uuid,
    pub amount: Decimal,
    /// Defaults to PAID when omitted
    pub status: Option<PaymentStatus>,
    pub transaction_id: Option<String>,
    pub authorization_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct PaymentItemRequest {
    pub payment_method_id: Uuid,
    pub amount: Decimal,
    pub transaction_id: Option<String>,
    pub authorization_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProcessOrderPaymentRequest {
    #[validate(length(min = 1, message = "At least one payment is required"))]
    pub payments: Vec<PaymentItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub payment_method_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub authorization_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SaleResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub establishment_id: Uuid,
    pub seller_id: Option<Uuid>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub paid: Decimal,
    pub change: Decimal,
    pub payment_status: SalePaymentStatus,
    pub payments: Vec<PaymentResponse>,
}

/// Service recording payments against sales and keeping each sale's
/// paid/change/payment_status aggregate consistent.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl PaymentService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Records a single payment against an existing sale.
    ///
    /// Rejects when the method is missing or inactive, the sale is missing,
    /// or the new amount would push the non-refunded total above the sale
    /// total. Insert and aggregate recompute share one transaction.
    #[instrument(skip(self, request), fields(sale_id = %request.sale_id, amount = %request.amount))]
    pub async fn record_payment(
        &self,
        request: RecordPaymentRequest,
    ) -> Result<PaymentResponse, ServiceError> {
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Payment amount must be positive".to_string(),
            ));
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for payment");
            ServiceError::DatabaseError(e)
        })?;

        let method = Self::active_method(&txn, request.payment_method_id).await?;

        let sale = SaleEntity::find_by_id(request.sale_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", request.sale_id)))?;

        let committed: Decimal = PaymentEntity::find()
            .filter(payment::Column::SaleId.eq(sale.id))
            .filter(payment::Column::Status.ne(PaymentStatus::Refunded.to_string()))
            .all(&txn)
            .await?
            .iter()
            .map(|p| p.amount)
            .sum();

        if committed + request.amount > sale.total {
            return Err(ServiceError::BadRequest(format!(
                "Payment of {} exceeds the sale's remaining balance of {}",
                request.amount,
                sale.total - committed
            )));
        }

        let status = request.status.unwrap_or(PaymentStatus::Paid);
        let model = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            sale_id: Set(sale.id),
            payment_method_id: Set(method.id),
            amount: Set(request.amount),
            status: Set(status.to_string()),
            transaction_id: Set(request.transaction_id),
            authorization_code: Set(request.authorization_code),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        Self::recompute_sale(&txn, sale).await?;

        txn.commit().await?;

        info!(payment_id = %model.id, sale_id = %model.sale_id, "Payment recorded");

        self.emit(Event::PaymentRecorded {
            payment_id: model.id,
            sale_id: model.sale_id,
            amount: model.amount,
        })
        .await;

        payment_to_response(model)
    }

    /// Settles a whole order with one or more payment methods in a single
    /// call. The order's sale is reused or created lazily; the split must
    /// match the order total within `SPLIT_TOLERANCE` and fit the sale's
    /// remaining balance, or nothing persists. A fully settled order
    /// therefore always rejects a second settlement.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn process_order_payment(
        &self,
        order_id: Uuid,
        request: ProcessOrderPaymentRequest,
    ) -> Result<SaleResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db;
        let txn = db.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let requested: Decimal = request.payments.iter().map(|p| p.amount).sum();
        if (requested - order.total).abs() > SPLIT_TOLERANCE {
            return Err(ServiceError::BadRequest(format!(
                "Split payments total {} does not match order total {}",
                requested, order.total
            )));
        }

        for item in &request.payments {
            if item.amount <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Payment amount must be positive".to_string(),
                ));
            }
        }

        let (sale, created) = match SaleEntity::find()
            .filter(sale::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?
        {
            Some(sale) => {
                // A reused sale may already have collected money; the new
                // split must fit the remaining balance or the order would
                // settle twice.
                let committed: Decimal = PaymentEntity::find()
                    .filter(payment::Column::SaleId.eq(sale.id))
                    .filter(payment::Column::Status.ne(PaymentStatus::Refunded.to_string()))
                    .all(&txn)
                    .await?
                    .iter()
                    .map(|p| p.amount)
                    .sum();
                if committed + requested > sale.total + SPLIT_TOLERANCE {
                    return Err(ServiceError::BadRequest(format!(
                        "Order {} already has {} collected; another {} would exceed its total {}",
                        order_id, committed, requested, sale.total
                    )));
                }
                (sale, false)
            }
            None => {
                let now = Utc::now();
                let sale = sale::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order.id),
                    establishment_id: Set(order.establishment_id),
                    seller_id: Set(order.waiter_id),
                    subtotal: Set(order.subtotal),
                    discount: Set(order.discount),
                    total: Set(order.total),
                    paid: Set(Decimal::ZERO),
                    change: Set(Decimal::ZERO),
                    payment_status: Set(SalePaymentStatus::Pending.to_string()),
                    created_at: Set(now),
                    updated_at: Set(Some(now)),
                }
                .insert(&txn)
                .await?;
                (sale, true)
            }
        };

        let mut recorded = Vec::with_capacity(request.payments.len());
        for item in &request.payments {
            let method = Self::active_method(&txn, item.payment_method_id).await?;

            let model = payment::ActiveModel {
                id: Set(Uuid::new_v4()),
                sale_id: Set(sale.id),
                payment_method_id: Set(method.id),
                amount: Set(item.amount),
                status: Set(PaymentStatus::Paid.to_string()),
                transaction_id: Set(item.transaction_id.clone()),
                authorization_code: Set(item.authorization_code.clone()),
                created_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
            recorded.push(model);
        }

        let updated_sale = Self::recompute_sale(&txn, sale).await?;

        txn.commit().await?;

        info!(
            order_id = %order_id,
            sale_id = %updated_sale.id,
            payments = recorded.len(),
            "Order payment processed"
        );

        if created {
            self.emit(Event::SaleCreated {
                sale_id: updated_sale.id,
                order_id,
            })
            .await;
        }
        for model in &recorded {
            self.emit(Event::PaymentRecorded {
                payment_id: model.id,
                sale_id: model.sale_id,
                amount: model.amount,
            })
            .await;
        }

        sale_to_response(updated_sale, recorded)
    }

    /// Refunds a PAID payment. The row keeps its amount and flips to
    /// REFUNDED, which removes it from the sale's paid sum on recompute.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn refund_payment(&self, payment_id: Uuid) -> Result<PaymentResponse, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;

        let payment = PaymentEntity::find_by_id(payment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {payment_id} not found")))?;

        let status = PaymentStatus::from_str(&payment.status).map_err(|_| {
            ServiceError::InternalError(format!("Corrupt payment status: {}", payment.status))
        })?;
        if status != PaymentStatus::Paid {
            return Err(ServiceError::BadRequest(format!(
                "Only paid payments can be refunded; payment {payment_id} is {status}"
            )));
        }

        let sale_id = payment.sale_id;
        let amount = payment.amount;

        let mut active: payment::ActiveModel = payment.into();
        active.status = Set(PaymentStatus::Refunded.to_string());
        let updated = active.update(&txn).await?;

        let sale = SaleEntity::find_by_id(sale_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {sale_id} not found")))?;
        Self::recompute_sale(&txn, sale).await?;

        txn.commit().await?;

        info!(payment_id = %payment_id, sale_id = %sale_id, "Payment refunded");

        self.emit(Event::PaymentRefunded {
            payment_id,
            sale_id,
            amount,
        })
        .await;

        payment_to_response(updated)
    }

    /// Returns the sale for an order with its payments.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_sale_for_order(&self, order_id: Uuid) -> Result<SaleResponse, ServiceError> {
        let db = &*self.db;

        let sale = SaleEntity::find()
            .filter(sale::Column::OrderId.eq(order_id))
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {order_id} has no sale yet"))
            })?;

        let payments = PaymentEntity::find()
            .filter(payment::Column::SaleId.eq(sale.id))
            .all(db)
            .await?;

        sale_to_response(sale, payments)
    }

    async fn active_method<C: ConnectionTrait>(
        conn: &C,
        method_id: Uuid,
    ) -> Result<payment_method::Model, ServiceError> {
        let method = PaymentMethodEntity::find_by_id(method_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment method {method_id} not found"))
            })?;

        if !method.active {
            return Err(ServiceError::ValidationError(format!(
                "Payment method {} is not active",
                method.name
            )));
        }

        Ok(method)
    }

    /// Recomputes a sale's paid/change/payment_status from its PAID payments.
    async fn recompute_sale<C: ConnectionTrait>(
        conn: &C,
        sale: sale::Model,
    ) -> Result<sale::Model, ServiceError> {
        let paid_sum: Decimal = PaymentEntity::find()
            .filter(payment::Column::SaleId.eq(sale.id))
            .filter(payment::Column::Status.eq(PaymentStatus::Paid.to_string()))
            .all(conn)
            .await?
            .iter()
            .map(|p| p.amount)
            .sum();

        let (paid, change, status) = sale_aggregate(sale.total, paid_sum);

        let mut active: sale::ActiveModel = sale.into();
        active.paid = Set(paid);
        active.change = Set(change);
        active.payment_status = Set(status.to_string());
        active.updated_at = Set(Some(Utc::now()));

        Ok(active.update(conn).await?)
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to send payment event");
            }
        }
    }
}

fn payment_to_response(model: payment::Model) -> Result<PaymentResponse, ServiceError> {
    let status = PaymentStatus::from_str(&model.status).map_err(|_| {
        ServiceError::InternalError(format!("Corrupt payment status: {}", model.status))
    })?;

    Ok(PaymentResponse {
        id: model.id,
        sale_id: model.sale_id,
        payment_method_id: model.payment_method_id,
        amount: model.amount,
        status,
        transaction_id: model.transaction_id,
        authorization_code: model.authorization_code,
        created_at: model.created_at,
    })
}

fn sale_to_response(
    sale: sale::Model,
    payments: Vec<payment::Model>,
) -> Result<SaleResponse, ServiceError> {
    let payment_status = SalePaymentStatus::from_str(&sale.payment_status).map_err(|_| {
        ServiceError::InternalError(format!("Corrupt sale payment status: {}", sale.payment_status))
    })?;

    Ok(SaleResponse {
        id: sale.id,
        order_id: sale.order_id,
        establishment_id: sale.establishment_id,
        seller_id: sale.seller_id,
        subtotal: sale.subtotal,
        discount: sale.discount,
        total: sale.total,
        paid: sale.paid,
        change: sale.change,
        payment_status,
        payments: payments
            .into_iter()
            .map(payment_to_response)
            .collect::<Result<_, _>>()?,
    })
}
