use chrono::{DateTime, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IsolationLevel, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        establishment,
        order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel},
        order_item::{self, Entity as OrderItemEntity},
        order_status_history::{self, Entity as StatusHistoryEntity},
        product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::order_status::{self, OrderStatus},
};

/// Request/response types for the order service

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderItemRequest {
    pub product_id: Uuid,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,

    /// Overrides the product's current price when present
    pub unit_price: Option<Decimal>,

    /// Line discount, defaults to 0
    pub discount: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub establishment_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub waiter_id: Option<Uuid>,
    pub table_id: Option<Uuid>,

    #[serde(default = "default_order_type")]
    pub order_type: String,

    #[serde(default = "default_source")]
    pub source: String,

    pub external_id: Option<String>,

    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<CreateOrderItemRequest>,

    pub discount: Option<Decimal>,
    pub delivery_fee: Option<Decimal>,
    pub service_fee: Option<Decimal>,
    pub notes: Option<String>,
}

fn default_order_type() -> String {
    "DINE_IN".to_string()
}

fn default_source() -> String {
    "POS".to_string()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub subtotal: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub establishment_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub waiter_id: Option<Uuid>,
    pub table_id: Option<Uuid>,
    pub order_type: String,
    pub source: String,
    pub external_id: Option<String>,
    pub order_number: i32,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub delivery_fee: Decimal,
    pub service_fee: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Default)]
pub struct OrderFilters {
    pub establishment_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

/// Line amounts: subtotal is unit_price x quantity, total subtracts the
/// line discount.
pub(crate) fn line_amounts(
    unit_price: Decimal,
    quantity: i32,
    discount: Decimal,
) -> (Decimal, Decimal) {
    let subtotal = unit_price * Decimal::from(quantity);
    (subtotal, subtotal - discount)
}

/// Order totals from discounted line totals: subtotal is their sum, total
/// applies the order discount and fees.
pub(crate) fn order_totals(
    line_totals: &[Decimal],
    discount: Decimal,
    delivery_fee: Decimal,
    service_fee: Decimal,
) -> (Decimal, Decimal) {
    let subtotal: Decimal = line_totals.iter().copied().sum();
    let total = subtotal - discount + delivery_fee + service_fee;
    (subtotal, total)
}

/// UTC day window containing `at`, used for per-day order numbering.
fn day_window(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = at.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// Service for creating orders and governing their status progression.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Creates an order with computed line and aggregate totals.
    ///
    /// The per-day order number allocation, the order insert, its items and
    /// the initial status-history row all share one serializable
    /// transaction; under weaker isolation two concurrent creations could
    /// both read the same highest number and allocate a duplicate.
    #[instrument(skip(self, request), fields(establishment_id = %request.establishment_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;
        for item in &request.items {
            item.validate()?;
        }

        let db = &*self.db;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = db
            .begin_with_config(Some(IsolationLevel::Serializable), None)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to start transaction for order creation");
                ServiceError::DatabaseError(e)
            })?;

        establishment::Entity::find_by_id(request.establishment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Establishment {} not found",
                    request.establishment_id
                ))
            })?;

        if let Some(external_id) = &request.external_id {
            let existing = OrderEntity::find()
                .filter(order::Column::EstablishmentId.eq(request.establishment_id))
                .filter(order::Column::ExternalId.eq(external_id.clone()))
                .one(&txn)
                .await?;

            if existing.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "Order with external id {external_id} already exists"
                )));
            }
        }

        // Price the lines against the catalog
        let mut item_models = Vec::with_capacity(request.items.len());
        let mut line_totals = Vec::with_capacity(request.items.len());

        for item in &request.items {
            let product = product::Entity::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            if !product.available {
                return Err(ServiceError::ValidationError(format!(
                    "Product {} is not available",
                    product.name
                )));
            }

            let unit_price = item.unit_price.unwrap_or(product.price);
            let discount = item.discount.unwrap_or_default();
            let (subtotal, total) = line_amounts(unit_price, item.quantity, discount);

            line_totals.push(total);
            item_models.push(order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                product_name: Set(product.name),
                quantity: Set(item.quantity),
                unit_price: Set(unit_price),
                unit_cost: Set(product.unit_cost),
                discount: Set(discount),
                subtotal: Set(subtotal),
                total: Set(total),
            });
        }

        let discount = request.discount.unwrap_or_default();
        let delivery_fee = request.delivery_fee.unwrap_or_default();
        let service_fee = request.service_fee.unwrap_or_default();
        let (subtotal, total) = order_totals(&line_totals, discount, delivery_fee, service_fee);

        // Per-establishment, per-day sequence; first order of the day gets 1
        let (day_start, day_end) = day_window(now);
        let last_today = OrderEntity::find()
            .filter(order::Column::EstablishmentId.eq(request.establishment_id))
            .filter(order::Column::CreatedAt.gte(day_start))
            .filter(order::Column::CreatedAt.lt(day_end))
            .order_by_desc(order::Column::OrderNumber)
            .one(&txn)
            .await?;
        let order_number = last_today.map(|o| o.order_number + 1).unwrap_or(1);

        let order_model = OrderActiveModel {
            id: Set(order_id),
            establishment_id: Set(request.establishment_id),
            customer_id: Set(request.customer_id),
            waiter_id: Set(request.waiter_id),
            table_id: Set(request.table_id),
            order_type: Set(request.order_type.clone()),
            source: Set(request.source.clone()),
            external_id: Set(request.external_id.clone()),
            order_number: Set(order_number),
            status: Set(OrderStatus::Pending.to_string()),
            subtotal: Set(subtotal),
            discount: Set(discount),
            delivery_fee: Set(delivery_fee),
            service_fee: Set(service_fee),
            total: Set(total),
            notes: Set(request.notes.clone()),
            delivered_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        // Items come back in the order the caller sent them
        let mut items = Vec::with_capacity(item_models.len());
        for item in item_models {
            items.push(item.insert(&txn).await?);
        }

        order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            status: Set(OrderStatus::Pending.to_string()),
            note: Set(Some("Order created".to_string())),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, order_number, total = %total, "Order created");

        self.emit(Event::OrderCreated(order_id)).await;

        Ok(model_to_response(order_model, items)?)
    }

    /// Retrieves an order with its items.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?;

        model_to_response(order, items)
    }

    /// Lists the items of an order.
    pub async fn get_order_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        let db = &*self.db;

        OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        Ok(OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?)
    }

    /// Returns the append-only status history, oldest first.
    pub async fn get_status_history(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_status_history::Model>, ServiceError> {
        let db = &*self.db;

        OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        Ok(StatusHistoryEntity::find()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .order_by_asc(order_status_history::Column::CreatedAt)
            .all(db)
            .await?)
    }

    /// Lists orders with pagination and optional filters.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filters: OrderFilters,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db;

        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(establishment_id) = filters.establishment_id {
            query = query.filter(order::Column::EstablishmentId.eq(establishment_id));
        }
        if let Some(status) = filters.status {
            query = query.filter(order::Column::Status.eq(status.to_string()));
        }

        let paginator = query.paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            let items = OrderItemEntity::find()
                .filter(order_item::Column::OrderId.eq(order.id))
                .all(db)
                .await?;
            responses.push(model_to_response(order, items)?);
        }

        Ok(OrderListResponse {
            orders: responses,
            total,
            page,
            per_page,
        })
    }

    /// Advances an order along the transition table, appending a history row.
    /// Reaching COMPLETED stamps the delivery timestamp.
    #[instrument(skip(self, note), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn transition_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        note: Option<String>,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();

        let txn = db.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "Order not found for status update");
                ServiceError::NotFound(format!("Order {order_id} not found"))
            })?;

        let current = order_status::parse_status(&order.status)?;

        if !order_status::can_transition(current, new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot transition order from {current} to {new_status}"
            )));
        }

        let mut active: OrderActiveModel = order.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Some(now));
        if new_status == OrderStatus::Completed {
            active.delivered_at = Set(Some(now));
        }
        let updated = active.update(&txn).await?;

        order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            status: Set(new_status.to_string()),
            note: Set(note),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        txn.commit().await?;

        info!(order_id = %order_id, from = %current, to = %new_status, "Order status updated");

        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status: current.to_string(),
            new_status: new_status.to_string(),
        })
        .await;
        match new_status {
            OrderStatus::Completed => self.emit(Event::OrderCompleted(order_id)).await,
            OrderStatus::Cancelled => self.emit(Event::OrderCancelled(order_id)).await,
            _ => {}
        }

        model_to_response(updated, items)
    }

    /// Cancels an order, storing the reason as the status-history note.
    #[instrument(skip(self, reason), fields(order_id = %order_id))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<OrderResponse, ServiceError> {
        self.transition_status(order_id, OrderStatus::Cancelled, reason)
            .await
    }

    /// Deletes an order; only permitted once it is CANCELLED. Items and
    /// status history go with it.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;

        let txn = db.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let status = order_status::parse_status(&order.status)?;
        if status != OrderStatus::Cancelled {
            return Err(ServiceError::BadRequest(format!(
                "Only cancelled orders can be deleted; order {order_id} is {status}"
            )));
        }

        StatusHistoryEntity::delete_many()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        OrderEntity::delete_by_id(order_id).exec(&txn).await?;

        txn.commit().await?;

        info!(order_id = %order_id, "Order deleted");

        self.emit(Event::OrderDeleted(order_id)).await;

        Ok(())
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to send order event");
            }
        }
    }
}

fn model_to_response(
    model: OrderModel,
    items: Vec<order_item::Model>,
) -> Result<OrderResponse, ServiceError> {
    let status = order_status::parse_status(&model.status)?;

    Ok(OrderResponse {
        id: model.id,
        establishment_id: model.establishment_id,
        customer_id: model.customer_id,
        waiter_id: model.waiter_id,
        table_id: model.table_id,
        order_type: model.order_type,
        source: model.source,
        external_id: model.external_id,
        order_number: model.order_number,
        status,
        subtotal: model.subtotal,
        discount: model.discount,
        delivery_fee: model.delivery_fee,
        service_fee: model.service_fee,
        total: model.total,
        notes: model.notes,
        items: items
            .into_iter()
            .map(|item| OrderItemResponse {
                id: item.id,
                product_id: item.product_id,
                product_name: item.product_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                discount: item.discount,
                subtotal: item.subtotal,
                total: item.total,
            })
            .collect(),
        delivered_at: model.delivered_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn line_amounts_subtract_discount() {
        let (subtotal, total) = line_amounts(dec!(10), 2, dec!(0));
        assert_eq!(subtotal, dec!(20));
        assert_eq!(total, dec!(20));

        let (subtotal, total) = line_amounts(dec!(5), 1, dec!(1));
        assert_eq!(subtotal, dec!(5));
        assert_eq!(total, dec!(4));
    }

    #[test]
    fn two_item_scenario_totals() {
        // (10 x 2, discount 0) and (5 x 1, discount 1) with no fees
        let lines = vec![
            line_amounts(dec!(10), 2, dec!(0)).1,
            line_amounts(dec!(5), 1, dec!(1)).1,
        ];
        let (subtotal, total) = order_totals(&lines, dec!(0), dec!(0), dec!(0));
        assert_eq!(subtotal, dec!(24));
        assert_eq!(total, dec!(24));
    }

    #[test]
    fn fees_and_order_discount_apply() {
        let lines = vec![dec!(30), dec!(20)];
        let (subtotal, total) = order_totals(&lines, dec!(5), dec!(7), dec!(3));
        assert_eq!(subtotal, dec!(50));
        assert_eq!(total, dec!(55));
    }

    proptest! {
        /// total == sum(line subtotal - line discount) - order discount
        ///          + delivery fee + service fee
        #[test]
        fn total_formula_holds(
            lines in prop::collection::vec((1u32..10_000, 1i32..50, 0u32..500), 1..12),
            order_discount in 0u32..1_000,
            delivery_fee in 0u32..1_000,
            service_fee in 0u32..1_000,
        ) {
            let cents = |n: u32| Decimal::new(n as i64, 2);

            let mut expected = Decimal::ZERO;
            let mut line_totals = Vec::new();
            for (price, qty, disc) in &lines {
                let (subtotal, total) = line_amounts(cents(*price), *qty, cents(*disc));
                prop_assert_eq!(subtotal, cents(*price) * Decimal::from(*qty));
                expected += subtotal - cents(*disc);
                line_totals.push(total);
            }
            expected = expected - cents(order_discount) + cents(delivery_fee) + cents(service_fee);

            let (_, total) = order_totals(
                &line_totals,
                cents(order_discount),
                cents(delivery_fee),
                cents(service_fee),
            );
            prop_assert_eq!(total, expected);
        }
    }
}
