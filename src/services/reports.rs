use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        order::{self, Entity as OrderEntity},
        order_item::{self, Entity as OrderItemEntity},
        payment::{self, Entity as PaymentEntity},
        payment_method::Entity as PaymentMethodEntity,
        sale::{self, Entity as SaleEntity},
    },
    errors::ServiceError,
    services::{
        order_status::OrderStatus,
        payments::{PaymentStatus, SalePaymentStatus},
    },
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct ReportRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethodBreakdown {
    pub payment_method_id: Uuid,
    pub name: String,
    pub count: u64,
    pub total: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusBreakdown {
    pub status: OrderStatus,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentStatusBreakdown {
    pub status: SalePaymentStatus,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i64,
    pub revenue: Decimal,
    /// Revenue minus acquisition cost; lines without a recorded unit cost
    /// contribute cost 0.
    pub profit: Decimal,
}

/// Sales summary for one establishment over a half-open [from, to) window.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SalesSummary {
    pub establishment_id: Uuid,
    pub range: ReportRange,
    pub sales_count: u64,
    pub gross_revenue: Decimal,
    pub total_discount: Decimal,
    pub total_paid: Decimal,
    pub total_cost: Decimal,
    pub total_profit: Decimal,
    pub average_ticket: Decimal,
    pub orders_by_status: Vec<StatusBreakdown>,
    pub sales_by_payment_status: Vec<PaymentStatusBreakdown>,
    pub payments_by_method: Vec<PaymentMethodBreakdown>,
    pub top_products: Vec<TopProduct>,
}

const TOP_PRODUCTS_LIMIT: usize = 10;

#[derive(Debug, Default, Clone)]
struct ProductAccumulator {
    name: String,
    quantity: i64,
    revenue: Decimal,
    cost: Decimal,
}

/// Cost of one order line; a missing unit cost counts as zero.
pub(crate) fn line_cost(quantity: i32, unit_cost: Option<Decimal>) -> Decimal {
    unit_cost.unwrap_or_default() * Decimal::from(quantity)
}

/// Folds order lines into per-product totals ranked by revenue.
pub(crate) fn rank_products(
    lines: impl IntoIterator<Item = (Uuid, String, i32, Decimal, Option<Decimal>)>,
) -> Vec<TopProduct> {
    let mut by_product: HashMap<Uuid, ProductAccumulator> = HashMap::new();

    for (product_id, name, quantity, total, unit_cost) in lines {
        let acc = by_product.entry(product_id).or_default();
        if acc.name.is_empty() {
            acc.name = name;
        }
        acc.quantity += i64::from(quantity);
        acc.revenue += total;
        acc.cost += line_cost(quantity, unit_cost);
    }

    let mut ranked: Vec<TopProduct> = by_product
        .into_iter()
        .map(|(product_id, acc)| TopProduct {
            product_id,
            product_name: acc.name,
            quantity: acc.quantity,
            revenue: acc.revenue,
            profit: acc.revenue - acc.cost,
        })
        .collect();

    ranked.sort_by(|a, b| b.revenue.cmp(&a.revenue).then(a.product_name.cmp(&b.product_name)));
    ranked.truncate(TOP_PRODUCTS_LIMIT);
    ranked
}

/// Read-only aggregation over sales, payments and order lines.
#[derive(Clone)]
pub struct SalesReportService {
    db: Arc<DbPool>,
}

impl SalesReportService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(establishment_id = %establishment_id))]
    pub async fn sales_summary(
        &self,
        establishment_id: Uuid,
        range: ReportRange,
    ) -> Result<SalesSummary, ServiceError> {
        if range.to <= range.from {
            return Err(ServiceError::ValidationError(
                "Report range end must be after its start".to_string(),
            ));
        }

        let db = &*self.db;

        let sales = SaleEntity::find()
            .filter(sale::Column::EstablishmentId.eq(establishment_id))
            .filter(sale::Column::CreatedAt.gte(range.from))
            .filter(sale::Column::CreatedAt.lt(range.to))
            .all(db)
            .await?;

        let sales_count = sales.len() as u64;
        let gross_revenue: Decimal = sales.iter().map(|s| s.total).sum();
        let total_discount: Decimal = sales.iter().map(|s| s.discount).sum();
        let total_paid: Decimal = sales.iter().map(|s| s.paid).sum();
        let average_ticket = if sales_count == 0 {
            Decimal::ZERO
        } else {
            gross_revenue / Decimal::from(sales_count)
        };

        let mut by_payment_status: HashMap<SalePaymentStatus, u64> = HashMap::new();
        for s in &sales {
            let status = SalePaymentStatus::from_str(&s.payment_status).map_err(|_| {
                ServiceError::InternalError(format!(
                    "Corrupt sale payment status: {}",
                    s.payment_status
                ))
            })?;
            *by_payment_status.entry(status).or_insert(0) += 1;
        }
        let mut sales_by_payment_status: Vec<_> = by_payment_status
            .into_iter()
            .map(|(status, count)| PaymentStatusBreakdown { status, count })
            .collect();
        sales_by_payment_status.sort_by_key(|b| std::cmp::Reverse(b.count));

        let sale_ids: Vec<Uuid> = sales.iter().map(|s| s.id).collect();
        let order_ids: Vec<Uuid> = sales.iter().map(|s| s.order_id).collect();

        let payments_by_method = if sale_ids.is_empty() {
            Vec::new()
        } else {
            let rows = PaymentEntity::find()
                .find_also_related(PaymentMethodEntity)
                .filter(payment::Column::SaleId.is_in(sale_ids))
                .filter(payment::Column::Status.eq(PaymentStatus::Paid.to_string()))
                .all(db)
                .await?;

            let mut by_method: HashMap<Uuid, PaymentMethodBreakdown> = HashMap::new();
            for (p, method) in rows {
                let name = method.map(|m| m.name).unwrap_or_default();
                let entry =
                    by_method
                        .entry(p.payment_method_id)
                        .or_insert_with(|| PaymentMethodBreakdown {
                            payment_method_id: p.payment_method_id,
                            name,
                            count: 0,
                            total: Decimal::ZERO,
                        });
                entry.count += 1;
                entry.total += p.amount;
            }
            let mut breakdown: Vec<_> = by_method.into_values().collect();
            breakdown.sort_by(|a, b| b.total.cmp(&a.total).then(a.name.cmp(&b.name)));
            breakdown
        };

        let orders = OrderEntity::find()
            .filter(order::Column::EstablishmentId.eq(establishment_id))
            .filter(order::Column::CreatedAt.gte(range.from))
            .filter(order::Column::CreatedAt.lt(range.to))
            .all(db)
            .await?;

        let mut by_status: HashMap<OrderStatus, u64> = HashMap::new();
        for o in &orders {
            let status = crate::services::order_status::parse_status(&o.status)?;
            *by_status.entry(status).or_insert(0) += 1;
        }
        let mut orders_by_status: Vec<_> = by_status
            .into_iter()
            .map(|(status, count)| StatusBreakdown { status, count })
            .collect();
        orders_by_status.sort_by_key(|b| std::cmp::Reverse(b.count));

        // Cost, profit and top products count only orders that settled into
        // a sale.
        let (total_cost, top_products) = if order_ids.is_empty() {
            (Decimal::ZERO, Vec::new())
        } else {
            let items = OrderItemEntity::find()
                .filter(order_item::Column::OrderId.is_in(order_ids))
                .all(db)
                .await?;
            let total_cost: Decimal = items
                .iter()
                .map(|i| line_cost(i.quantity, i.unit_cost))
                .sum();
            let ranked = rank_products(items.into_iter().map(|i| {
                (i.product_id, i.product_name, i.quantity, i.total, i.unit_cost)
            }));
            (total_cost, ranked)
        };

        Ok(SalesSummary {
            establishment_id,
            range,
            sales_count,
            gross_revenue,
            total_discount,
            total_paid,
            total_cost,
            total_profit: gross_revenue - total_cost,
            average_ticket,
            orders_by_status,
            sales_by_payment_status,
            payments_by_method,
            top_products,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(
        id: Uuid,
        name: &str,
        qty: i32,
        total: Decimal,
        cost: Option<Decimal>,
    ) -> (Uuid, String, i32, Decimal, Option<Decimal>) {
        (id, name.to_string(), qty, total, cost)
    }

    #[test]
    fn ranks_products_by_revenue() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let ranked = rank_products(vec![
            line(a, "Burger", 2, dec!(24), Some(dec!(4))),
            line(b, "Soda", 5, dec!(15), Some(dec!(1))),
            line(a, "Burger", 1, dec!(12), Some(dec!(4))),
        ]);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].product_id, a);
        assert_eq!(ranked[0].quantity, 3);
        assert_eq!(ranked[0].revenue, dec!(36));
        // cost = 3 units at 4
        assert_eq!(ranked[0].profit, dec!(24));
        assert_eq!(ranked[1].product_id, b);
        assert_eq!(ranked[1].profit, dec!(10));
    }

    #[test]
    fn missing_cost_counts_as_zero() {
        let a = Uuid::new_v4();
        let ranked = rank_products(vec![
            line(a, "Special", 1, dec!(30), Some(dec!(10))),
            line(a, "Special", 1, dec!(30), None),
        ]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].revenue, dec!(60));
        assert_eq!(ranked[0].profit, dec!(50));

        assert_eq!(line_cost(3, None), dec!(0));
        assert_eq!(line_cost(3, Some(dec!(2))), dec!(6));
    }

    #[test]
    fn truncates_to_the_limit() {
        let lines: Vec<_> = (0..15)
            .map(|i| line(Uuid::new_v4(), "P", 1, Decimal::from(i + 1), None))
            .collect();
        let ranked = rank_products(lines);
        assert_eq!(ranked.len(), TOP_PRODUCTS_LIMIT);
        assert_eq!(ranked[0].revenue, dec!(15));
    }
}
