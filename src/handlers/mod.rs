pub mod cashier;
pub mod catalog;
pub mod common;
pub mod orders;
pub mod payments;
pub mod reports;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;

pub use crate::AppState;

/// Business-logic services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<crate::services::orders::OrderService>,
    pub payments: Arc<crate::services::payments::PaymentService>,
    pub cashier: Arc<crate::services::cashier::CashierService>,
    pub reports: Arc<crate::services::reports::SalesReportService>,
    pub catalog: Arc<crate::services::catalog::CatalogService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            orders: Arc::new(crate::services::orders::OrderService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            payments: Arc::new(crate::services::payments::PaymentService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            cashier: Arc::new(crate::services::cashier::CashierService::new(
                db_pool.clone(),
                event_sender,
            )),
            reports: Arc::new(crate::services::reports::SalesReportService::new(
                db_pool.clone(),
            )),
            catalog: Arc::new(crate::services::catalog::CatalogService::new(db_pool)),
        }
    }
}
