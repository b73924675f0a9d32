#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use sea_orm_migration::MigratorTrait;
use tokio::sync::mpsc;
use uuid::Uuid;

use mesa_api::{
    db::{self, DbConfig, DbPool},
    events::{self, EventSender},
    handlers::AppServices,
    migrator::Migrator,
    services::catalog::{
        CreateEstablishmentRequest, CreatePaymentMethodRequest, CreateProductRequest,
    },
};

/// Test harness over an in-memory SQLite database with migrations applied.
///
/// The pool is pinned to a single connection so every query sees the same
/// in-memory database.
pub struct TestCtx {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestCtx {
    pub async fn new() -> Self {
        let config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(5),
        };

        let pool = db::establish_connection_with_config(&config)
            .await
            .expect("failed to open test database");
        Migrator::up(&pool, None)
            .await
            .expect("failed to run migrations");

        let db = Arc::new(pool);
        let (tx, rx) = mpsc::channel(64);
        let event_task = tokio::spawn(events::process_events(rx));
        let services = AppServices::new(db.clone(), Some(Arc::new(EventSender::new(tx))));

        Self {
            db,
            services,
            _event_task: event_task,
        }
    }

    pub async fn seed_establishment(&self) -> Uuid {
        let slug = format!("test-{}", Uuid::new_v4());
        let model = self
            .services
            .catalog
            .create_establishment(CreateEstablishmentRequest {
                name: "Test Bistro".to_string(),
                slug,
            })
            .await
            .expect("failed to seed establishment");
        model.id
    }

    pub async fn seed_product(
        &self,
        establishment_id: Uuid,
        name: &str,
        price: Decimal,
        unit_cost: Option<Decimal>,
    ) -> Uuid {
        let model = self
            .services
            .catalog
            .create_product(
                establishment_id,
                CreateProductRequest {
                    name: name.to_string(),
                    price,
                    unit_cost,
                    available: true,
                },
            )
            .await
            .expect("failed to seed product");
        model.id
    }

    pub async fn seed_payment_method(
        &self,
        establishment_id: Uuid,
        name: &str,
        requires_change: bool,
    ) -> Uuid {
        let model = self
            .services
            .catalog
            .create_payment_method(
                establishment_id,
                CreatePaymentMethodRequest {
                    name: name.to_string(),
                    kind: if requires_change { "CASH" } else { "CARD" }.to_string(),
                    fee_percentage: None,
                    fixed_fee: None,
                    requires_change,
                },
            )
            .await
            .expect("failed to seed payment method");
        model.id
    }
}
