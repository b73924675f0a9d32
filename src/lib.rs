//! Mesa API Library
//!
//! Multi-tenant point-of-sale core: order lifecycle, payment settlement,
//! cashier sessions and sales reporting.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Option<Arc<events::EventSender>>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Option<Arc<events::EventSender>>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone());
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = match db::check_connection(&state.db).await {
        Ok(()) => "up",
        Err(_) => "down",
    };

    Json(json!({
        "status": if database == "up" { "healthy" } else { "degraded" },
        "database": database,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn openapi_spec() -> Json<Value> {
    Json(openapi::spec_json())
}

/// All /api/v1 routes. State is attached by the caller.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest(
            "/orders",
            handlers::orders::routes().merge(handlers::payments::order_routes()),
        )
        .nest("/payments", handlers::payments::routes())
        .nest("/cashier", handlers::cashier::routes())
        .nest(
            "/establishments",
            handlers::catalog::establishment_routes().merge(handlers::reports::routes()),
        )
        .nest("/products", handlers::catalog::product_routes())
        .nest(
            "/payment-methods",
            handlers::catalog::payment_method_routes(),
        )
        .route("/openapi.json", get(openapi_spec))
}

/// Builds the full application router with the state applied.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/health", get(health))
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}
