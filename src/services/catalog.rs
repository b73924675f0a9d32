use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        establishment::{self, Entity as EstablishmentEntity},
        payment_method::{self, Entity as PaymentMethodEntity},
        product::{self, Entity as ProductEntity},
    },
    errors::ServiceError,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateEstablishmentRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be between 1 and 120 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 120, message = "Slug must be between 1 and 120 characters"))]
    pub slug: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be between 1 and 120 characters"))]
    pub name: String,
    pub price: Decimal,
    pub unit_cost: Option<Decimal>,
    #[serde(default = "default_true")]
    pub available: bool,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePaymentMethodRequest {
    #[validate(length(min = 1, max = 80, message = "Name must be between 1 and 80 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 40, message = "Kind must be between 1 and 40 characters"))]
    pub kind: String,
    pub fee_percentage: Option<Decimal>,
    pub fixed_fee: Option<Decimal>,
    #[serde(default)]
    pub requires_change: bool,
}

fn default_true() -> bool {
    true
}

/// Catalog maintenance for a tenant: the establishment record itself, its
/// sellable products and its accepted payment methods.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(slug = %request.slug))]
    pub async fn create_establishment(
        &self,
        request: CreateEstablishmentRequest,
    ) -> Result<establishment::Model, ServiceError> {
        request.validate()?;

        let db = &*self.db;

        let taken = EstablishmentEntity::find()
            .filter(establishment::Column::Slug.eq(request.slug.clone()))
            .one(db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Slug '{}' is already in use",
                request.slug
            )));
        }

        let model = establishment::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            slug: Set(request.slug),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await?;

        info!(establishment_id = %model.id, slug = %model.slug, "Establishment created");
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn get_establishment(
        &self,
        establishment_id: Uuid,
    ) -> Result<establishment::Model, ServiceError> {
        EstablishmentEntity::find_by_id(establishment_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Establishment {establishment_id} not found"))
            })
    }

    #[instrument(skip(self))]
    pub async fn list_establishments(&self) -> Result<Vec<establishment::Model>, ServiceError> {
        Ok(EstablishmentEntity::find()
            .order_by_asc(establishment::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, request), fields(establishment_id = %establishment_id))]
    pub async fn create_product(
        &self,
        establishment_id: Uuid,
        request: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;
        if request.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }

        self.get_establishment(establishment_id).await?;

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            establishment_id: Set(establishment_id),
            name: Set(request.name),
            price: Set(request.price),
            unit_cost: Set(request.unit_cost),
            available: Set(request.available),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = %model.id, name = %model.name, "Product created");
        Ok(model)
    }

    /// Products for an establishment, optionally restricted to available ones.
    #[instrument(skip(self), fields(establishment_id = %establishment_id))]
    pub async fn list_products(
        &self,
        establishment_id: Uuid,
        only_available: bool,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let mut query = ProductEntity::find()
            .filter(product::Column::EstablishmentId.eq(establishment_id));
        if only_available {
            query = query.filter(product::Column::Available.eq(true));
        }
        Ok(query.order_by_asc(product::Column::Name).all(&*self.db).await?)
    }

    /// Sets a product's availability. Idempotent: setting the current value
    /// succeeds and changes nothing.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn set_product_availability(
        &self,
        product_id: Uuid,
        available: bool,
    ) -> Result<product::Model, ServiceError> {
        let db = &*self.db;

        let model = ProductEntity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;

        if model.available == available {
            return Ok(model);
        }

        let mut active: product::ActiveModel = model.into();
        active.available = Set(available);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(db).await?;

        info!(product_id = %product_id, available, "Product availability changed");
        Ok(updated)
    }

    #[instrument(skip(self, request), fields(establishment_id = %establishment_id))]
    pub async fn create_payment_method(
        &self,
        establishment_id: Uuid,
        request: CreatePaymentMethodRequest,
    ) -> Result<payment_method::Model, ServiceError> {
        request.validate()?;

        self.get_establishment(establishment_id).await?;

        let model = payment_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            establishment_id: Set(establishment_id),
            name: Set(request.name),
            kind: Set(request.kind),
            active: Set(true),
            fee_percentage: Set(request.fee_percentage),
            fixed_fee: Set(request.fixed_fee),
            requires_change: Set(request.requires_change),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await?;

        info!(payment_method_id = %model.id, name = %model.name, "Payment method created");
        Ok(model)
    }

    #[instrument(skip(self), fields(establishment_id = %establishment_id))]
    pub async fn list_payment_methods(
        &self,
        establishment_id: Uuid,
        only_active: bool,
    ) -> Result<Vec<payment_method::Model>, ServiceError> {
        let mut query = PaymentMethodEntity::find()
            .filter(payment_method::Column::EstablishmentId.eq(establishment_id));
        if only_active {
            query = query.filter(payment_method::Column::Active.eq(true));
        }
        Ok(query
            .order_by_asc(payment_method::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Activates or deactivates a payment method. Existing payments that
    /// reference it are untouched.
    #[instrument(skip(self), fields(payment_method_id = %payment_method_id))]
    pub async fn set_payment_method_active(
        &self,
        payment_method_id: Uuid,
        active: bool,
    ) -> Result<payment_method::Model, ServiceError> {
        let db = &*self.db;

        let model = PaymentMethodEntity::find_by_id(payment_method_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment method {payment_method_id} not found"))
            })?;

        if model.active == active {
            return Ok(model);
        }

        let mut update: payment_method::ActiveModel = model.into();
        update.active = Set(active);
        update.updated_at = Set(Some(Utc::now()));
        let updated = update.update(db).await?;

        info!(payment_method_id = %payment_method_id, active, "Payment method toggled");
        Ok(updated)
    }
}
