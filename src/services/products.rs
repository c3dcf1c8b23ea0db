use crate::{
    db::DbPool,
    entities::{
        lot::{self, Entity as Lot},
        product::{self, Entity as Product, ProductStatus},
    },
    errors::ServiceError,
    validation::{validate_ean13, validate_gtin, validate_not_blank},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Input for registering a product
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct NewProduct {
    /// GTIN/EAN-13; separators are ignored and the 13 digits are stored
    #[validate(custom = "validate_gtin")]
    #[schema(example = "7790001000019")]
    pub gtin: String,
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    #[schema(example = "Amoxicillin 500mg x 21")]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub manufacturer: String,
    #[serde(default)]
    pub status: Option<ProductStatus>,
}

/// Editable product fields; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct ProductUpdate {
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub manufacturer: Option<String>,
    pub status: Option<ProductStatus>,
}

/// Filters for listing products
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ProductFilter {
    pub status: Option<ProductStatus>,
    /// Substring match on GTIN, name or manufacturer
    pub search: Option<String>,
}

/// A product together with its lots
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: product::Model,
    pub lots: Vec<lot::Model>,
}

/// Digits-only form of a GTIN, used for storage and uniqueness.
pub fn canonical_gtin(raw: &str) -> Result<String, ServiceError> {
    let digits = validate_ean13(raw).map_err(|e| ServiceError::validation("gtin", e.to_string()))?;
    Ok(digits.iter().map(|d| char::from(b'0' + d)).collect())
}

/// Service for managing products
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
}

impl ProductService {
    /// Creates a new product service instance
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Registers a new product. The GTIN must be valid and unused.
    #[instrument(skip(self))]
    pub async fn create_product(&self, input: NewProduct) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let gtin = canonical_gtin(&input.gtin)?;

        let existing = Product::find()
            .filter(product::Column::Gtin.eq(gtin.as_str()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "product with GTIN {} already exists",
                gtin
            )));
        }

        let now = Utc::now();
        let product = product::ActiveModel {
            gtin: Set(gtin),
            name: Set(input.name.trim().to_string()),
            manufacturer: Set(input.manufacturer.trim().to_string()),
            status: Set(input.status.unwrap_or_default()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(product_id = product.id, gtin = %product.gtin, "Product created");
        Ok(product)
    }

    /// Get a product by ID
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: i64) -> Result<product::Model, ServiceError> {
        Product::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("product {} not found", id)))
    }

    /// Get a product with its lots, earliest expiry first
    #[instrument(skip(self))]
    pub async fn get_product_detail(&self, id: i64) -> Result<ProductDetail, ServiceError> {
        let product = self.get_product(id).await?;
        let lots = Lot::find()
            .filter(lot::Column::ProductId.eq(id))
            .order_by_asc(lot::Column::ExpiryDate)
            .order_by_asc(lot::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(ProductDetail { product, lots })
    }

    /// Looks a product up by GTIN in any accepted notation
    #[instrument(skip(self))]
    pub async fn find_by_gtin(&self, gtin: &str) -> Result<product::Model, ServiceError> {
        let gtin = canonical_gtin(gtin)?;
        Product::find()
            .filter(product::Column::Gtin.eq(gtin.as_str()))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("product with GTIN {} not found", gtin)))
    }

    /// List products with pagination, ordered by name
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = Product::find();

        if let Some(status) = filter.status {
            query = query.filter(product::Column::Status.eq(status));
        }

        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(product::Column::Gtin.contains(term))
                    .add(product::Column::Name.contains(term))
                    .add(product::Column::Manufacturer.contains(term)),
            );
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .order_by_asc(product::Column::Id)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let products = paginator
            .fetch_page(super::page_index(page))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((products, total))
    }

    /// Updates name, manufacturer or status. The GTIN is immutable.
    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        id: i64,
        update: ProductUpdate,
    ) -> Result<product::Model, ServiceError> {
        update.validate()?;
        let existing = self.get_product(id).await?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = update.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(manufacturer) = update.manufacturer {
            active.manufacturer = Set(manufacturer.trim().to_string());
        }
        if let Some(status) = update.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now());

        let product = active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        info!(product_id = product.id, "Product updated");
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_gtin_strips_separators() {
        assert_eq!(canonical_gtin(" 400-6381-33393-1 ").unwrap(), "4006381333931");
    }

    #[test]
    fn canonical_gtin_reports_field() {
        let err = canonical_gtin("4006381333930").unwrap_err();
        assert_eq!(err.field(), Some("gtin"));
    }

    #[test]
    fn new_product_validation() {
        let mut input = NewProduct {
            gtin: "4006381333931".into(),
            name: "Ibuprofen 400mg".into(),
            manufacturer: String::new(),
            status: None,
        };
        assert!(input.validate().is_ok());

        input.name = "   ".into();
        let err: ServiceError = input.validate().unwrap_err().into();
        assert_eq!(err.field(), Some("name"));

        input.name = "x".repeat(201);
        assert!(input.validate().is_err());

        input.name = "ok".into();
        input.gtin = "123".into();
        let err: ServiceError = input.validate().unwrap_err().into();
        assert_eq!(err.field(), Some("gtin"));
    }
}
