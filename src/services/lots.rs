use crate::{
    db::DbPool,
    entities::{
        lot::{self, Entity as Lot},
        product::{self, Entity as Product},
    },
    errors::ServiceError,
    validation::validate_not_blank,
};
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Input for registering a lot
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct NewLot {
    pub product_id: i64,
    #[validate(length(min = 1, max = 80), custom = "validate_not_blank")]
    #[schema(example = "A2301")]
    pub lot_number: String,
    #[schema(example = "2027-03-31")]
    pub expiry_date: NaiveDate,
    /// Opening stock; defaults to 0
    #[serde(default)]
    pub stock: Option<i32>,
}

/// Filters for listing lots
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct LotFilter {
    pub product_id: Option<i64>,
    /// Only lots expiring strictly before this date
    pub expiry_before: Option<NaiveDate>,
    /// Substring match on lot number, product name or GTIN
    pub search: Option<String>,
}

/// Service for managing lots
#[derive(Clone)]
pub struct LotService {
    db_pool: Arc<DbPool>,
}

impl LotService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Registers a lot for an existing product.
    ///
    /// Lot numbers are unique per product. After creation the stock only
    /// changes through movements.
    #[instrument(skip(self))]
    pub async fn create_lot(&self, input: NewLot) -> Result<lot::Model, ServiceError> {
        input.validate()?;
        let stock = input.stock.unwrap_or(0);
        if stock < 0 {
            return Err(ServiceError::validation(
                "stock",
                "Opening stock cannot be negative",
            ));
        }

        let db = &*self.db_pool;
        let lot_number = input.lot_number.trim().to_string();

        Product::find_by_id(input.product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("product {} not found", input.product_id))
            })?;

        let duplicate = Lot::find()
            .filter(lot::Column::ProductId.eq(input.product_id))
            .filter(lot::Column::LotNumber.eq(lot_number.as_str()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "lot {} already exists for product {}",
                lot_number, input.product_id
            )));
        }

        let lot = lot::ActiveModel {
            product_id: Set(input.product_id),
            lot_number: Set(lot_number),
            expiry_date: Set(input.expiry_date),
            stock: Set(stock),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(lot_id = lot.id, product_id = lot.product_id, lot_number = %lot.lot_number, "Lot created");
        Ok(lot)
    }

    #[instrument(skip(self))]
    pub async fn get_lot(&self, id: i64) -> Result<lot::Model, ServiceError> {
        Lot::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("lot {} not found", id)))
    }

    /// Lists lots earliest expiry first, then by product name.
    #[instrument(skip(self))]
    pub async fn list_lots(
        &self,
        filter: LotFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<lot::Model>, u64), ServiceError> {
        let mut query = Lot::find().join(JoinType::InnerJoin, lot::Relation::Product.def());

        if let Some(product_id) = filter.product_id {
            query = query.filter(lot::Column::ProductId.eq(product_id));
        }
        if let Some(before) = filter.expiry_before {
            query = query.filter(lot::Column::ExpiryDate.lt(before));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(lot::Column::LotNumber.contains(term))
                    .add(product::Column::Name.contains(term))
                    .add(product::Column::Gtin.contains(term)),
            );
        }

        let paginator = query
            .order_by_asc(lot::Column::ExpiryDate)
            .order_by_asc(product::Column::Name)
            .order_by_asc(lot::Column::Id)
            .paginate(&*self.db_pool, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let lots = paginator
            .fetch_page(super::page_index(page))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((lots, total))
    }
}
