//! Stock ledger: recording movements and applying them to lots.
//!
//! Applying a movement is the only way lot stock changes. Each application
//! runs in its own transaction that locks the lot row, recomputes the stock
//! from the locked value and stamps the movement with the before/after
//! figures. A failed application leaves both rows untouched.

use crate::{
    db::{with_transaction, DbPool},
    entities::{
        lot::{self, Entity as Lot},
        movement::{self, Entity as Movement, MovementType},
    },
    errors::ServiceError,
};
use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Input for recording a movement
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct NewMovement {
    pub lot_id: i64,
    pub movement_type: MovementType,
    /// Positive for RECEIPT and ISSUE; signed and non-zero for ADJUSTMENT
    #[schema(example = 10)]
    pub quantity: i32,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub reason: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub document_ref: String,
}

/// Filters for listing movements
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct MovementFilter {
    pub lot_id: Option<i64>,
    pub movement_type: Option<MovementType>,
    /// `true` for applied movements only, `false` for pending only
    pub applied: Option<bool>,
    pub applied_by: Option<String>,
    /// Substring match on reason or document reference
    pub search: Option<String>,
}

/// What happened when a movement was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Stock was changed by this call
    Applied,
    /// The movement had been applied earlier; nothing changed
    AlreadyApplied,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AppliedMovement {
    pub movement: movement::Model,
    pub outcome: ApplyOutcome,
}

/// A movement that could not be applied in a bulk run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct BulkFailure {
    pub movement_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

/// Result of applying a batch of movements
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct BulkApplyReport {
    pub applied: u32,
    pub failed: u32,
    /// Already applied or unknown ids
    pub skipped: u32,
    pub failures: Vec<BulkFailure>,
}

/// Checks the sign rules for a movement quantity.
pub fn validate_quantity(movement_type: MovementType, quantity: i32) -> Result<(), ServiceError> {
    if quantity == 0 {
        return Err(ServiceError::validation("quantity", "Quantity cannot be zero"));
    }
    match movement_type {
        MovementType::Receipt | MovementType::Issue if quantity < 0 => {
            Err(ServiceError::validation(
                "quantity",
                format!("{} quantity must be positive", movement_type),
            ))
        }
        _ => Ok(()),
    }
}

/// Stock level after applying a movement to a lot holding `before` units.
///
/// `today` decides whether the lot is expired; ISSUE movements are refused
/// from the day after `expiry_date`.
pub fn compute_stock_after(
    movement_type: MovementType,
    quantity: i32,
    before: i32,
    expiry_date: NaiveDate,
    today: NaiveDate,
) -> Result<i32, ServiceError> {
    validate_quantity(movement_type, quantity)?;

    let overflow = || ServiceError::validation("quantity", "Quantity is out of range for this lot");

    match movement_type {
        MovementType::Receipt => before.checked_add(quantity).ok_or_else(overflow),
        MovementType::Issue => {
            if lot::is_expired_on(expiry_date, today) {
                return Err(ServiceError::business_rule(
                    "lot",
                    format!("Lot expired on {}: issuing from it is not allowed", expiry_date),
                ));
            }
            let after = before.checked_sub(quantity).ok_or_else(overflow)?;
            if after < 0 {
                return Err(ServiceError::business_rule(
                    "quantity",
                    format!(
                        "Insufficient stock: lot holds {}, cannot issue {}",
                        before, quantity
                    ),
                ));
            }
            Ok(after)
        }
        MovementType::Adjustment => {
            let after = before.checked_add(quantity).ok_or_else(overflow)?;
            if after < 0 {
                return Err(ServiceError::business_rule(
                    "quantity",
                    format!(
                        "Adjustment of {} would leave stock negative ({})",
                        quantity, after
                    ),
                ));
            }
            Ok(after)
        }
    }
}

/// Selects a lot for update. On SQLite the lock clause is dropped and the
/// database write lock serializes writers instead.
fn locked_lot(lot_id: i64) -> Select<Lot> {
    Lot::find_by_id(lot_id).lock_exclusive()
}

/// Service for recording and applying stock movements
#[derive(Clone)]
pub struct MovementService {
    db_pool: Arc<DbPool>,
}

impl MovementService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Records a pending movement. Stock is not touched.
    #[instrument(skip(self))]
    pub async fn create_movement(
        &self,
        input: NewMovement,
        actor: Option<&str>,
    ) -> Result<movement::Model, ServiceError> {
        input.validate()?;
        validate_quantity(input.movement_type, input.quantity)?;

        let db = &*self.db_pool;
        Lot::find_by_id(input.lot_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("lot {} not found", input.lot_id))
            })?;

        let movement = movement::ActiveModel {
            lot_id: Set(input.lot_id),
            movement_type: Set(input.movement_type),
            quantity: Set(input.quantity),
            reason: Set(input.reason.trim().to_string()),
            document_ref: Set(input.document_ref.trim().to_string()),
            created_at: Set(Utc::now()),
            applied_at: Set(None),
            applied_by: Set(actor.map(str::to_string)),
            stock_before: Set(None),
            stock_after: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        counter!("pharma_stock_movements.recorded", 1, "type" => movement.movement_type.as_str());
        info!(
            movement_id = movement.id,
            lot_id = movement.lot_id,
            movement_type = %movement.movement_type,
            quantity = movement.quantity,
            "Movement recorded"
        );
        Ok(movement)
    }

    /// Records a movement and applies it immediately.
    ///
    /// If application fails the pending movement stays in the ledger and the
    /// application error is returned.
    #[instrument(skip(self))]
    pub async fn create_and_apply(
        &self,
        input: NewMovement,
        actor: Option<&str>,
    ) -> Result<AppliedMovement, ServiceError> {
        let movement = self.create_movement(input, actor).await?;
        self.apply_movement(movement.id, actor).await
    }

    /// Applies a pending movement to its lot.
    ///
    /// Applying an already applied movement is a no-op that returns the
    /// stored record. `actor` is recorded only when the movement has no
    /// identity yet.
    #[instrument(skip(self))]
    pub async fn apply_movement(
        &self,
        movement_id: i64,
        actor: Option<&str>,
    ) -> Result<AppliedMovement, ServiceError> {
        let db = &*self.db_pool;

        // The lot of a movement never changes, so it can be read before the
        // lock is taken.
        let lot_id = Movement::find_by_id(movement_id)
            .select_only()
            .column(movement::Column::LotId)
            .into_tuple::<i64>()
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("movement {} not found", movement_id)))?;

        let actor = actor.map(str::to_string);
        let today = Utc::now().date_naive();

        let result = with_transaction::<_, AppliedMovement, ServiceError>(db, move |txn| {
            Box::pin(async move {
                let lot = locked_lot(lot_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| ServiceError::NotFound(format!("lot {} not found", lot_id)))?;

                // Re-read under the lock: a concurrent caller may have applied it.
                let movement = Movement::find_by_id(movement_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("movement {} not found", movement_id))
                    })?;

                if movement.is_applied() {
                    return Ok(AppliedMovement {
                        movement,
                        outcome: ApplyOutcome::AlreadyApplied,
                    });
                }

                let before = lot.stock;
                let after = compute_stock_after(
                    movement.movement_type,
                    movement.quantity,
                    before,
                    lot.expiry_date,
                    today,
                )?;

                let mut locked: lot::ActiveModel = lot.into();
                locked.stock = Set(after);
                locked.update(txn).await.map_err(ServiceError::db_error)?;

                let needs_actor = movement.applied_by.is_none();
                let mut active: movement::ActiveModel = movement.into();
                active.stock_before = Set(Some(before));
                active.stock_after = Set(Some(after));
                active.applied_at = Set(Some(Utc::now()));
                if needs_actor {
                    active.applied_by = Set(actor);
                }
                let movement = active.update(txn).await.map_err(ServiceError::db_error)?;

                Ok(AppliedMovement {
                    movement,
                    outcome: ApplyOutcome::Applied,
                })
            })
        })
        .await;

        match &result {
            Ok(applied) if applied.outcome == ApplyOutcome::Applied => {
                let m = &applied.movement;
                counter!("pharma_stock_movements.applied", 1, "type" => m.movement_type.as_str());
                info!(
                    movement_id = m.id,
                    lot_id = m.lot_id,
                    stock_before = ?m.stock_before,
                    stock_after = ?m.stock_after,
                    "Movement applied"
                );
            }
            Ok(_) => info!(movement_id, "Movement already applied; nothing to do"),
            Err(e) => {
                counter!("pharma_stock_movements.rejected", 1);
                warn!(movement_id, error = %e, "Movement not applied");
            }
        }

        result
    }

    /// Applies each still-pending movement among `ids` in ascending id order,
    /// each in its own transaction. One failure does not affect the others.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn apply_many(
        &self,
        ids: &[i64],
        actor: Option<&str>,
    ) -> Result<BulkApplyReport, ServiceError> {
        let mut requested = ids.to_vec();
        requested.sort_unstable();
        requested.dedup();

        let pending: Vec<i64> = Movement::find()
            .select_only()
            .column(movement::Column::Id)
            .filter(movement::Column::Id.is_in(requested.iter().copied()))
            .filter(movement::Column::AppliedAt.is_null())
            .order_by_asc(movement::Column::Id)
            .into_tuple::<i64>()
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        let mut report = BulkApplyReport {
            skipped: (requested.len() - pending.len()) as u32,
            ..Default::default()
        };

        for id in pending {
            match self.apply_movement(id, actor).await {
                Ok(applied) => match applied.outcome {
                    ApplyOutcome::Applied => report.applied += 1,
                    ApplyOutcome::AlreadyApplied => report.skipped += 1,
                },
                Err(e) => {
                    report.failed += 1;
                    report.failures.push(BulkFailure {
                        movement_id: id,
                        field: e.field().map(str::to_string),
                        message: e.response_message(),
                    });
                }
            }
        }

        info!(
            applied = report.applied,
            failed = report.failed,
            skipped = report.skipped,
            "Bulk apply finished"
        );
        Ok(report)
    }

    #[instrument(skip(self))]
    pub async fn get_movement(&self, id: i64) -> Result<movement::Model, ServiceError> {
        Movement::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("movement {} not found", id)))
    }

    /// Lists movements newest first.
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        filter: MovementFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<movement::Model>, u64), ServiceError> {
        let mut query = Movement::find();

        if let Some(lot_id) = filter.lot_id {
            query = query.filter(movement::Column::LotId.eq(lot_id));
        }
        if let Some(movement_type) = filter.movement_type {
            query = query.filter(movement::Column::MovementType.eq(movement_type));
        }
        match filter.applied {
            Some(true) => query = query.filter(movement::Column::AppliedAt.is_not_null()),
            Some(false) => query = query.filter(movement::Column::AppliedAt.is_null()),
            None => {}
        }
        if let Some(applied_by) = filter.applied_by {
            query = query.filter(movement::Column::AppliedBy.eq(applied_by));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(movement::Column::Reason.contains(term))
                    .add(movement::Column::DocumentRef.contains(term)),
            );
        }

        let paginator = query
            .order_by_desc(movement::Column::Id)
            .paginate(&*self.db_pool, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let movements = paginator
            .fetch_page(super::page_index(page))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((movements, total))
    }
}
