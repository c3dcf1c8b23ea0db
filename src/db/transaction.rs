/*!
 * Transaction helper
 *
 * Wraps a unit of work in a database transaction: commit on `Ok`, rollback
 * on `Err` (or if the future is dropped). The caller's error type survives
 * the round trip through sea-orm.
 */

pub use futures::future::BoxFuture;
use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionError, TransactionTrait};
use tracing::{debug, warn};

/// Execute a function within a database transaction
///
/// ```rust,ignore
/// use crate::db::transaction::with_transaction;
///
/// let movement = with_transaction(&db, |txn| {
///     Box::pin(async move {
///         let lot = lot::Entity::find_by_id(id).lock_exclusive().one(txn).await?;
///         // ...
///         Ok::<_, ServiceError>(movement)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T, E>(db: &DatabaseConnection, f: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: From<DbErr> + std::error::Error + Send,
{
    let start = std::time::Instant::now();
    counter!("pharma_stock_db.transaction.started", 1);

    let result = db.transaction(f).await;

    histogram!("pharma_stock_db.transaction.duration", start.elapsed());
    match &result {
        Ok(_) => {
            counter!("pharma_stock_db.transaction.committed", 1);
            debug!(elapsed = ?start.elapsed(), "Transaction committed");
        }
        Err(_) => {
            counter!("pharma_stock_db.transaction.rolled_back", 1);
            warn!(elapsed = ?start.elapsed(), "Transaction rolled back");
        }
    }

    result.map_err(|e| match e {
        TransactionError::Connection(db_err) => E::from(db_err),
        TransactionError::Transaction(err) => err,
    })
}
