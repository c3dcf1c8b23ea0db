pub mod admin;
pub mod common;
pub mod lots;
pub mod movements;
pub mod products;

use crate::{
    db::DbPool,
    services::{lots::LotService, movements::MovementService, products::ProductService},
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer used by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub lots: Arc<LotService>,
    pub movements: Arc<MovementService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            products: Arc::new(ProductService::new(db_pool.clone())),
            lots: Arc::new(LotService::new(db_pool.clone())),
            movements: Arc::new(MovementService::new(db_pool)),
        }
    }
}
