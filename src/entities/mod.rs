//! sea-orm entities for the stock ledger.

pub mod lot;
pub mod movement;
pub mod product;

pub use lot::Entity as Lot;
pub use movement::Entity as Movement;
pub use product::Entity as Product;
