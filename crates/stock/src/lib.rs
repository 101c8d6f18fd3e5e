//! Livestock stock domain module.
//!
//! Lots (paddocks), the farm's category vocabulary, per-lot stock entries and the
//! `LotStock` aggregate that applies movements. Pure domain logic: no IO, no HTTP,
//! no storage.

pub mod category;
pub mod entry;
pub mod guard;
pub mod lot;
pub mod lot_stock;

pub use category::{CategoryDefinition, Species};
pub use entry::{StockDelta, StockEntry, category_key, same_category};
pub use guard::MovementGuard;
pub use lot::Lot;
pub use lot_stock::{
    ApplyStockChanges, LotDestocked, LotStock, StockAdjusted, StockChange, StockCommand,
    StockEvent,
};
