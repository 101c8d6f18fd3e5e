use serde::{Deserialize, Serialize};

use campo_core::LotId;

/// How many animals of one category currently occupy a lot.
///
/// Stored entries always have `quantity > 0`; an entry that reaches zero is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub lot_id: LotId,
    pub category: String,
    pub quantity: i64,
}

impl StockEntry {
    pub fn new(lot_id: LotId, category: impl Into<String>, quantity: i64) -> Self {
        Self {
            lot_id,
            category: category.into(),
            quantity,
        }
    }

    /// Whether this entry is the `(lot, category)` row for `category`.
    pub fn is_category(&self, category: &str) -> bool {
        same_category(&self.category, category)
    }
}

/// Category keys are unique per lot after trimming and case folding.
pub fn category_key(category: &str) -> String {
    category.trim().to_lowercase()
}

pub fn same_category(a: &str, b: &str) -> bool {
    category_key(a) == category_key(b)
}

/// One signed quantity change for one `(lot, category)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub lot_id: LotId,
    pub category: String,
    pub delta: i64,
}

impl StockDelta {
    pub fn new(lot_id: LotId, category: impl Into<String>, delta: i64) -> Self {
        Self {
            lot_id,
            category: category.into(),
            delta,
        }
    }
}
