use chrono::{DateTime, Utc};
use serde::Serialize;

use campo_stock::{Lot, StockEntry};

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct LotStockResponse {
    pub lot: Lot,
    pub display_name: String,
    /// Whole days since the lot was last emptied; absent if it never was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_days: Option<i64>,
    pub total_heads: i64,
    pub entries: Vec<StockEntry>,
}

impl LotStockResponse {
    pub fn new(lot: Lot, entries: Vec<StockEntry>, now: DateTime<Utc>) -> Self {
        Self {
            display_name: lot.display_name(),
            rest_days: lot.rest_days(now),
            total_heads: entries
                .iter()
                .fold(0i64, |total, e| total.saturating_add(e.quantity)),
            lot,
            entries,
        }
    }
}
