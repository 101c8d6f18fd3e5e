//! Farm storage: lots, category vocabulary and per-lot stock.
//!
//! `FarmStore::apply_stock_deltas` is the only mutation path. Implementations must
//! apply every delta of a call atomically, run the `LotStock` aggregate on each
//! affected lot, and persist the destock timestamp it decides, all under one
//! isolation scope so concurrent movements on a lot cannot interleave.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use campo_core::{DomainError, FarmId, LotId};
use campo_stock::{
    CategoryDefinition, Lot, StockChange, StockDelta, StockEntry, StockEvent, same_category,
};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryFarmStore;
pub use postgres::PostgresFarmStore;

/// Store handle shared by services; the backend is picked at startup.
pub type SharedFarmStore = Arc<dyn FarmStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lot not found: {0}")]
    LotNotFound(LotId),

    /// Rejected by the stock aggregate (negative stock, blank category, ...).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Lost a race with a concurrent movement; safe to retry.
    #[error("concurrent movement conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

#[async_trait]
pub trait FarmStore: Send + Sync {
    /// Lots of a farm, in creation order.
    async fn list_lots(&self, farm_id: FarmId) -> Result<Vec<Lot>, StoreError>;

    async fn get_lot(&self, farm_id: FarmId, lot_id: LotId) -> Result<Lot, StoreError> {
        self.list_lots(farm_id)
            .await?
            .into_iter()
            .find(|lot| lot.id == lot_id)
            .ok_or(StoreError::LotNotFound(lot_id))
    }

    /// Active category definitions, in definition order.
    async fn list_active_category_definitions(
        &self,
        farm_id: FarmId,
    ) -> Result<Vec<CategoryDefinition>, StoreError>;

    async fn list_stock_by_lot(
        &self,
        farm_id: FarmId,
        lot_id: LotId,
    ) -> Result<Vec<StockEntry>, StoreError>;

    /// Every stock entry of the farm, across lots.
    async fn list_farm_stock(&self, farm_id: FarmId) -> Result<Vec<StockEntry>, StoreError>;

    /// Distinct category labels currently stocked anywhere in the farm.
    async fn list_categories_in_use(&self, farm_id: FarmId) -> Result<Vec<String>, StoreError> {
        let mut categories: Vec<String> = Vec::new();
        for entry in self.list_farm_stock(farm_id).await? {
            if !categories.iter().any(|c| same_category(c, &entry.category)) {
                categories.push(entry.category);
            }
        }
        Ok(categories)
    }

    /// Apply all deltas atomically and return the committed stock events.
    async fn apply_stock_deltas(
        &self,
        farm_id: FarmId,
        deltas: Vec<StockDelta>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<StockEvent>, StoreError>;

    async fn apply_stock_delta(
        &self,
        farm_id: FarmId,
        delta: StockDelta,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<StockEvent>, StoreError> {
        self.apply_stock_deltas(farm_id, vec![delta], occurred_at)
            .await
    }
}

#[async_trait]
impl<S> FarmStore for Arc<S>
where
    S: FarmStore + ?Sized,
{
    async fn list_lots(&self, farm_id: FarmId) -> Result<Vec<Lot>, StoreError> {
        (**self).list_lots(farm_id).await
    }

    async fn get_lot(&self, farm_id: FarmId, lot_id: LotId) -> Result<Lot, StoreError> {
        (**self).get_lot(farm_id, lot_id).await
    }

    async fn list_active_category_definitions(
        &self,
        farm_id: FarmId,
    ) -> Result<Vec<CategoryDefinition>, StoreError> {
        (**self).list_active_category_definitions(farm_id).await
    }

    async fn list_stock_by_lot(
        &self,
        farm_id: FarmId,
        lot_id: LotId,
    ) -> Result<Vec<StockEntry>, StoreError> {
        (**self).list_stock_by_lot(farm_id, lot_id).await
    }

    async fn list_farm_stock(&self, farm_id: FarmId) -> Result<Vec<StockEntry>, StoreError> {
        (**self).list_farm_stock(farm_id).await
    }

    async fn list_categories_in_use(&self, farm_id: FarmId) -> Result<Vec<String>, StoreError> {
        (**self).list_categories_in_use(farm_id).await
    }

    async fn apply_stock_deltas(
        &self,
        farm_id: FarmId,
        deltas: Vec<StockDelta>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<StockEvent>, StoreError> {
        (**self)
            .apply_stock_deltas(farm_id, deltas, occurred_at)
            .await
    }
}

/// Group deltas per lot. Iteration is in ascending lot id, the lock order.
pub(crate) fn changes_by_lot(
    deltas: Vec<StockDelta>,
) -> Result<BTreeMap<LotId, Vec<StockChange>>, StoreError> {
    if deltas.is_empty() {
        return Err(DomainError::validation("no stock deltas given").into());
    }

    let mut by_lot: BTreeMap<LotId, Vec<StockChange>> = BTreeMap::new();
    for delta in deltas {
        by_lot.entry(delta.lot_id).or_default().push(StockChange {
            category: delta.category,
            delta: delta.delta,
        });
    }
    Ok(by_lot)
}
