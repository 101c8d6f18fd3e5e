use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use campo_core::{Aggregate, FarmId, LotId};
use campo_stock::{
    ApplyStockChanges, CategoryDefinition, Lot, LotStock, StockCommand, StockDelta, StockEntry,
    StockEvent,
};

use super::{FarmStore, StoreError, changes_by_lot};

#[derive(Debug, Default)]
struct FarmData {
    lots: Vec<Lot>,
    definitions: Vec<CategoryDefinition>,
    stock: Vec<StockEntry>,
}

/// In-memory farm store for tests/dev.
///
/// One write lock covers a whole `apply_stock_deltas` call: every affected lot is
/// worked on a copy and the copies are committed only when all of them succeed.
#[derive(Debug, Default)]
pub struct InMemoryFarmStore {
    inner: RwLock<HashMap<FarmId, FarmData>>,
}

impl InMemoryFarmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_lot(&self, lot: Lot) -> Result<(), StoreError> {
        self.write(|map| {
            let farm = map.entry(lot.farm_id).or_default();
            farm.lots.retain(|l| l.id != lot.id);
            farm.lots.push(lot);
        })
    }

    pub fn insert_category_definition(
        &self,
        farm_id: FarmId,
        definition: CategoryDefinition,
    ) -> Result<(), StoreError> {
        self.write(|map| map.entry(farm_id).or_default().definitions.push(definition))
    }

    /// Seed or overwrite one stock entry. Non-positive quantities remove it.
    pub fn put_stock(&self, farm_id: FarmId, entry: StockEntry) -> Result<(), StoreError> {
        self.write(|map| {
            let farm = map.entry(farm_id).or_default();
            farm.stock
                .retain(|e| !(e.lot_id == entry.lot_id && e.is_category(&entry.category)));
            if entry.quantity > 0 {
                farm.stock.push(entry);
            }
        })
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<FarmId, FarmData>) -> T) -> Result<T, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| poisoned())?;
        Ok(f(&map))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut HashMap<FarmId, FarmData>) -> T,
    ) -> Result<T, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(f(&mut map))
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".into())
}

#[async_trait]
impl FarmStore for InMemoryFarmStore {
    async fn list_lots(&self, farm_id: FarmId) -> Result<Vec<Lot>, StoreError> {
        self.read(|map| map.get(&farm_id).map(|f| f.lots.clone()).unwrap_or_default())
    }

    async fn list_active_category_definitions(
        &self,
        farm_id: FarmId,
    ) -> Result<Vec<CategoryDefinition>, StoreError> {
        self.read(|map| {
            map.get(&farm_id)
                .map(|f| f.definitions.iter().filter(|d| d.active).cloned().collect())
                .unwrap_or_default()
        })
    }

    async fn list_stock_by_lot(
        &self,
        farm_id: FarmId,
        lot_id: LotId,
    ) -> Result<Vec<StockEntry>, StoreError> {
        self.read(|map| -> Result<Vec<StockEntry>, StoreError> {
            let farm = map.get(&farm_id).ok_or(StoreError::LotNotFound(lot_id))?;
            if !farm.lots.iter().any(|l| l.id == lot_id) {
                return Err(StoreError::LotNotFound(lot_id));
            }
            Ok(farm
                .stock
                .iter()
                .filter(|e| e.lot_id == lot_id)
                .cloned()
                .collect())
        })?
    }

    async fn list_farm_stock(&self, farm_id: FarmId) -> Result<Vec<StockEntry>, StoreError> {
        self.read(|map| map.get(&farm_id).map(|f| f.stock.clone()).unwrap_or_default())
    }

    #[instrument(skip(self, deltas), fields(farm_id = %farm_id, delta_count = deltas.len()), err)]
    async fn apply_stock_deltas(
        &self,
        farm_id: FarmId,
        deltas: Vec<StockDelta>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<StockEvent>, StoreError> {
        let by_lot = changes_by_lot(deltas)?;

        let mut map = self
            .inner
            .write()
            .map_err(|_| poisoned())?;

        let mut staged = Vec::with_capacity(by_lot.len());
        let mut events = Vec::new();
        for (lot_id, changes) in by_lot {
            let farm = map.get(&farm_id).ok_or(StoreError::LotNotFound(lot_id))?;
            let lot = farm
                .lots
                .iter()
                .find(|l| l.id == lot_id)
                .cloned()
                .ok_or(StoreError::LotNotFound(lot_id))?;
            let entries = farm
                .stock
                .iter()
                .filter(|e| e.lot_id == lot_id)
                .cloned()
                .collect();

            let mut stock = LotStock::new(lot, entries);
            let command = StockCommand::ApplyChanges(ApplyStockChanges {
                farm_id,
                lot_id,
                changes,
                occurred_at,
            });
            events.extend(stock.execute(&command)?);
            staged.push(stock);
        }

        // Every lot passed: commit all of them.
        let farm = map.entry(farm_id).or_default();
        for stock in staged {
            let (lot, entries) = stock.into_parts();
            farm.stock.retain(|e| e.lot_id != lot.id);
            farm.stock.extend(entries);
            if let Some(slot) = farm.lots.iter_mut().find(|l| l.id == lot.id) {
                *slot = lot;
            }
        }

        debug!(events = events.len(), "stock deltas committed");
        Ok(events)
    }
}
