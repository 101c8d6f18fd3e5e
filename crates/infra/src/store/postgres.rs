//! Postgres-backed farm store.
//!
//! ## Movement transactions
//!
//! `apply_stock_deltas` runs one `SERIALIZABLE` transaction per call:
//! 1. lock every affected lot row (`SELECT ... FOR UPDATE`) in ascending id order
//! 2. load the lot's entries and let the `LotStock` aggregate decide the events
//! 3. upsert or delete the touched entries
//! 4. recount the lot's remaining entries and let the movement guard decide
//!    whether `last_destocked_at` moves
//! 5. commit
//!
//! ## Error mapping
//!
//! | SQLSTATE | StoreError | Scenario |
//! |----------|------------|----------|
//! | `40001` | `Conflict` | serialization failure against a concurrent movement |
//! | `40P01` | `Conflict` | deadlock detected |
//! | `23505` | `Conflict` | concurrent insert of the same `(lot, category)` row |
//! | other | `Backend` | connection, pool or schema problems |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, debug, instrument};

use campo_core::{Aggregate, FarmId, LotId};
use campo_stock::{
    ApplyStockChanges, CategoryDefinition, Lot, LotStock, MovementGuard, StockCommand,
    StockDelta, StockEntry, StockEvent, category_key,
};

use super::{FarmStore, StoreError, changes_by_lot};

/// Idempotent schema, applied statement by statement by [`PostgresFarmStore::ensure_schema`].
pub const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS lots (
        id UUID PRIMARY KEY,
        farm_id UUID NOT NULL,
        name TEXT NOT NULL,
        module_name TEXT NULL,
        last_destocked_at TIMESTAMPTZ NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS lots_farm_id_idx ON lots (farm_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS category_definitions (
        id BIGSERIAL PRIMARY KEY,
        farm_id UUID NOT NULL,
        singular_name TEXT NOT NULL,
        plural_name TEXT NOT NULL,
        species TEXT NOT NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_entries (
        lot_id UUID NOT NULL REFERENCES lots (id),
        category_key TEXT NOT NULL,
        category TEXT NOT NULL,
        quantity BIGINT NOT NULL CHECK (quantity > 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (lot_id, category_key)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS category_definitions_farm_id_idx ON category_definitions (farm_id, id)",
];

#[derive(Debug, Clone)]
pub struct PostgresFarmStore {
    pool: Arc<PgPool>,
}

impl PostgresFarmStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    #[instrument(skip(self, lot), fields(farm_id = %lot.farm_id, lot_id = %lot.id), err)]
    pub async fn upsert_lot(&self, lot: &Lot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO lots (id, farm_id, name, module_name, last_destocked_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                module_name = EXCLUDED.module_name
            "#,
        )
        .bind(lot.id.as_uuid())
        .bind(lot.farm_id.as_uuid())
        .bind(&lot.name)
        .bind(&lot.module_name)
        .bind(lot.last_destocked_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_lot", e))?;
        Ok(())
    }

    #[instrument(skip(self, definition), fields(farm_id = %farm_id), err)]
    pub async fn insert_category_definition(
        &self,
        farm_id: FarmId,
        definition: &CategoryDefinition,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO category_definitions (farm_id, singular_name, plural_name, species, active)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(farm_id.as_uuid())
        .bind(&definition.singular_name)
        .bind(&definition.plural_name)
        .bind(definition.species.as_str())
        .bind(definition.active)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_category_definition", e))?;
        Ok(())
    }
}

#[async_trait]
impl FarmStore for PostgresFarmStore {
    #[instrument(skip(self), fields(farm_id = %farm_id), err)]
    async fn list_lots(&self, farm_id: FarmId) -> Result<Vec<Lot>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, farm_id, name, module_name, last_destocked_at
            FROM lots
            WHERE farm_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(farm_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_lots", e))?;

        rows.iter().map(|row| decode::<LotRow>(row).map(Lot::from)).collect()
    }

    #[instrument(skip(self), fields(farm_id = %farm_id, lot_id = %lot_id), err)]
    async fn get_lot(&self, farm_id: FarmId, lot_id: LotId) -> Result<Lot, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, farm_id, name, module_name, last_destocked_at
            FROM lots
            WHERE farm_id = $1 AND id = $2
            "#,
        )
        .bind(farm_id.as_uuid())
        .bind(lot_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_lot", e))?
        .ok_or(StoreError::LotNotFound(lot_id))?;

        decode::<LotRow>(&row).map(Lot::from)
    }

    #[instrument(skip(self), fields(farm_id = %farm_id), err)]
    async fn list_active_category_definitions(
        &self,
        farm_id: FarmId,
    ) -> Result<Vec<CategoryDefinition>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT singular_name, plural_name, species, active
            FROM category_definitions
            WHERE farm_id = $1 AND active
            ORDER BY id ASC
            "#,
        )
        .bind(farm_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_active_category_definitions", e))?;

        rows.iter()
            .map(|row| CategoryDefinition::try_from(decode::<DefinitionRow>(row)?))
            .collect()
    }

    #[instrument(skip(self), fields(farm_id = %farm_id, lot_id = %lot_id), err)]
    async fn list_stock_by_lot(
        &self,
        farm_id: FarmId,
        lot_id: LotId,
    ) -> Result<Vec<StockEntry>, StoreError> {
        // Scoping through the lot row keeps one farm from reading another's stock.
        self.get_lot(farm_id, lot_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT lot_id, category, quantity
            FROM stock_entries
            WHERE lot_id = $1
            ORDER BY created_at ASC, category_key ASC
            "#,
        )
        .bind(lot_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stock_by_lot", e))?;

        rows.iter()
            .map(|row| decode::<EntryRow>(row).map(StockEntry::from))
            .collect()
    }

    #[instrument(skip(self), fields(farm_id = %farm_id), err)]
    async fn list_farm_stock(&self, farm_id: FarmId) -> Result<Vec<StockEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT s.lot_id, s.category, s.quantity
            FROM stock_entries s
            JOIN lots l ON l.id = s.lot_id
            WHERE l.farm_id = $1
            ORDER BY l.created_at ASC, s.created_at ASC, s.category_key ASC
            "#,
        )
        .bind(farm_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_farm_stock", e))?;

        rows.iter()
            .map(|row| decode::<EntryRow>(row).map(StockEntry::from))
            .collect()
    }

    #[instrument(
        skip(self, deltas),
        fields(farm_id = %farm_id, delta_count = deltas.len(), lots_touched),
        err
    )]
    async fn apply_stock_deltas(
        &self,
        farm_id: FarmId,
        deltas: Vec<StockDelta>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<StockEvent>, StoreError> {
        let by_lot = changes_by_lot(deltas)?;
        Span::current().record("lots_touched", by_lot.len());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        // BTreeMap iteration is ascending lot id: the lock order for every caller.
        let mut events = Vec::new();
        for (lot_id, changes) in by_lot {
            let lot = lock_lot(&mut tx, farm_id, lot_id).await?;
            let entries = load_entries(&mut tx, lot_id).await?;
            let previous_destock = lot.last_destocked_at;

            let mut stock = LotStock::new(lot, entries);
            let command = StockCommand::ApplyChanges(ApplyStockChanges {
                farm_id,
                lot_id,
                changes,
                occurred_at,
            });
            // An Err here drops `tx`, which rolls back every lot touched so far.
            let lot_events = stock.execute(&command)?;

            for event in &lot_events {
                if let StockEvent::StockAdjusted(adjusted) = event {
                    write_entry(&mut tx, lot_id, &adjusted.category, adjusted.remaining).await?;
                }
            }

            let remaining = count_entries(&mut tx, lot_id).await?;
            let next = MovementGuard::next_destocked_at(previous_destock, remaining, occurred_at);
            if next != previous_destock {
                sqlx::query("UPDATE lots SET last_destocked_at = $2 WHERE id = $1")
                    .bind(lot_id.as_uuid())
                    .bind(next)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("update_last_destocked_at", e))?;
                debug!(lot_id = %lot_id, "lot fully destocked");
            }

            events.extend(lot_events);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(events)
    }
}

async fn lock_lot(
    tx: &mut Transaction<'_, Postgres>,
    farm_id: FarmId,
    lot_id: LotId,
) -> Result<Lot, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT id, farm_id, name, module_name, last_destocked_at
        FROM lots
        WHERE id = $1 AND farm_id = $2
        FOR UPDATE
        "#,
    )
    .bind(lot_id.as_uuid())
    .bind(farm_id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_lot", e))?
    .ok_or(StoreError::LotNotFound(lot_id))?;

    decode::<LotRow>(&row).map(Lot::from)
}

async fn load_entries(
    tx: &mut Transaction<'_, Postgres>,
    lot_id: LotId,
) -> Result<Vec<StockEntry>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT lot_id, category, quantity
        FROM stock_entries
        WHERE lot_id = $1
        ORDER BY created_at ASC, category_key ASC
        "#,
    )
    .bind(lot_id.as_uuid())
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("load_entries", e))?;

    rows.iter()
        .map(|row| decode::<EntryRow>(row).map(StockEntry::from))
        .collect()
}

/// Persist one adjusted entry: zero deletes the row, anything else upserts it.
async fn write_entry(
    tx: &mut Transaction<'_, Postgres>,
    lot_id: LotId,
    category: &str,
    remaining: i64,
) -> Result<(), StoreError> {
    let key = category_key(category);
    if remaining == 0 {
        sqlx::query("DELETE FROM stock_entries WHERE lot_id = $1 AND category_key = $2")
            .bind(lot_id.as_uuid())
            .bind(&key)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("delete_entry", e))?;
    } else {
        sqlx::query(
            r#"
            INSERT INTO stock_entries (lot_id, category_key, category, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (lot_id, category_key) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                updated_at = NOW()
            "#,
        )
        .bind(lot_id.as_uuid())
        .bind(&key)
        .bind(category.trim())
        .bind(remaining)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_entry", e))?;
    }
    Ok(())
}

async fn count_entries(
    tx: &mut Transaction<'_, Postgres>,
    lot_id: LotId,
) -> Result<usize, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_entries WHERE lot_id = $1")
        .bind(lot_id.as_uuid())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("count_entries", e))?;
    Ok(count.max(0) as usize)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") | Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn decode<T>(row: &PgRow) -> Result<T, StoreError>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    T::from_row(row).map_err(|e| StoreError::Backend(format!("failed to decode row: {e}")))
}

// SQLx row types

#[derive(Debug)]
struct LotRow {
    id: uuid::Uuid,
    farm_id: uuid::Uuid,
    name: String,
    module_name: Option<String>,
    last_destocked_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for LotRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LotRow {
            id: row.try_get("id")?,
            farm_id: row.try_get("farm_id")?,
            name: row.try_get("name")?,
            module_name: row.try_get("module_name")?,
            last_destocked_at: row.try_get("last_destocked_at")?,
        })
    }
}

impl From<LotRow> for Lot {
    fn from(row: LotRow) -> Self {
        Lot {
            id: LotId::from_uuid(row.id),
            farm_id: FarmId::from_uuid(row.farm_id),
            name: row.name,
            module_name: row.module_name,
            last_destocked_at: row.last_destocked_at,
        }
    }
}

#[derive(Debug)]
struct DefinitionRow {
    singular_name: String,
    plural_name: String,
    species: String,
    active: bool,
}

impl<'r> FromRow<'r, PgRow> for DefinitionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(DefinitionRow {
            singular_name: row.try_get("singular_name")?,
            plural_name: row.try_get("plural_name")?,
            species: row.try_get("species")?,
            active: row.try_get("active")?,
        })
    }
}

impl TryFrom<DefinitionRow> for CategoryDefinition {
    type Error = StoreError;

    fn try_from(row: DefinitionRow) -> Result<Self, Self::Error> {
        Ok(CategoryDefinition {
            singular_name: row.singular_name,
            plural_name: row.plural_name,
            species: row.species.parse()?,
            active: row.active,
        })
    }
}

#[derive(Debug)]
struct EntryRow {
    lot_id: uuid::Uuid,
    category: String,
    quantity: i64,
}

impl<'r> FromRow<'r, PgRow> for EntryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(EntryRow {
            lot_id: row.try_get("lot_id")?,
            category: row.try_get("category")?,
            quantity: row.try_get("quantity")?,
        })
    }
}

impl From<EntryRow> for StockEntry {
    fn from(row: EntryRow) -> Self {
        StockEntry::new(LotId::from_uuid(row.lot_id), row.category, row.quantity)
    }
}
