use std::sync::Arc;

use campo_core::LotId;
use campo_stock::{CategoryDefinition, Lot, StockEntry};
use serde::{Deserialize, Serialize};

use crate::category::{CategoryMatch, CategoryResolver};
use crate::intent::LotSlot;
use crate::lot::{DEFAULT_SUGGESTION_LIMIT, LotResolver};
use crate::resolution::Resolution;
use crate::stemmer::{CategoryStemmer, StemmerTables};
use crate::stock::StockResolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Upper bound on `NotFound` suggestions for lots and categories.
    pub suggestion_limit: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

/// The three resolvers wired to one shared stemmer.
///
/// Cheap to clone and safe to share across request handlers.
#[derive(Debug, Clone)]
pub struct EntityResolver {
    lots: LotResolver,
    categories: CategoryResolver,
    stock: StockResolver,
}

impl Default for EntityResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default(), StemmerTables::default())
    }
}

impl EntityResolver {
    pub fn new(config: ResolverConfig, tables: StemmerTables) -> Self {
        let stemmer = Arc::new(CategoryStemmer::new(tables));
        Self {
            lots: LotResolver::new(config.suggestion_limit),
            categories: CategoryResolver::new(Arc::clone(&stemmer), config.suggestion_limit),
            stock: StockResolver::new(stemmer),
        }
    }

    pub fn resolve_lot(&self, slot: &LotSlot, lots: &[Lot]) -> Resolution<Lot> {
        self.lots
            .resolve_in_module(&slot.name, slot.module.as_deref(), lots)
    }

    pub fn resolve_category(
        &self,
        query: &str,
        definitions: &[CategoryDefinition],
        in_use: &[String],
    ) -> Resolution<CategoryMatch> {
        self.categories.resolve(query, definitions, in_use)
    }

    pub fn resolve_stock(
        &self,
        query: &str,
        lot_id: LotId,
        entries: &[StockEntry],
    ) -> Resolution<StockEntry> {
        self.stock.resolve_in_lot(query, lot_id, entries)
    }
}
