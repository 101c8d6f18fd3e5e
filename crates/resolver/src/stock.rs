//! Resolution of a category mention against the stock of one lot.
//!
//! Only categories present in that lot are candidates; a category that exists
//! elsewhere in the farm is never returned.

use std::sync::Arc;

use campo_core::LotId;
use campo_stock::StockEntry;
use tracing::debug;

use crate::category::surface;
use crate::matching::{Matched, match_surfaces};
use crate::normalize::normalize;
use crate::resolution::Resolution;
use crate::stemmer::CategoryStemmer;

#[derive(Debug, Clone, Default)]
pub struct StockResolver {
    stemmer: Arc<CategoryStemmer>,
}

impl StockResolver {
    pub fn new(stemmer: Arc<CategoryStemmer>) -> Self {
        Self { stemmer }
    }

    /// Resolve against entries of a single lot. Suggestions on a miss are every
    /// category in those entries.
    pub fn resolve(&self, query: &str, entries: &[StockEntry]) -> Resolution<StockEntry> {
        let surfaces: Vec<_> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| surface(&self.stemmer, i, &entry.category))
            .collect();

        let normalized = normalize(query);
        let root = self.stemmer.root(&normalized);
        let owners = match match_surfaces(&normalized, &root, &surfaces) {
            Matched::Exact(owners) | Matched::Loose(owners) => owners,
            Matched::Nothing => Vec::new(),
        };
        debug!(query = %normalized, %root, matched = owners.len(), "stock lookup");

        let suggestions = if owners.is_empty() {
            entries.iter().map(|e| e.category.clone()).collect()
        } else {
            Vec::new()
        };
        Resolution::from_candidates(
            owners.into_iter().map(|i| entries[i].clone()).collect(),
            suggestions,
        )
    }

    /// Same as [`StockResolver::resolve`], first dropping entries of other lots.
    pub fn resolve_in_lot(
        &self,
        query: &str,
        lot_id: LotId,
        entries: &[StockEntry],
    ) -> Resolution<StockEntry> {
        let in_lot: Vec<StockEntry> = entries
            .iter()
            .filter(|e| e.lot_id == lot_id)
            .cloned()
            .collect();
        self.resolve(query, &in_lot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_singular_query_to_stored_plural_entry() {
        let lot_id = LotId::new();
        let entries = vec![
            StockEntry::new(lot_id, "Vacas", 10),
            StockEntry::new(lot_id, "Terneros", 4),
        ];

        let entry = StockResolver::default().resolve("vaca", &entries).into_resolved();
        assert_eq!(entry, Some(StockEntry::new(lot_id, "Vacas", 10)));
    }

    #[test]
    fn categories_of_other_lots_are_never_returned() {
        let lot_a = LotId::new();
        let lot_b = LotId::new();
        let farm_entries = vec![
            StockEntry::new(lot_a, "Ovejas", 30),
            StockEntry::new(lot_b, "Vacas", 12),
        ];
        let resolver = StockResolver::default();

        assert!(resolver.resolve_in_lot("ovejas", lot_a, &farm_entries).is_resolved());
        match resolver.resolve_in_lot("ovejas", lot_b, &farm_entries) {
            Resolution::NotFound { suggestions } => assert_eq!(suggestions, vec!["Vacas"]),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn several_matching_entries_are_ambiguous() {
        let lot_id = LotId::new();
        let entries = vec![
            StockEntry::new(lot_id, "Novillos 1–2 años", 20),
            StockEntry::new(lot_id, "Vacas", 3),
            StockEntry::new(lot_id, "Novillos +3 años", 7),
        ];

        match StockResolver::default().resolve("novillos", &entries) {
            Resolution::Ambiguous { candidates } => {
                let quantities: Vec<i64> = candidates.iter().map(|e| e.quantity).collect();
                assert_eq!(quantities, vec![20, 7]);
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn empty_lot_has_no_suggestions() {
        let resolution = StockResolver::default().resolve("vacas", &[]);
        assert_eq!(
            resolution,
            Resolution::NotFound {
                suggestions: Vec::new()
            }
        );
    }
}
