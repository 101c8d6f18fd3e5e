use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campo_core::{Aggregate, AggregateRoot, DomainError, Event, FarmId, LotId};

use crate::entry::{StockEntry, same_category};
use crate::guard::MovementGuard;
use crate::lot::Lot;

/// Aggregate root: one lot together with its current stock entries.
///
/// Every stock mutation of a lot goes through this aggregate, so the quantity
/// invariants and the destock timestamp rule are enforced in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotStock {
    lot: Lot,
    entries: Vec<StockEntry>,
    version: u64,
}

impl LotStock {
    /// Rehydrate from a stored lot and its stored entries.
    pub fn new(lot: Lot, entries: Vec<StockEntry>) -> Self {
        let entries = entries.into_iter().filter(|e| e.quantity > 0).collect();
        Self {
            lot,
            entries,
            version: 0,
        }
    }

    pub fn lot(&self) -> &Lot {
        &self.lot
    }

    pub fn entries(&self) -> &[StockEntry] {
        &self.entries
    }

    pub fn quantity_of(&self, category: &str) -> i64 {
        self.entries
            .iter()
            .find(|e| e.is_category(category))
            .map(|e| e.quantity)
            .unwrap_or(0)
    }

    pub fn total_heads(&self) -> i64 {
        self.entries
            .iter()
            .fold(0i64, |total, e| total.saturating_add(e.quantity))
    }

    pub fn into_parts(self) -> (Lot, Vec<StockEntry>) {
        (self.lot, self.entries)
    }
}

impl AggregateRoot for LotStock {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.lot.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// A signed change for one category of the lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub category: String,
    pub delta: i64,
}

/// Command: apply a set of changes to one lot atomically.
///
/// The destock rule looks at the lot after *all* changes, so a recategorization
/// (`-5 Terneros`, `+5 Novillos`) never counts as emptying the lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyStockChanges {
    pub farm_id: FarmId,
    pub lot_id: LotId,
    pub changes: Vec<StockChange>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    ApplyChanges(ApplyStockChanges),
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub farm_id: FarmId,
    pub lot_id: LotId,
    pub category: String,
    pub delta: i64,
    /// Quantity left for the category; zero means the entry was deleted.
    pub remaining: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LotDestocked (no entries left after a movement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDestocked {
    pub farm_id: FarmId,
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StockEvent {
    StockAdjusted(StockAdjusted),
    LotDestocked(LotDestocked),
}

impl StockEvent {
    pub fn lot_id(&self) -> LotId {
        match self {
            StockEvent::StockAdjusted(e) => e.lot_id,
            StockEvent::LotDestocked(e) => e.lot_id,
        }
    }
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockAdjusted(_) => "stock.lot.adjusted",
            StockEvent::LotDestocked(_) => "stock.lot.destocked",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::StockAdjusted(e) => e.occurred_at,
            StockEvent::LotDestocked(e) => e.occurred_at,
        }
    }
}

impl Aggregate for LotStock {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::StockAdjusted(e) => {
                let idx = self.entries.iter().position(|x| x.is_category(&e.category));
                match (idx, e.remaining) {
                    (Some(i), 0) => {
                        self.entries.remove(i);
                    }
                    (Some(i), remaining) => self.entries[i].quantity = remaining,
                    (None, 0) => {}
                    (None, remaining) => self.entries.push(StockEntry::new(
                        self.lot.id,
                        e.category.trim(),
                        remaining,
                    )),
                }
            }
            StockEvent::LotDestocked(e) => {
                self.lot.last_destocked_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::ApplyChanges(cmd) => self.handle_changes(cmd),
        }
    }
}

impl LotStock {
    fn ensure_scope(&self, farm_id: FarmId, lot_id: LotId) -> Result<(), DomainError> {
        if self.lot.farm_id != farm_id {
            return Err(DomainError::invariant("farm mismatch"));
        }
        if self.lot.id != lot_id {
            return Err(DomainError::invariant("lot_id mismatch"));
        }
        Ok(())
    }

    fn handle_changes(&self, cmd: &ApplyStockChanges) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_scope(cmd.farm_id, cmd.lot_id)?;

        if cmd.changes.is_empty() {
            return Err(DomainError::validation("no stock changes given"));
        }

        // Working copy of (category, quantity); mirrors what `apply` will do.
        let mut working: Vec<(String, i64)> = self
            .entries
            .iter()
            .map(|e| (e.category.clone(), e.quantity))
            .collect();
        let mut events = Vec::with_capacity(cmd.changes.len() + 1);

        for change in &cmd.changes {
            let category = change.category.trim();
            if category.is_empty() {
                return Err(DomainError::validation("category cannot be empty"));
            }
            if change.delta == 0 {
                return Err(DomainError::validation("delta cannot be zero"));
            }

            let idx = working.iter().position(|(c, _)| same_category(c, category));
            let current = idx.map(|i| working[i].1).unwrap_or(0);
            let remaining = current.checked_add(change.delta).ok_or_else(|| {
                DomainError::validation(format!(
                    "{category} in lot {} would exceed the countable head limit",
                    self.lot.name
                ))
            })?;

            if remaining < 0 {
                return Err(DomainError::insufficient_stock(
                    self.lot.name.clone(),
                    category,
                    current,
                    change.delta,
                ));
            }

            // Keep the stored spelling of an existing category.
            let label = idx
                .map(|i| working[i].0.clone())
                .unwrap_or_else(|| category.to_string());

            match idx {
                Some(i) if remaining == 0 => {
                    working.remove(i);
                }
                Some(i) => working[i].1 = remaining,
                None => working.push((label.clone(), remaining)),
            }

            events.push(StockEvent::StockAdjusted(StockAdjusted {
                farm_id: cmd.farm_id,
                lot_id: cmd.lot_id,
                category: label,
                delta: change.delta,
                remaining,
                occurred_at: cmd.occurred_at,
            }));
        }

        // Recount after every change of the command, then let the guard decide.
        if MovementGuard::fires(working.len()) {
            events.push(StockEvent::LotDestocked(LotDestocked {
                farm_id: cmd.farm_id,
                lot_id: cmd.lot_id,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn lot_with(entries: &[(&str, i64)]) -> LotStock {
        let lot = Lot::new(FarmId::new(), "Norte");
        let stored = entries
            .iter()
            .map(|(c, q)| StockEntry::new(lot.id, *c, *q))
            .collect();
        LotStock::new(lot, stored)
    }

    fn changes(stock: &LotStock, changes: &[(&str, i64)], at: DateTime<Utc>) -> StockCommand {
        StockCommand::ApplyChanges(ApplyStockChanges {
            farm_id: stock.lot().farm_id,
            lot_id: stock.lot().id,
            changes: changes
                .iter()
                .map(|(c, d)| StockChange {
                    category: c.to_string(),
                    delta: *d,
                })
                .collect(),
            occurred_at: at,
        })
    }

    #[test]
    fn partial_removal_keeps_destock_timestamp() {
        let mut stock = lot_with(&[("Vacas", 10)]);
        let earlier = Utc::now() - Duration::days(40);
        stock.lot.last_destocked_at = Some(earlier);

        let events = stock
            .execute(&changes(&stock, &[("Vacas", -4)], Utc::now()))
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(stock.quantity_of("vacas"), 6);
        assert_eq!(stock.lot().last_destocked_at, Some(earlier));
    }

    #[test]
    fn removing_the_last_animals_stamps_destock_time() {
        let mut stock = lot_with(&[("Vacas", 10)]);
        let first = Utc::now();
        stock.execute(&changes(&stock, &[("Vacas", -4)], first)).unwrap();
        assert_eq!(stock.lot().last_destocked_at, None);

        let second = first + Duration::minutes(5);
        let events = stock.execute(&changes(&stock, &[("Vacas", -6)], second)).unwrap();

        assert!(matches!(events.last(), Some(StockEvent::LotDestocked(_))));
        assert!(stock.entries().is_empty());
        assert_eq!(stock.lot().last_destocked_at, Some(second));
    }

    #[test]
    fn emptying_one_category_while_others_remain_is_partial() {
        let mut stock = lot_with(&[("Vacas", 10), ("Toros", 2)]);
        stock.execute(&changes(&stock, &[("Toros", -2)], Utc::now())).unwrap();

        assert_eq!(stock.entries().len(), 1);
        assert_eq!(stock.lot().last_destocked_at, None);
    }

    #[test]
    fn recategorization_of_whole_lot_is_not_a_destock() {
        let mut stock = lot_with(&[("Terneros", 5)]);
        stock
            .execute(&changes(&stock, &[("Terneros", -5), ("Novillos", 5)], Utc::now()))
            .unwrap();

        assert_eq!(stock.quantity_of("Novillos"), 5);
        assert_eq!(stock.quantity_of("Terneros"), 0);
        assert_eq!(stock.lot().last_destocked_at, None);
    }

    #[test]
    fn zero_quantity_rows_are_deleted_not_kept() {
        let mut stock = lot_with(&[("Vacas", 3), ("Toros", 1)]);
        let events = stock.execute(&changes(&stock, &[("vacas", -3)], Utc::now())).unwrap();

        match &events[0] {
            StockEvent::StockAdjusted(e) => {
                assert_eq!(e.category, "Vacas");
                assert_eq!(e.remaining, 0);
            }
            _ => panic!("Expected StockAdjusted event"),
        }
        assert!(stock.entries().iter().all(|e| e.quantity > 0));
        assert_eq!(stock.entries().len(), 1);
    }

    #[test]
    fn rejects_negative_result() {
        let stock = lot_with(&[("Vacas", 3)]);
        let err = stock.handle(&changes(&stock, &[("Vacas", -4)], Utc::now())).unwrap_err();
        match err {
            DomainError::InsufficientStock {
                available, delta, ..
            } => assert_eq!((available, delta), (3, -4)),
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn rejects_inbound_that_overflows_the_count() {
        let stock = lot_with(&[("Vacas", 10)]);
        let err = stock
            .handle(&changes(&stock, &[("Vacas", i64::MAX)], Utc::now()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(stock.quantity_of("Vacas"), 10);
    }

    #[test]
    fn rejects_outbound_from_missing_category() {
        let stock = lot_with(&[("Vacas", 3)]);
        let err = stock.handle(&changes(&stock, &[("Toros", -1)], Utc::now())).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { available: 0, .. }));
    }

    #[test]
    fn rejects_zero_delta_and_blank_category() {
        let stock = lot_with(&[("Vacas", 3)]);
        let err = stock.handle(&changes(&stock, &[("Vacas", 0)], Utc::now())).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = stock.handle(&changes(&stock, &[("  ", 2)], Utc::now())).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_command_for_another_farm() {
        let stock = lot_with(&[("Vacas", 3)]);
        let cmd = StockCommand::ApplyChanges(ApplyStockChanges {
            farm_id: FarmId::new(),
            lot_id: stock.lot().id,
            changes: vec![StockChange {
                category: "Vacas".to_string(),
                delta: 1,
            }],
            occurred_at: Utc::now(),
        });
        assert!(matches!(
            stock.handle(&cmd).unwrap_err(),
            DomainError::InvariantViolation(_)
        ));
    }

    #[test]
    fn inbound_creates_entry_with_trimmed_label() {
        let mut stock = lot_with(&[]);
        stock.execute(&changes(&stock, &[(" Ovejas ", 12)], Utc::now())).unwrap();
        assert_eq!(stock.entries()[0].category, "Ovejas");
        assert_eq!(stock.total_heads(), 12);
        assert_eq!(stock.version(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever valid movements run, stored quantities stay positive and
        /// the destock timestamp is only ever set by a movement that emptied the lot.
        #[test]
        fn destock_timestamp_only_moves_when_lot_empties(
            moves in prop::collection::vec((0usize..3, -20i64..20i64), 1..40)
        ) {
            let categories = ["Vacas", "Toros", "Terneros"];
            let mut stock = lot_with(&[("Vacas", 10)]);
            let start = Utc::now();

            for (step, (cat, delta)) in moves.into_iter().enumerate() {
                if delta == 0 {
                    continue;
                }
                let before = stock.lot().last_destocked_at;
                let at = start + Duration::seconds(step as i64 + 1);
                let cmd = changes(&stock, &[(categories[cat], delta)], at);

                if stock.execute(&cmd).is_ok() {
                    prop_assert!(stock.entries().iter().all(|e| e.quantity > 0));
                    if stock.entries().is_empty() {
                        prop_assert_eq!(stock.lot().last_destocked_at, Some(at));
                    } else {
                        prop_assert_eq!(stock.lot().last_destocked_at, before);
                    }
                }
            }
        }
    }
}
