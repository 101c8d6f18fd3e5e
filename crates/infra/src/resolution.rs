//! Resolve every slot of a classified intent against one farm's data.
//!
//! Lot slots go through the lot resolver. Categories that bring animals into a lot
//! (birth, purchase, recategorization target) resolve against the farm vocabulary;
//! categories that take animals out resolve against the stock of the lot already
//! resolved, so a lot-scoped slot is only reported once its lot resolved.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use campo_core::{DomainError, FarmId};
use campo_resolver::{
    CategoryMatch, ClassifiedIntent, EntityResolver, IntentKind, LotSlot, Resolution,
};
use campo_stock::{Lot, StockDelta, StockEntry, same_category};

use crate::error::ServiceError;
use crate::store::SharedFarmStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "entity", content = "resolution", rename_all = "snake_case")]
pub enum SlotOutcome {
    Lot(Resolution<Lot>),
    Category(Resolution<CategoryMatch>),
    Stock(Resolution<StockEntry>),
}

impl SlotOutcome {
    pub fn is_resolved(&self) -> bool {
        match self {
            SlotOutcome::Lot(r) => r.is_resolved(),
            SlotOutcome::Category(r) => r.is_resolved(),
            SlotOutcome::Stock(r) => r.is_resolved(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReport {
    pub slot: &'static str,
    pub query: String,
    pub outcome: SlotOutcome,
}

/// Signed stock deltas ready for `FarmStore::apply_stock_deltas`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementPlan {
    pub intent: IntentKind,
    pub deltas: Vec<StockDelta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub intent: IntentKind,
    pub slots: Vec<SlotReport>,
    /// Present for movements whose slots all resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<MovementPlan>,
    /// Answer to a stock query whose slots all resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<Vec<StockEntry>>,
}

impl ResolutionReport {
    fn new(intent: IntentKind) -> Self {
        Self {
            intent,
            slots: Vec::new(),
            plan: None,
            stock: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|s| s.outcome.is_resolved())
    }

    /// Slots the user still has to clarify.
    pub fn pending_slots(&self) -> Vec<&'static str> {
        self.slots
            .iter()
            .filter(|s| !s.outcome.is_resolved())
            .map(|s| s.slot)
            .collect()
    }

    fn record_lot(
        &mut self,
        slot: &'static str,
        query: &LotSlot,
        resolution: Resolution<Lot>,
    ) -> Option<Lot> {
        let lot = resolution.resolved().cloned();
        self.slots.push(SlotReport {
            slot,
            query: query.name.clone(),
            outcome: SlotOutcome::Lot(resolution),
        });
        lot
    }

    fn record_category(
        &mut self,
        slot: &'static str,
        query: &str,
        resolution: Resolution<CategoryMatch>,
    ) -> Option<CategoryMatch> {
        let category = resolution.resolved().cloned();
        self.slots.push(SlotReport {
            slot,
            query: query.to_string(),
            outcome: SlotOutcome::Category(resolution),
        });
        category
    }

    fn record_stock(
        &mut self,
        slot: &'static str,
        query: &str,
        resolution: Resolution<StockEntry>,
    ) -> Option<StockEntry> {
        let entry = resolution.resolved().cloned();
        self.slots.push(SlotReport {
            slot,
            query: query.to_string(),
            outcome: SlotOutcome::Stock(resolution),
        });
        entry
    }

    fn plan(&mut self, deltas: Vec<StockDelta>) {
        self.plan = Some(MovementPlan {
            intent: self.intent,
            deltas,
        });
    }
}

#[derive(Clone)]
pub struct SlotResolutionService {
    store: SharedFarmStore,
    resolver: Arc<EntityResolver>,
}

impl SlotResolutionService {
    pub fn new(store: SharedFarmStore, resolver: Arc<EntityResolver>) -> Self {
        Self { store, resolver }
    }

    #[instrument(skip(self, intent), fields(farm_id = %farm_id, intent = intent.kind().as_str()), err)]
    pub async fn resolve(
        &self,
        farm_id: FarmId,
        intent: &ClassifiedIntent,
    ) -> Result<ResolutionReport, ServiceError> {
        let lots = self.store.list_lots(farm_id).await?;
        let mut report = ResolutionReport::new(intent.kind());

        match intent {
            ClassifiedIntent::Birth {
                lot,
                category,
                quantity,
            }
            | ClassifiedIntent::Purchase {
                lot,
                category,
                quantity,
            } => {
                let lot = report.record_lot("lot", lot, self.resolver.resolve_lot(lot, &lots));
                let resolution = self.resolve_inbound(farm_id, category).await?;
                let category = report.record_category("category", category, resolution);
                if let (Some(lot), Some(category)) = (lot, category) {
                    report.plan(vec![StockDelta::new(lot.id, category.name, *quantity)]);
                }
            }
            ClassifiedIntent::Sale {
                lot,
                category,
                quantity,
            }
            | ClassifiedIntent::Death {
                lot,
                category,
                quantity,
            } => {
                let lot = report.record_lot("lot", lot, self.resolver.resolve_lot(lot, &lots));
                if let Some(lot) = lot {
                    let resolution = self.resolve_outbound(farm_id, category, &lot).await?;
                    if let Some(entry) = report.record_stock("category", category, resolution) {
                        report.plan(vec![StockDelta::new(lot.id, entry.category, -*quantity)]);
                    }
                }
            }
            ClassifiedIntent::Transfer {
                from_lot,
                to_lot,
                category,
                quantity,
            } => {
                let from = report.record_lot(
                    "from_lot",
                    from_lot,
                    self.resolver.resolve_lot(from_lot, &lots),
                );
                let to = report.record_lot("to_lot", to_lot, self.resolver.resolve_lot(to_lot, &lots));
                let entry = match &from {
                    Some(from) => {
                        let resolution = self.resolve_outbound(farm_id, category, from).await?;
                        report.record_stock("category", category, resolution)
                    }
                    None => None,
                };
                if let (Some(from), Some(to), Some(entry)) = (from, to, entry) {
                    if from.id == to.id {
                        return Err(DomainError::validation(
                            "transfer source and destination are the same lot",
                        )
                        .into());
                    }
                    report.plan(vec![
                        StockDelta::new(from.id, entry.category.clone(), -*quantity),
                        StockDelta::new(to.id, entry.category, *quantity),
                    ]);
                }
            }
            ClassifiedIntent::Recategorization {
                lot,
                category,
                to_category,
                quantity,
            } => {
                let lot = report.record_lot("lot", lot, self.resolver.resolve_lot(lot, &lots));
                let source = match &lot {
                    Some(lot) => {
                        let resolution = self.resolve_outbound(farm_id, category, lot).await?;
                        report.record_stock("category", category, resolution)
                    }
                    None => None,
                };
                let resolution = self.resolve_inbound(farm_id, to_category).await?;
                let target = report.record_category("to_category", to_category, resolution);
                if let (Some(lot), Some(source), Some(target)) = (lot, source, target) {
                    if same_category(&source.category, &target.name) {
                        return Err(DomainError::validation(
                            "recategorization source and target are the same category",
                        )
                        .into());
                    }
                    report.plan(vec![
                        StockDelta::new(lot.id, source.category, -*quantity),
                        StockDelta::new(lot.id, target.name, *quantity),
                    ]);
                }
            }
            ClassifiedIntent::StockQuery { lot, category } => {
                let lot = report.record_lot("lot", lot, self.resolver.resolve_lot(lot, &lots));
                if let Some(lot) = lot {
                    let entries = self.store.list_stock_by_lot(farm_id, lot.id).await?;
                    let stock = match category {
                        None => Some(entries),
                        Some(query) => {
                            let resolution = self.resolver.resolve_stock(query, lot.id, &entries);
                            report
                                .record_stock("category", query, resolution)
                                .map(|entry| vec![entry])
                        }
                    };
                    report.stock = stock;
                }
            }
        }

        debug!(
            complete = report.is_complete(),
            slots = report.slots.len(),
            "intent slots resolved"
        );
        Ok(report)
    }

    async fn resolve_inbound(
        &self,
        farm_id: FarmId,
        query: &str,
    ) -> Result<Resolution<CategoryMatch>, ServiceError> {
        let definitions = self.store.list_active_category_definitions(farm_id).await?;
        let in_use = self.store.list_categories_in_use(farm_id).await?;
        Ok(self
            .resolver
            .resolve_category(query, &definitions, &in_use))
    }

    async fn resolve_outbound(
        &self,
        farm_id: FarmId,
        query: &str,
        lot: &Lot,
    ) -> Result<Resolution<StockEntry>, ServiceError> {
        let entries = self.store.list_stock_by_lot(farm_id, lot.id).await?;
        Ok(self.resolver.resolve_stock(query, lot.id, &entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryFarmStore;
    use campo_stock::{CategoryDefinition, Species};

    struct Farm {
        service: SlotResolutionService,
        farm_id: FarmId,
        norte: Lot,
        sur: Lot,
    }

    fn farm() -> Farm {
        let store = InMemoryFarmStore::new();
        let farm_id = FarmId::new();
        let norte = Lot::new(farm_id, "Norte");
        let sur = Lot::new(farm_id, "Sur");
        store.insert_lot(norte.clone()).unwrap();
        store.insert_lot(sur.clone()).unwrap();
        store.insert_category_definition(
            farm_id,
            CategoryDefinition::new("Vaca", "Vacas", Species::Cattle),
        ).unwrap();
        store.insert_category_definition(
            farm_id,
            CategoryDefinition::new("Ternero", "Terneros", Species::Cattle),
        ).unwrap();
        store.put_stock(farm_id, StockEntry::new(norte.id, "Vacas", 10)).unwrap();

        Farm {
            service: SlotResolutionService::new(
                Arc::new(store),
                Arc::new(EntityResolver::default()),
            ),
            farm_id,
            norte,
            sur,
        }
    }

    fn lot(name: &str) -> LotSlot {
        LotSlot {
            name: name.to_string(),
            module: None,
        }
    }

    #[tokio::test]
    async fn birth_plans_an_inbound_delta_with_the_definition_label() {
        let f = farm();
        let intent = ClassifiedIntent::Birth {
            lot: lot("sur"),
            category: "ternerito".into(),
            quantity: 3,
        };

        let report = f.service.resolve(f.farm_id, &intent).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(
            report.plan.unwrap().deltas,
            vec![StockDelta::new(f.sur.id, "Terneros", 3)]
        );
    }

    #[tokio::test]
    async fn transfer_uses_the_source_lot_stock_label() {
        let f = farm();
        let intent = ClassifiedIntent::Transfer {
            from_lot: lot("norte"),
            to_lot: lot("sur"),
            category: "vaca".into(),
            quantity: 4,
        };

        let report = f.service.resolve(f.farm_id, &intent).await.unwrap();
        assert_eq!(
            report.plan.unwrap().deltas,
            vec![
                StockDelta::new(f.norte.id, "Vacas", -4),
                StockDelta::new(f.sur.id, "Vacas", 4),
            ]
        );
    }

    #[tokio::test]
    async fn outbound_category_is_scoped_to_the_resolved_lot() {
        let f = farm();
        let intent = ClassifiedIntent::Sale {
            lot: lot("sur"),
            category: "vacas".into(),
            quantity: 1,
        };

        let report = f.service.resolve(f.farm_id, &intent).await.unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.pending_slots(), vec!["category"]);
        assert!(report.plan.is_none());
    }

    #[tokio::test]
    async fn unresolved_lot_skips_its_lot_scoped_category() {
        let f = farm();
        let intent = ClassifiedIntent::Death {
            lot: lot("potrero inexistente"),
            category: "vacas".into(),
            quantity: 1,
        };

        let report = f.service.resolve(f.farm_id, &intent).await.unwrap();
        assert_eq!(report.slots.len(), 1);
        assert_eq!(report.pending_slots(), vec!["lot"]);
        match &report.slots[0].outcome {
            SlotOutcome::Lot(Resolution::NotFound { suggestions }) => {
                assert_eq!(suggestions, &vec!["Norte".to_string(), "Sur".to_string()]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn recategorization_moves_between_categories_on_one_lot() {
        let f = farm();
        let intent = ClassifiedIntent::Recategorization {
            lot: lot("norte"),
            category: "vacas".into(),
            to_category: "terneros".into(),
            quantity: 2,
        };

        let report = f.service.resolve(f.farm_id, &intent).await.unwrap();
        assert_eq!(
            report.plan.unwrap().deltas,
            vec![
                StockDelta::new(f.norte.id, "Vacas", -2),
                StockDelta::new(f.norte.id, "Terneros", 2),
            ]
        );
    }

    #[tokio::test]
    async fn transfer_within_one_lot_is_rejected() {
        let f = farm();
        let intent = ClassifiedIntent::Transfer {
            from_lot: lot("norte"),
            to_lot: lot("Norte"),
            category: "vacas".into(),
            quantity: 1,
        };

        let err = f.service.resolve(f.farm_id, &intent).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn stock_query_answers_with_lot_entries() {
        let f = farm();
        let all = ClassifiedIntent::StockQuery {
            lot: lot("norte"),
            category: None,
        };
        let report = f.service.resolve(f.farm_id, &all).await.unwrap();
        assert!(report.plan.is_none());
        assert_eq!(
            report.stock,
            Some(vec![StockEntry::new(f.norte.id, "Vacas", 10)])
        );

        let empty = ClassifiedIntent::StockQuery {
            lot: lot("sur"),
            category: None,
        };
        let report = f.service.resolve(f.farm_id, &empty).await.unwrap();
        assert_eq!(report.stock, Some(Vec::new()));
    }

    #[test]
    fn report_serializes_with_entity_and_status_tags() {
        let mut report = ResolutionReport::new(IntentKind::Sale);
        report.record_stock(
            "category",
            "toros",
            Resolution::NotFound {
                suggestions: vec!["Vacas".into()],
            },
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["intent"], "sale");
        assert_eq!(json["slots"][0]["outcome"]["entity"], "stock");
        assert_eq!(
            json["slots"][0]["outcome"]["resolution"]["status"],
            "not_found"
        );
        assert!(json.get("plan").is_none());
    }
}
