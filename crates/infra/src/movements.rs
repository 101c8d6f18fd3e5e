//! Apply resolved movement plans through the farm store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use campo_core::{DomainError, Event, FarmId, LotId};
use campo_resolver::{ClassifiedIntent, IntentKind};
use campo_stock::StockEvent;

use crate::error::ServiceError;
use crate::resolution::{MovementPlan, ResolutionReport, SlotResolutionService};
use crate::store::SharedFarmStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementReceipt {
    pub intent: IntentKind,
    pub events: Vec<StockEvent>,
    /// Lots this movement left empty; their rest-day counter restarts now.
    pub destocked_lots: Vec<LotId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MovementOutcome {
    Applied { receipt: MovementReceipt },
    /// Some slot was ambiguous or unknown; nothing was written.
    NeedsClarification { report: ResolutionReport },
}

#[derive(Clone)]
pub struct MovementService {
    store: SharedFarmStore,
    slots: SlotResolutionService,
}

impl MovementService {
    pub fn new(store: SharedFarmStore, slots: SlotResolutionService) -> Self {
        Self { store, slots }
    }

    #[instrument(skip(self, plan), fields(farm_id = %farm_id, intent = plan.intent.as_str()), err)]
    pub async fn apply(
        &self,
        farm_id: FarmId,
        plan: MovementPlan,
        occurred_at: DateTime<Utc>,
    ) -> Result<MovementReceipt, ServiceError> {
        let events = self
            .store
            .apply_stock_deltas(farm_id, plan.deltas, occurred_at)
            .await?;

        for event in &events {
            debug!(event_type = event.event_type(), lot_id = %event.lot_id(), "stock event committed");
        }
        let destocked_lots: Vec<LotId> = events
            .iter()
            .filter_map(|event| match event {
                StockEvent::LotDestocked(e) => Some(e.lot_id),
                StockEvent::StockAdjusted(_) => None,
            })
            .collect();
        info!(
            events = events.len(),
            destocked = destocked_lots.len(),
            "movement applied"
        );

        Ok(MovementReceipt {
            intent: plan.intent,
            events,
            destocked_lots,
        })
    }

    /// Resolve the intent's slots and, when all of them resolved, apply the plan.
    pub async fn execute(
        &self,
        farm_id: FarmId,
        intent: &ClassifiedIntent,
        occurred_at: DateTime<Utc>,
    ) -> Result<MovementOutcome, ServiceError> {
        if intent.kind() == IntentKind::StockQuery {
            return Err(DomainError::validation("stock queries do not move stock").into());
        }

        let mut report = self.slots.resolve(farm_id, intent).await?;
        match report.plan.take() {
            Some(plan) => Ok(MovementOutcome::Applied {
                receipt: self.apply(farm_id, plan, occurred_at).await?,
            }),
            None => Ok(MovementOutcome::NeedsClarification { report }),
        }
    }
}
