use std::sync::Arc;

use campo_infra::{MovementService, SharedFarmStore, SlotResolutionService};
use campo_resolver::EntityResolver;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub store: SharedFarmStore,
    pub slots: SlotResolutionService,
    pub movements: MovementService,
}

impl AppServices {
    pub fn new(store: SharedFarmStore, resolver: EntityResolver) -> Self {
        let slots = SlotResolutionService::new(Arc::clone(&store), Arc::new(resolver));
        let movements = MovementService::new(Arc::clone(&store), slots.clone());
        Self {
            store,
            slots,
            movements,
        }
    }
}
