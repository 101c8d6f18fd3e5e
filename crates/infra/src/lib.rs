//! Infrastructure layer: farm storage, the services built on it, and config.

pub mod config;
pub mod error;
pub mod movements;
pub mod resolution;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::ServiceError;
pub use movements::{MovementOutcome, MovementReceipt, MovementService};
pub use resolution::{
    MovementPlan, ResolutionReport, SlotOutcome, SlotReport, SlotResolutionService,
};
pub use store::{
    FarmStore, InMemoryFarmStore, PostgresFarmStore, SharedFarmStore, StoreError,
};
