//! `campo-core`: ids, errors and the aggregate/event traits.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! farm-scoped identifiers, the domain error model and the aggregate/event traits
//! the stock domain is written against.

pub mod aggregate;
pub mod error;
pub mod event;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::DomainError;
pub use event::Event;
pub use id::{FarmId, LotId};
