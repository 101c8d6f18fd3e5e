//! Command/event aggregate traits the stock domain is written against.

/// Identity and load-relative version of an aggregate.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Events applied since the aggregate was built from storage.
    fn version(&self) -> u64;
}

/// A consistency boundary that turns commands into events.
///
/// `handle` decides and never mutates; `apply` mutates and never fails. Stores
/// build the aggregate from current rows, `execute` a command, then persist the
/// aggregate's state in the same transaction they read it in.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// `handle` followed by `apply` of every returned event.
    fn execute(&mut self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = self.handle(command)?;
        events.iter().for_each(|event| self.apply(event));
        Ok(events)
    }
}
