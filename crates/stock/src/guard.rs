//! Destock timestamp rule applied after every stock mutation.
//!
//! Pasture-rotation day counters measure the time since a paddock was last left
//! completely empty. A movement may only move that timestamp when, after the
//! movement, the lot has no stock entries left. Partial removals leave it alone.
//!
//! The rule is evaluated on the lot's final state inside the same transaction
//! that applied the deltas; stores recount the remaining entries there.

use chrono::{DateTime, Utc};

#[derive(Debug, Copy, Clone, Default)]
pub struct MovementGuard;

impl MovementGuard {
    /// Whether a lot with `remaining_entries` entries counts as fully destocked.
    pub fn fires(remaining_entries: usize) -> bool {
        remaining_entries == 0
    }

    /// The lot's `last_destocked_at` after a movement completed at `now`.
    pub fn next_destocked_at(
        previous: Option<DateTime<Utc>>,
        remaining_entries: usize,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if Self::fires(remaining_entries) {
            Some(now)
        } else {
            previous
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn keeps_previous_timestamp_while_entries_remain() {
        let before = Utc::now() - Duration::days(30);
        let now = Utc::now();
        assert_eq!(MovementGuard::next_destocked_at(Some(before), 1, now), Some(before));
        assert_eq!(MovementGuard::next_destocked_at(None, 3, now), None);
    }

    #[test]
    fn stamps_now_when_lot_is_empty() {
        let before = Utc::now() - Duration::days(30);
        let now = Utc::now();
        assert_eq!(MovementGuard::next_destocked_at(Some(before), 0, now), Some(now));
    }
}
