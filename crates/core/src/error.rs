//! Errors raised by the stock domain.

use thiserror::Error;

/// A movement or value the domain refuses.
///
/// Resolver outcomes ("nothing matched", "several matched") are results, not
/// errors, and never show up here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input: zero delta, blank category, empty change list.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The change would take a lot's stock below zero.
    #[error(
        "insufficient stock in lot '{lot}': {available} head of '{category}' on hand, change is {delta}"
    )]
    InsufficientStock {
        lot: String,
        category: String,
        available: i64,
        delta: i64,
    },

    /// A command reached an aggregate it was not addressed to.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn insufficient_stock(
        lot: impl Into<String>,
        category: impl Into<String>,
        available: i64,
        delta: i64,
    ) -> Self {
        Self::InsufficientStock {
            lot: lot.into(),
            category: category.into(),
            available,
            delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_names_lot_and_category() {
        let err = DomainError::insufficient_stock("Norte", "Vacas", 3, -4);
        assert_eq!(
            err.to_string(),
            "insufficient stock in lot 'Norte': 3 head of 'Vacas' on hand, change is -4"
        );
    }
}
