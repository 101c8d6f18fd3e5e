use serde::{Deserialize, Serialize};

/// Outcome of resolving one free-text mention against known entities.
///
/// `Ambiguous` carries at least two candidates. `NotFound` carries a bounded
/// list of known names the caller can offer back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution<T> {
    Resolved { entity: T },
    Ambiguous { candidates: Vec<T> },
    NotFound { suggestions: Vec<String> },
}

impl<T> Resolution<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            Resolution::Resolved { entity } => Some(entity),
            _ => None,
        }
    }

    pub fn into_resolved(self) -> Option<T> {
        match self {
            Resolution::Resolved { entity } => Some(entity),
            _ => None,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Resolution<U> {
        match self {
            Resolution::Resolved { entity } => Resolution::Resolved { entity: f(entity) },
            Resolution::Ambiguous { candidates } => Resolution::Ambiguous {
                candidates: candidates.into_iter().map(f).collect(),
            },
            Resolution::NotFound { suggestions } => Resolution::NotFound { suggestions },
        }
    }

    /// Collapse a candidate list: one candidate resolves, more are ambiguous.
    pub(crate) fn from_candidates(mut candidates: Vec<T>, suggestions: Vec<String>) -> Self {
        match candidates.len() {
            0 => Resolution::NotFound { suggestions },
            1 => Resolution::Resolved {
                entity: candidates.remove(0),
            },
            _ => Resolution::Ambiguous { candidates },
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Resolution::Resolved { .. } => "resolved",
            Resolution::Ambiguous { .. } => "ambiguous",
            Resolution::NotFound { .. } => "not_found",
        }
    }
}
