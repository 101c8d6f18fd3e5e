//! Lot (paddock) resolution.
//!
//! Tiers, first tier with any hit wins:
//! 1. exact normalized name
//! 2. containment in either direction, scored by overlap then length difference
//! 3. lot code equality ("b02" == "B2")
//! 4. bare number equal to a standalone digit token of the name
//!
//! Within the winning tier the best candidates are taken in input order. The first
//! one wins unless another tied lot has the same name in a different module; then
//! the caller has to ask which module was meant.

use std::cmp::Reverse;

use campo_stock::Lot;
use tracing::debug;

use crate::matching::{containment, digit_tokens, trim_zeros};
use crate::normalize::normalize;
use crate::pattern::{codes_in, extract_code};
use crate::resolution::Resolution;

pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Tier {
    Exact,
    Containment,
    Code,
    Numeric,
}

struct Candidate<'a> {
    lot: &'a Lot,
    name: String,
    module: Option<String>,
}

impl<'a> Candidate<'a> {
    fn new(lot: &'a Lot) -> Self {
        Self {
            lot,
            name: normalize(&lot.name),
            module: normalized_module(lot),
        }
    }
}

fn normalized_module(lot: &Lot) -> Option<String> {
    lot.module_name
        .as_deref()
        .map(normalize)
        .filter(|m| !m.is_empty())
}

#[derive(Debug, Clone)]
pub struct LotResolver {
    suggestion_limit: usize,
}

impl Default for LotResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SUGGESTION_LIMIT)
    }
}

impl LotResolver {
    pub fn new(suggestion_limit: usize) -> Self {
        Self { suggestion_limit }
    }

    pub fn resolve(&self, query: &str, lots: &[Lot]) -> Resolution<Lot> {
        let normalized = normalize(query);
        if normalized.is_empty() {
            return self.not_found(lots);
        }

        let candidates: Vec<Candidate<'_>> = lots.iter().map(Candidate::new).collect();
        match best_matches(&normalized, &candidates) {
            Some((tier, tied)) => {
                debug!(query = %normalized, ?tier, tied = tied.len(), "lot matched");
                pick(&candidates, &tied)
            }
            None => {
                debug!(query = %normalized, "no lot matched");
                self.not_found(lots)
            }
        }
    }

    /// Resolve among the lots of one module. Falls back to every lot when the hint
    /// names no known module.
    pub fn resolve_in_module(
        &self,
        query: &str,
        module_hint: Option<&str>,
        lots: &[Lot],
    ) -> Resolution<Lot> {
        let hint = module_hint.map(normalize).filter(|h| !h.is_empty());
        let Some(hint) = hint else {
            return self.resolve(query, lots);
        };

        let in_module: Vec<Lot> = lots
            .iter()
            .filter(|lot| normalized_module(lot).as_deref() == Some(hint.as_str()))
            .cloned()
            .collect();
        if in_module.is_empty() {
            debug!(module = %hint, "module hint matched no lots, ignoring it");
            return self.resolve(query, lots);
        }
        self.resolve(query, &in_module)
    }

    fn not_found(&self, lots: &[Lot]) -> Resolution<Lot> {
        Resolution::NotFound {
            suggestions: lots
                .iter()
                .take(self.suggestion_limit)
                .map(Lot::display_name)
                .collect(),
        }
    }
}

/// Indices of the best candidates of the first tier with any hit. Never empty.
fn best_matches(query: &str, candidates: &[Candidate<'_>]) -> Option<(Tier, Vec<usize>)> {
    let exact = hits(candidates, |c| c.name == query);
    if !exact.is_empty() {
        return Some((Tier::Exact, exact));
    }

    let query_len = query.chars().count();
    let scored: Vec<(usize, (usize, Reverse<usize>))> = candidates
        .iter()
        .enumerate()
        .filter_map(|(i, c)| {
            let (_, overlap) = containment(query, &c.name)?;
            let diff = c.name.chars().count().abs_diff(query_len);
            Some((i, (overlap, Reverse(diff))))
        })
        .collect();
    if let Some(best) = scored.iter().map(|(_, score)| *score).max() {
        let tied = scored
            .into_iter()
            .filter(|(_, score)| *score == best)
            .map(|(i, _)| i)
            .collect();
        return Some((Tier::Containment, tied));
    }

    if let Some(code) = extract_code(query) {
        let by_code = hits(candidates, |c| codes_in(&c.name).any(|found| found == code));
        if !by_code.is_empty() {
            return Some((Tier::Code, by_code));
        }
    }

    if query.chars().all(|c| c.is_ascii_digit()) {
        let wanted = trim_zeros(query);
        let by_number = hits(candidates, |c| digit_tokens(&c.name).any(|token| token == wanted));
        if !by_number.is_empty() {
            return Some((Tier::Numeric, by_number));
        }
    }

    None
}

fn hits(candidates: &[Candidate<'_>], pred: impl Fn(&Candidate<'_>) -> bool) -> Vec<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| pred(c))
        .map(|(i, _)| i)
        .collect()
}

fn pick(candidates: &[Candidate<'_>], tied: &[usize]) -> Resolution<Lot> {
    let tied: Vec<&Candidate<'_>> = tied.iter().map(|&i| &candidates[i]).collect();
    let Some(first) = tied.first() else {
        return Resolution::NotFound {
            suggestions: Vec::new(),
        };
    };

    let same_name: Vec<&Candidate<'_>> = tied
        .iter()
        .copied()
        .filter(|c| c.name == first.name)
        .collect();
    if same_name.iter().any(|c| c.module != first.module) {
        Resolution::Ambiguous {
            candidates: same_name.into_iter().map(|c| c.lot.clone()).collect(),
        }
    } else {
        Resolution::Resolved {
            entity: first.lot.clone(),
        }
    }
}
