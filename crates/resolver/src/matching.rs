//! Matching primitives shared by the resolvers.

/// Shorter side of a containment match must have at least this many chars.
const MIN_CONTAINMENT_CHARS: usize = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Containment {
    /// The shorter string starts the longer one.
    Prefix,
    /// The shorter string sits somewhere inside the longer one.
    Inner,
}

/// Find `needle` inside `haystack` without splitting a digit run, so "3" never
/// matches inside "13" and "b2" never matches inside "b21".
pub(crate) fn find_at_boundary(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let needle_starts_digit = needle.starts_with(|c: char| c.is_ascii_digit());
    let needle_ends_digit = needle.ends_with(|c: char| c.is_ascii_digit());

    haystack.match_indices(needle).map(|(start, _)| start).find(|&start| {
        let end = start + needle.len();
        let splits_left = needle_starts_digit
            && haystack[..start].ends_with(|c: char| c.is_ascii_digit());
        let splits_right =
            needle_ends_digit && haystack[end..].starts_with(|c: char| c.is_ascii_digit());
        !splits_left && !splits_right
    })
}

/// Containment in either direction. Returns the kind and the overlap length in chars.
pub(crate) fn containment(a: &str, b: &str) -> Option<(Containment, usize)> {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let overlap = short.chars().count();
    if overlap < MIN_CONTAINMENT_CHARS {
        return None;
    }

    find_at_boundary(long, short).map(|start| {
        let kind = if start == 0 {
            Containment::Prefix
        } else {
            Containment::Inner
        };
        (kind, overlap)
    })
}

/// Tokens made only of digits, with leading zeros removed ("03" -> "3").
pub(crate) fn digit_tokens(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
        .map(trim_zeros)
}

pub(crate) fn trim_zeros(digits: &str) -> &str {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() && !digits.is_empty() {
        "0"
    } else {
        trimmed
    }
}

/// One matchable spelling of a category, owned by the category at `owner`.
#[derive(Debug, Clone)]
pub(crate) struct Surface {
    pub owner: usize,
    pub normalized: String,
    pub root: String,
}

/// Outcome of the category-style tiers (exact, containment, root stem).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Matched {
    /// Owners whose spelling equals the query.
    Exact(Vec<usize>),
    /// Owners matched by containment or root: prefix matches first, then inner
    /// containment, then root-only matches; each group in surface order.
    Loose(Vec<usize>),
    Nothing,
}

pub(crate) fn match_surfaces(query: &str, query_root: &str, surfaces: &[Surface]) -> Matched {
    if query.is_empty() {
        return Matched::Nothing;
    }

    let exact: Vec<usize> = surfaces
        .iter()
        .filter(|s| s.normalized == query)
        .map(|s| s.owner)
        .collect();
    if !exact.is_empty() {
        return Matched::Exact(dedup_owners(exact));
    }

    let mut prefix = Vec::new();
    let mut inner = Vec::new();
    let mut by_root = Vec::new();
    for surface in surfaces {
        match containment(query, &surface.normalized) {
            Some((Containment::Prefix, _)) => prefix.push(surface.owner),
            Some((Containment::Inner, _)) => inner.push(surface.owner),
            None if !query_root.is_empty() && surface.root == query_root => {
                by_root.push(surface.owner)
            }
            None => {}
        }
    }

    let owners = dedup_owners(prefix.into_iter().chain(inner).chain(by_root).collect());
    if owners.is_empty() {
        Matched::Nothing
    } else {
        Matched::Loose(owners)
    }
}

fn dedup_owners(owners: Vec<usize>) -> Vec<usize> {
    let mut seen = Vec::with_capacity(owners.len());
    for owner in owners {
        if !seen.contains(&owner) {
            seen.push(owner);
        }
    }
    seen
}
