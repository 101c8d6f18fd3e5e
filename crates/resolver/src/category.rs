//! Category resolution against the farm-wide vocabulary.
//!
//! The universe is every active definition (singular and plural collapse into one
//! category) plus the free-text categories already written into stock. An in-use
//! string that normalizes to a definition name folds into that definition.

use std::sync::Arc;

use campo_stock::CategoryDefinition;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::lot::DEFAULT_SUGGESTION_LIMIT;
use crate::matching::{Matched, Surface, match_surfaces};
use crate::normalize::normalize;
use crate::resolution::Resolution;
use crate::stemmer::CategoryStemmer;

/// A resolved category. `name` is the label to write into stock entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMatch {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<CategoryDefinition>,
}

#[derive(Debug, Clone)]
pub struct CategoryResolver {
    stemmer: Arc<CategoryStemmer>,
    suggestion_limit: usize,
}

impl Default for CategoryResolver {
    fn default() -> Self {
        Self::new(Arc::new(CategoryStemmer::default()), DEFAULT_SUGGESTION_LIMIT)
    }
}

impl CategoryResolver {
    pub fn new(stemmer: Arc<CategoryStemmer>, suggestion_limit: usize) -> Self {
        Self {
            stemmer,
            suggestion_limit,
        }
    }

    pub fn resolve(
        &self,
        query: &str,
        definitions: &[CategoryDefinition],
        in_use: &[String],
    ) -> Resolution<CategoryMatch> {
        let active: Vec<&CategoryDefinition> = definitions.iter().filter(|d| d.active).collect();
        let (members, surfaces) = self.universe(&active, in_use);

        let normalized = normalize(query);
        let root = self.stemmer.root(&normalized);
        let owners = match match_surfaces(&normalized, &root, &surfaces) {
            Matched::Exact(owners) | Matched::Loose(owners) => owners,
            Matched::Nothing => Vec::new(),
        };
        debug!(query = %normalized, %root, matched = owners.len(), "category lookup");

        let suggestions = if owners.is_empty() {
            active
                .iter()
                .take(self.suggestion_limit)
                .map(|d| d.label().to_string())
                .collect()
        } else {
            Vec::new()
        };
        Resolution::from_candidates(
            owners.into_iter().map(|i| members[i].clone()).collect(),
            suggestions,
        )
    }

    fn universe(
        &self,
        active: &[&CategoryDefinition],
        in_use: &[String],
    ) -> (Vec<CategoryMatch>, Vec<Surface>) {
        let mut members = Vec::new();
        let mut surfaces: Vec<Surface> = Vec::new();

        for definition in active {
            let owner = members.len();
            members.push(CategoryMatch {
                name: definition.label().to_string(),
                definition: Some((*definition).clone()),
            });
            for name in definition.names() {
                surfaces.push(surface(&self.stemmer, owner, name));
            }
        }

        for category in in_use {
            let candidate = surface(&self.stemmer, members.len(), category);
            if candidate.normalized.is_empty()
                || surfaces.iter().any(|s| s.normalized == candidate.normalized)
            {
                continue;
            }
            members.push(CategoryMatch {
                name: category.trim().to_string(),
                definition: None,
            });
            surfaces.push(candidate);
        }

        (members, surfaces)
    }
}

pub(crate) fn surface(stemmer: &CategoryStemmer, owner: usize, raw: &str) -> Surface {
    let normalized = normalize(raw);
    let root = stemmer.root(&normalized);
    Surface {
        owner,
        normalized,
        root,
    }
}
