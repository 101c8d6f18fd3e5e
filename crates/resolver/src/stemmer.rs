//! Domain stemming of animal-category phrases.
//!
//! Reduces "Novillos 1-2 años", "novillitos" and "novillo" to one root key. The
//! root is lossy and only ever compared for equality; it is never shown to users.
//!
//! Steps:
//! 1. strip age and qualifier fragments from the phrase
//! 2. per token: irregular surface form -> canonical singular
//! 3. per token: strip diminutive suffix (before plural, since "-itos" is plural too)
//! 4. per token: strip gender/plural suffix
//! 5. per token: stem alias -> canonical root
//!
//! Tables are immutable once the stemmer is built. The built-in vocabulary can be
//! replaced at start-up from a JSON file with the same shape as [`StemmerTables`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize::fold;

/// Suffix stripping never leaves fewer chars than this.
const MIN_STEM_CHARS: usize = 3;

const DIMINUTIVE_SUFFIXES: [&str; 8] = [
    "citos", "citas", "cito", "cita", "itos", "itas", "ito", "ita",
];

const SLASH_GENDER_SUFFIXES: [&str; 4] = ["/as", "/os", "/a", "/o"];

const GENDER_SUFFIXES: [&str; 4] = ["as", "os", "a", "o"];

/// Words that join qualifiers and carry no category meaning.
const CONNECTORS: [&str; 12] = [
    "a", "al", "con", "de", "del", "el", "en", "la", "las", "los", "mas", "y",
];

static QUALIFIER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // "+3 anos", "1-2 anos", "de 1 a 2 anos", "18 meses", "mas de 30 dias"
        r"(?:\b(?:mas de|menos de|de|hasta)\s+)?[+-]?\d+(?:\s*(?:-|a|y)\s*\d+)?\s*(?:anos?|meses?|dias?)\b",
        // "4 dientes", "2-4 dientes"
        r"\d+(?:[\s-]*\d+)?[\s-]*dientes?\b",
        // trailing "dl" (destete) and "mamon(es)"
        r"\bdl$",
        r"\bmamon(?:es?)?$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("qualifier regex"))
    .collect()
});

/// Vocabulary tables for the stemmer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemmerTables {
    /// Surface form -> canonical singular, looked up before suffix stripping.
    #[serde(default)]
    pub irregular_forms: BTreeMap<String, String>,
    /// Stem -> canonical root, looked up after suffix stripping.
    #[serde(default)]
    pub root_aliases: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum StemmerTablesError {
    #[error("failed to read stemmer tables from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid stemmer tables: {0}")]
    Parse(#[from] serde_json::Error),
}

impl StemmerTables {
    pub fn from_json(json: &str) -> Result<Self, StemmerTablesError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StemmerTablesError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| StemmerTablesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }
}

impl Default for StemmerTables {
    fn default() -> Self {
        let irregular_forms = [
            // cattle
            ("vacas", "vaca"),
            ("vaquita", "vaca"),
            ("vaquitas", "vaca"),
            ("vaquillonas", "vaquillona"),
            ("novillos", "novillo"),
            ("novillitos", "novillo"),
            ("terneros", "ternero"),
            ("terneras", "ternera"),
            ("toros", "toro"),
            ("toritos", "toro"),
            ("bueyes", "buey"),
            // sheep
            ("ovejas", "oveja"),
            ("carneros", "carnero"),
            ("corderos", "cordero"),
            ("corderas", "cordera"),
            ("borregos", "borrego"),
            ("borregas", "borrega"),
            ("capones", "capon"),
            // horses
            ("yeguas", "yegua"),
            ("caballos", "caballo"),
            ("padrillos", "padrillo"),
            ("potrillos", "potrillo"),
            ("potrancas", "potranca"),
            // pigs
            ("cerdos", "cerdo"),
            ("cerdas", "cerda"),
            ("lechones", "lechon"),
            ("chanchos", "chancho"),
            // goats
            ("cabras", "cabra"),
            ("chivos", "chivo"),
            ("cabritos", "cabrito"),
        ];
        let root_aliases = [
            ("chanch", "cerd"),
            ("marran", "cerd"),
            ("potranc", "potrill"),
            ("chiv", "cabr"),
        ];

        Self {
            irregular_forms: irregular_forms
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            root_aliases: root_aliases
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Category stemmer built once from immutable tables.
#[derive(Debug, Clone)]
pub struct CategoryStemmer {
    irregular_forms: BTreeMap<String, String>,
    root_aliases: BTreeMap<String, String>,
}

impl Default for CategoryStemmer {
    fn default() -> Self {
        Self::new(StemmerTables::default())
    }
}

impl CategoryStemmer {
    pub fn new(tables: StemmerTables) -> Self {
        let fold_map = |map: BTreeMap<String, String>| {
            map.into_iter()
                .map(|(k, v)| (fold(&k), fold(&v)))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .collect()
        };
        Self {
            irregular_forms: fold_map(tables.irregular_forms),
            root_aliases: fold_map(tables.root_aliases),
        }
    }

    /// Root key of a normalized category phrase. Empty when nothing meaningful is left.
    pub fn root(&self, normalized: &str) -> String {
        let mut phrase = normalized.to_string();
        for re in QUALIFIER_RES.iter() {
            phrase = re.replace_all(&phrase, " ").into_owned();
        }

        phrase
            .split_whitespace()
            .filter(|token| !CONNECTORS.contains(token))
            .map(|token| self.token_root(token))
            .filter(|root| !root.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn token_root(&self, token: &str) -> String {
        let singular = self
            .irregular_forms
            .get(token)
            .map(String::as_str)
            .unwrap_or(token);

        let stem = strip_any(singular, &DIMINUTIVE_SUFFIXES);
        let stem = strip_any(stem, &SLASH_GENDER_SUFFIXES);
        let stem = strip_any(stem, &GENDER_SUFFIXES);

        self.root_aliases
            .get(stem)
            .cloned()
            .unwrap_or_else(|| stem.to_string())
    }
}

/// Strip the first (longest listed first) matching suffix, keeping a minimum stem.
fn strip_any<'a>(token: &'a str, suffixes: &[&str]) -> &'a str {
    suffixes
        .iter()
        .find_map(|suffix| {
            token
                .strip_suffix(suffix)
                .filter(|stem| stem.chars().count() >= MIN_STEM_CHARS)
        })
        .unwrap_or(token)
}
