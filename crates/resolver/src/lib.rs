//! `campo-resolver`
//!
//! **Responsibility:** turn free-text slot values coming from the conversational
//! channel into references to concrete lots, categories and stock entries.
//!
//! This crate is pure and synchronous:
//! - It never talks to storage; callers hand in a snapshot for one request.
//! - It never mutates domain state.
//! - "No match" and "several matches" are results, not errors.

pub mod category;
pub mod engine;
pub mod intent;
mod matching;
pub mod lot;
pub mod normalize;
pub mod pattern;
pub mod resolution;
pub mod stemmer;
pub mod stock;

pub use category::{CategoryMatch, CategoryResolver};
pub use engine::{EntityResolver, ResolverConfig};
pub use intent::{ClassifiedIntent, IntentError, IntentKind, LotSlot};
pub use lot::{DEFAULT_SUGGESTION_LIMIT, LotResolver};
pub use normalize::{fold, normalize};
pub use pattern::{Code, codes_in, extract_code};
pub use resolution::Resolution;
pub use stemmer::{CategoryStemmer, StemmerTables, StemmerTablesError};
pub use stock::StockResolver;
