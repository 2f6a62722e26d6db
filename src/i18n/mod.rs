//! Translation resolution and caching core.
//!
//! # Architecture
//!
//! - `locale`: `LocaleKey`, the normalized language(+region) identifier
//! - `store`: network and asset tables, and which one is visible
//! - `resolver`: exact → language code → default → first available fallback
//! - `flatten`: section/key documents to a flat `section_key` table
//! - `notifier`: language / languages change listeners
//! - `metrics`: per-engine lookup and fetch counters
//!
//! # Example
//!
//! ```rust
//! use localize_engine::i18n::{flatten, LocaleKey, TranslationDocument, TranslationTable};
//! use localize_engine::i18n::resolver::resolve;
//!
//! let document = TranslationDocument::from_json_str(r#"{"general":{"ok":"OK"}}"#).unwrap();
//! let table: TranslationTable = vec![(LocaleKey::parse("en-US").unwrap(), document)]
//!     .into_iter()
//!     .collect();
//!
//! let requested = LocaleKey::parse("en-GB").unwrap();
//! let resolution = resolve(&table, &requested, &requested).unwrap();
//! let flat = flatten(resolution.document);
//! assert_eq!(flat.lookup("{general_ok}"), Some("OK"));
//! ```

mod flatten;
mod locale;
mod metrics;
mod notifier;
pub mod resolver;
mod store;

pub use flatten::{clean_key, flatten, FlatTranslation};
pub use locale::LocaleKey;
pub use metrics::{MetricsReport, TranslationMetrics};
pub use notifier::{LanguageNotifier, ListenerId};
pub use resolver::{MatchStage, Resolution};
pub use store::{TranslationDocument, TranslationStore, TranslationTable};
