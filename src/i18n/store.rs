//! Translation tables and the network-over-asset store.
//!
//! Two locale-keyed tables exist: the network table (fetched documents and
//! their persisted copies) and the asset table (bundled fallback). The
//! effective table is the network table when it has any entry, otherwise the
//! asset table. The two are never merged per key.

use crate::error::{LocalizeError, Result};
use crate::i18n::LocaleKey;
use serde_json::{Map, Value};

/// One locale's raw nested translation payload.
///
/// Top-level keys are section names; sections map leaf keys to values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslationDocument(Map<String, Value>);

impl TranslationDocument {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parse a document from its stored JSON text.
    ///
    /// The text must be a JSON object; anything else is a parse failure.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::try_from(value)
    }

    /// The document as compact JSON text, as written to the persisted cache.
    pub fn to_json_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    pub fn sections(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Value> for TranslationDocument {
    type Error = LocalizeError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(LocalizeError::Parse(format!(
                "translation document must be an object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Mapping from locale to document that remembers insertion order.
///
/// Iteration order is the order locales were first inserted; replacing the
/// document of an existing locale keeps its position. This order decides
/// which regional variant wins a language-code match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationTable {
    entries: Vec<(LocaleKey, TranslationDocument)>,
}

impl TranslationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the document for `locale`.
    ///
    /// # Returns
    /// The previous document if the locale was already present.
    pub fn insert(
        &mut self,
        locale: LocaleKey,
        document: TranslationDocument,
    ) -> Option<TranslationDocument> {
        match self.entries.iter_mut().find(|(key, _)| *key == locale) {
            Some((_, slot)) => Some(std::mem::replace(slot, document)),
            None => {
                self.entries.push((locale, document));
                None
            }
        }
    }

    pub fn get(&self, locale: &LocaleKey) -> Option<&TranslationDocument> {
        self.entries
            .iter()
            .find(|(key, _)| key == locale)
            .map(|(_, document)| document)
    }

    pub fn contains(&self, locale: &LocaleKey) -> bool {
        self.get(locale).is_some()
    }

    pub fn locales(&self) -> impl Iterator<Item = &LocaleKey> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LocaleKey, &TranslationDocument)> {
        self.entries.iter().map(|(key, document)| (key, document))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(LocaleKey, TranslationDocument)> for TranslationTable {
    fn from_iter<I: IntoIterator<Item = (LocaleKey, TranslationDocument)>>(iter: I) -> Self {
        let mut table = TranslationTable::new();
        for (locale, document) in iter {
            table.insert(locale, document);
        }
        table
    }
}

/// Holds the network and asset tables and decides which one is visible.
#[derive(Debug, Clone, Default)]
pub struct TranslationStore {
    network: TranslationTable,
    assets: TranslationTable,
}

impl TranslationStore {
    pub fn new(network: TranslationTable, assets: TranslationTable) -> Self {
        Self { network, assets }
    }

    /// The table used for lookups: network if non-empty, else assets.
    pub fn effective_table(&self) -> &TranslationTable {
        if self.network.is_empty() {
            &self.assets
        } else {
            &self.network
        }
    }

    /// Locales of the effective table, in table order.
    pub fn available_locales(&self) -> Vec<LocaleKey> {
        self.effective_table().locales().cloned().collect()
    }

    /// Write a freshly fetched document into the network table.
    ///
    /// Does not re-run resolution; the caller decides when to do that.
    pub fn write_network(&mut self, locale: LocaleKey, document: TranslationDocument) {
        self.network.insert(locale, document);
    }

    pub fn replace_assets(&mut self, table: TranslationTable) {
        self.assets = table;
    }

    pub fn network(&self) -> &TranslationTable {
        &self.network
    }

    pub fn assets(&self) -> &TranslationTable {
        &self.assets
    }
}
