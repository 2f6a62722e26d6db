//! Flattening of section/key documents into a single key space.
//!
//! A document such as `{"general": {"ok": "OK"}}` becomes the flat key
//! `general_ok`. Only object-valued top-level entries are sections; scalar
//! top-level values are not part of the translation payload and are dropped.
//!
//! Underscores in section or key names are not escaped, so `{"a_b": {"c"}}`
//! and `{"a": {"b_c"}}` both produce `a_b_c`. When that happens the section
//! visited last (map order) wins.

use crate::i18n::TranslationDocument;
use serde_json::Value;
use std::collections::HashMap;

/// Flat `section_key -> value` table derived from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatTranslation {
    entries: HashMap<String, String>,
}

impl FlatTranslation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a flat key, stripping one layer of `{...}` decoration.
    ///
    /// `lookup("{general_ok}")` and `lookup("general_ok")` are equivalent.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(clean_key(key)).map(String::as_str)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build a fresh flat table from `document`.
pub fn flatten(document: &TranslationDocument) -> FlatTranslation {
    let mut entries = HashMap::new();

    for (section_name, section) in document.sections() {
        let Value::Object(section) = section else {
            continue;
        };

        for (key, value) in section {
            if let Some(text) = leaf_text(value) {
                entries.insert(format!("{}_{}", section_name, key), text);
            }
        }
    }

    FlatTranslation { entries }
}

/// Strings verbatim, other values as compact JSON, null dropped.
fn leaf_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Remove one pair of surrounding braces, if present.
pub fn clean_key(key: &str) -> &str {
    key.strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .unwrap_or(key)
}
