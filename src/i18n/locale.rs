//! LocaleKey: normalized language(+region) identifier.
//!
//! Translation tables are keyed by `LocaleKey`. Two keys can be compared either
//! exactly (`en-GB == en-GB`) or by language only (`en-GB` matches `en-US`),
//! which is what the resolver's second stage relies on.

use crate::error::{LocalizeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A normalized locale identifier such as `en` or `en-GB`.
///
/// The language subtag is stored lowercase and the region uppercase, so
/// `EN_gb`, `en-GB` and `en_GB` all produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocaleKey {
    language: String,
    region: Option<String>,
}

impl LocaleKey {
    /// Create a locale from separate subtags.
    ///
    /// # Arguments
    /// * `language` - ISO 639 language code, 2 or 3 letters (e.g., "en", "da")
    /// * `region` - Optional ISO 3166 region, 2 letters or 3 digits (e.g., "GB", "419")
    ///
    /// # Returns
    /// * `Ok(LocaleKey)` with normalized casing
    /// * `Err(LocalizeError::InvalidLocale)` if either subtag is malformed
    pub fn new(language: &str, region: Option<&str>) -> Result<Self> {
        let invalid = || {
            LocalizeError::InvalidLocale(match region {
                Some(r) => format!("{}-{}", language, r),
                None => language.to_string(),
            })
        };

        if !is_language_subtag(language) {
            return Err(invalid());
        }

        let region = match region {
            Some(r) if is_region_subtag(r) => Some(r.to_ascii_uppercase()),
            Some(_) => return Err(invalid()),
            None => None,
        };

        Ok(Self {
            language: language.to_ascii_lowercase(),
            region,
        })
    }

    /// Parse a locale string.
    ///
    /// Accepts `-` or `_` as separator, ignores a POSIX encoding or modifier
    /// suffix (`en_US.UTF-8`, `de_DE@euro`) and drops a script subtag
    /// (`zh-Hant-TW` becomes `zh-TW`).
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let base = trimmed
            .split(['.', '@'])
            .next()
            .unwrap_or_default();

        let parts: Vec<&str> = base.split(['-', '_']).collect();
        match parts.as_slice() {
            [language] => Self::new(language, None),
            [language, region] => Self::new(language, Some(region)),
            [language, script, region] if is_script_subtag(script) => {
                Self::new(language, Some(region))
            }
            _ => Err(LocalizeError::InvalidLocale(trimmed.to_string())),
        }
    }

    /// The lowercase language subtag (e.g., "en").
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The uppercase region subtag, if any (e.g., "GB").
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Check whether both keys share a language subtag, ignoring region.
    pub fn matches_language(&self, other: &LocaleKey) -> bool {
        self.language == other.language
    }
}

fn is_language_subtag(s: &str) -> bool {
    (2..=3).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_region_subtag(s: &str) -> bool {
    (s.len() == 2 && s.chars().all(|c| c.is_ascii_alphabetic()))
        || (s.len() == 3 && s.chars().all(|c| c.is_ascii_digit()))
}

fn is_script_subtag(s: &str) -> bool {
    s.len() == 4 && s.chars().all(|c| c.is_ascii_alphabetic())
}

/// British English, used when neither the bundle nor the caller names a
/// default language.
impl Default for LocaleKey {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            region: Some("GB".to_string()),
        }
    }
}

impl fmt::Display for LocaleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}-{}", self.language, region),
            None => f.write_str(&self.language),
        }
    }
}

impl FromStr for LocaleKey {
    type Err = LocalizeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LocaleKey {
    type Error = LocalizeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<LocaleKey> for String {
    fn from(locale: LocaleKey) -> Self {
        locale.to_string()
    }
}
