//! Locale resolution with deterministic fallback.
//!
//! Given a requested locale, the default locale and the effective table, find
//! the document to activate:
//!
//! 1. exact key match
//! 2. first locale (table order) sharing the language subtag
//! 3. the same two searches for the default locale, unless it was the request
//! 4. the first available locale
//!
//! Stages 3 and 4 mean the requested language is unobtainable; the returned
//! [`Resolution::locale`] then names the locale the active selection must
//! degrade to. Resolution only fails when the table is empty.

use crate::i18n::{LocaleKey, TranslationDocument, TranslationTable};
use tracing::{debug, warn};

/// Which fallback stage produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    Exact,
    LanguageCode,
    DefaultLocale,
    FirstAvailable,
}

impl MatchStage {
    /// Whether the active locale has to change away from the request.
    pub fn is_fallback(&self) -> bool {
        matches!(self, MatchStage::DefaultLocale | MatchStage::FirstAvailable)
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
    /// The locale the active selection should hold afterwards.
    pub locale: LocaleKey,
    /// The table key whose document was chosen.
    pub matched: &'a LocaleKey,
    pub document: &'a TranslationDocument,
    pub stage: MatchStage,
}

/// Resolve `requested` against `table`, falling back through `default`.
///
/// Returns `None` only when `table` is empty.
pub fn resolve<'a>(
    table: &'a TranslationTable,
    requested: &LocaleKey,
    default: &LocaleKey,
) -> Option<Resolution<'a>> {
    debug!("Resolving translations for {}", requested);

    if let Some((matched, document, stage)) = search(table, requested) {
        return Some(Resolution {
            locale: requested.clone(),
            matched,
            document,
            stage,
        });
    }

    if default != requested {
        warn!(
            "No translations for {}, trying default language {}",
            requested, default
        );
        if let Some((matched, document, _)) = search(table, default) {
            return Some(Resolution {
                locale: default.clone(),
                matched,
                document,
                stage: MatchStage::DefaultLocale,
            });
        }
    }

    let Some((first, document)) = table.iter().next() else {
        warn!("No translations available at all, cannot resolve {}", requested);
        return None;
    };

    warn!(
        "Default language {} unavailable, using first available language {}",
        default, first
    );
    Some(Resolution {
        locale: first.clone(),
        matched: first,
        document,
        stage: MatchStage::FirstAvailable,
    })
}

/// Exact match, then language-code match in table order.
fn search<'a>(
    table: &'a TranslationTable,
    locale: &LocaleKey,
) -> Option<(&'a LocaleKey, &'a TranslationDocument, MatchStage)> {
    if let Some((key, document)) = table.iter().find(|(key, _)| *key == locale) {
        return Some((key, document, MatchStage::Exact));
    }

    table
        .iter()
        .find(|(key, _)| key.matches_language(locale))
        .map(|(key, document)| (key, document, MatchStage::LanguageCode))
}
