//! Bundled translation assets.
//!
//! Assets ship with the application as `translations_<index>_<locale>.json`
//! files, optionally accompanied by `defaultLanguage.txt` holding the file
//! name of the default translation. They are the oldest version of every
//! language and only become visible when the network table is empty.

use crate::error::Result;
use crate::i18n::{LocaleKey, TranslationDocument, TranslationTable};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

pub const DEFAULT_LANGUAGE_FILE: &str = "defaultLanguage.txt";

static FILE_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn file_name_regex() -> &'static Regex {
    FILE_NAME_REGEX.get_or_init(|| {
        Regex::new(r"^translations_(\d+)_([A-Za-z]{2}[-_][A-Za-z]{2})\.json$")
            .expect("asset file name regex is valid")
    })
}

/// Translations loaded from the asset directory.
#[derive(Debug, Clone, Default)]
pub struct AssetBundle {
    /// Documents in ascending file index order
    pub table: TranslationTable,
    /// Locale of the file named in `defaultLanguage.txt`, if any
    pub default_locale: Option<LocaleKey>,
}

/// Parse an asset file name into its index and locale.
///
/// # Returns
/// `None` if the name does not follow `translations_<index>_<locale>.json`.
pub fn parse_asset_file_name(name: &str) -> Option<(u64, LocaleKey)> {
    let captures = file_name_regex().captures(name)?;
    let index = captures[1].parse().ok()?;
    let locale = LocaleKey::parse(&captures[2]).ok()?;
    Some((index, locale))
}

/// Load every translation asset from `dir`.
///
/// Files that do not match the naming scheme are ignored; matching files
/// that cannot be read or are not JSON objects are skipped with a warning.
/// A missing directory yields an empty bundle.
pub fn load_asset_bundle(dir: impl AsRef<Path>) -> Result<AssetBundle> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        warn!("Asset directory {} not found, no bundled translations", dir.display());
        return Ok(AssetBundle::default());
    }

    let default_file = fs::read_to_string(dir.join(DEFAULT_LANGUAGE_FILE))
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty());

    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with("translations") {
            continue;
        }
        match parse_asset_file_name(&name) {
            Some((index, locale)) => candidates.push((index, locale, name)),
            None => debug!("Ignoring asset file {}", name),
        }
    }
    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.cmp(&b.2)));

    let mut bundle = AssetBundle::default();
    for (_, locale, name) in candidates {
        let document = match fs::read_to_string(dir.join(&name))
            .map_err(Into::into)
            .and_then(|text| TranslationDocument::from_json_str(&text))
        {
            Ok(document) => document,
            Err(e) => {
                warn!("Skipping asset {}: {}", name, e);
                continue;
            }
        };

        if default_file.as_deref() == Some(name.as_str()) {
            bundle.default_locale = Some(locale.clone());
        }
        bundle.table.insert(locale, document);
    }

    info!(
        "Loaded {} bundled translations from {} (default: {})",
        bundle.table.len(),
        dir.display(),
        bundle
            .default_locale
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "none".to_string())
    );

    Ok(bundle)
}
