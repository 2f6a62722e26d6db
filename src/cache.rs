//! Persisted translation cache.
//!
//! The on-device key-value store is an external collaborator; this module
//! defines its boundary ([`KeyValueStore`]), two implementations (in-memory
//! and a JSON file), and the layout translations are stored in:
//!
//! - `localize_translations_<locale>` → raw translation document text
//! - `localize_last_updated` → timestamp of the last successful write

use crate::error::{LocalizeError, Result};
use crate::i18n::{LocaleKey, TranslationDocument, TranslationTable};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const TRANSLATION_KEY_PREFIX: &str = "localize_translations_";
pub const LAST_UPDATED_KEY: &str = "localize_last_updated";

/// Wire and storage timestamp format (e.g. `2024-01-15T10:30:00+0000`)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp, accepting RFC 3339 as well.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// String key-value storage owned by the host application.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// All entries whose key starts with `prefix`, in key order.
    fn entries_with_prefix(&self, prefix: &str) -> Vec<(String, String)>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn entries_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        (**self).entries_with_prefix(prefix)
    }
}

fn prefixed(entries: &BTreeMap<String, String>, prefix: &str) -> Vec<(String, String)> {
    entries
        .range(prefix.to_string()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Volatile store, useful for tests and for hosts without persistence.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn entries_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        prefixed(&self.entries, prefix)
    }
}

/// Store backed by a single JSON object on disk.
///
/// The whole file is rewritten on every `set`, through a temporary file and
/// a rename so a crash never leaves a half-written cache behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    ///
    /// A file that is not a JSON object of strings is renamed to
    /// `<path>.corrupt` and the store starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries: BTreeMap<String, String> = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                match serde_json::from_str(&text) {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!("{} is not a valid cache, starting empty: {}", path.display(), e);
                        set_aside(&path);
                        BTreeMap::new()
                    }
                }
            }
        } else {
            BTreeMap::new()
        };

        debug!("Opened cache {} with {} entries", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let text = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| LocalizeError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let previous = self.entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush() {
            // Memory must not run ahead of the file
            match previous {
                Some(previous) => self.entries.insert(key.to_string(), previous),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn entries_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        prefixed(&self.entries, prefix)
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}

/// Keep an unreadable cache for inspection instead of overwriting it.
fn set_aside(path: &Path) {
    let target = corrupt_path(path);
    match fs::rename(path, &target) {
        Ok(()) => warn!("Moved unreadable cache to {}", target.display()),
        Err(e) => warn!("Failed to move unreadable cache {}: {}", path.display(), e),
    }
}

/// Reads and writes the network translation table in a [`KeyValueStore`].
#[derive(Debug)]
pub struct TranslationCache<S> {
    store: S,
}

impl<S: KeyValueStore> TranslationCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Load every persisted document, in store key order.
    ///
    /// Entries whose locale or JSON cannot be parsed are skipped.
    pub fn load_translations(&self) -> TranslationTable {
        let mut table = TranslationTable::new();

        for (key, text) in self.store.entries_with_prefix(TRANSLATION_KEY_PREFIX) {
            let suffix = &key[TRANSLATION_KEY_PREFIX.len()..];
            let locale = match LocaleKey::parse(suffix) {
                Ok(locale) => locale,
                Err(e) => {
                    warn!("Skipping cached translations under {}: {}", key, e);
                    continue;
                }
            };

            match TranslationDocument::from_json_str(&text) {
                Ok(document) => {
                    table.insert(locale, document);
                }
                Err(e) => warn!("Skipping unreadable cached translations for {}: {}", locale, e),
            }
        }

        debug!("Loaded {} cached translation documents", table.len());
        table
    }

    /// Persist a document's raw text and stamp the update time.
    pub fn save_translation(&mut self, locale: &LocaleKey, text: &str) -> Result<()> {
        self.store
            .set(&format!("{}{}", TRANSLATION_KEY_PREFIX, locale), text)?;
        self.set_last_updated(&Utc::now())
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.store
            .get(LAST_UPDATED_KEY)
            .filter(|text| !text.is_empty())
            .and_then(|text| parse_timestamp(&text))
    }

    pub fn set_last_updated(&mut self, at: &DateTime<Utc>) -> Result<()> {
        self.store.set(LAST_UPDATED_KEY, &format_timestamp(at))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn locale(s: &str) -> LocaleKey {
        LocaleKey::parse(s).unwrap()
    }

    // ==================== Timestamp Tests ====================

    #[test]
    fn test_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(format_timestamp(&at), "2024-01-15T10:30:00+0000");
        assert_eq!(parse_timestamp("2024-01-15T10:30:00+0000"), Some(at));
    }

    #[test]
    fn test_parse_timestamp_accepts_rfc3339() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-15T11:30:00+01:00"), Some(at));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    // ==================== MemoryStore Tests ====================

    #[test]
    fn test_memory_store_prefix_scan() {
        let mut store = MemoryStore::new();
        store.set("b_2", "two").unwrap();
        store.set("a_1", "one").unwrap();
        store.set("b_1", "one").unwrap();
        store.set("c", "x").unwrap();

        let entries = store.entries_with_prefix("b_");
        assert_eq!(
            entries,
            vec![
                ("b_1".to_string(), "one".to_string()),
                ("b_2".to_string(), "two".to_string())
            ]
        );
        assert_eq!(store.get("a_1"), Some("one".to_string()));
        assert_eq!(store.get("missing"), None);
    }

    // ==================== FileStore Tests ====================

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set("greeting", "hello").unwrap();
        assert!(path.exists());

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("greeting"), Some("hello".to_string()));
        assert_eq!(reopened.path(), path.as_path());
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("cache.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set("k", "v").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_file_store_empty_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.entries_with_prefix("").is_empty());
    }

    #[test]
    fn test_file_store_sets_aside_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "[not, an, object").unwrap();

        let mut store = FileStore::open(&path).unwrap();
        assert!(store.entries_with_prefix("").is_empty());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("cache.json.corrupt")).unwrap(),
            "[not, an, object"
        );

        store.set("a", "1").unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("a").as_deref(), Some("1"));
    }

    #[test]
    fn test_file_store_failed_write_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut store = FileStore::open(&path).unwrap();
        store.set("kept", "old").unwrap();

        // A regular file where the cache's parent directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        store.path = blocker.join("cache.json");

        assert!(store.set("kept", "new").is_err());
        assert!(store.set("added", "1").is_err());
        assert_eq!(store.get("kept").as_deref(), Some("old"));
        assert_eq!(store.get("added"), None);
    }

    // ==================== TranslationCache Tests ====================

    #[test]
    fn test_save_and_load_translations() {
        let mut cache = TranslationCache::new(MemoryStore::new());
        cache
            .save_translation(&locale("da-DK"), r#"{"general":{"ok":"OK"}}"#)
            .unwrap();
        cache
            .save_translation(&locale("en-GB"), r#"{"general":{"ok":"Okay"}}"#)
            .unwrap();

        let table = cache.load_translations();
        let order: Vec<String> = table.locales().map(|l| l.to_string()).collect();
        assert_eq!(order, vec!["da-DK", "en-GB"]);
        assert_eq!(
            cache.store().get("localize_translations_da-DK"),
            Some(r#"{"general":{"ok":"OK"}}"#.to_string())
        );
    }

    #[test]
    fn test_save_translation_stamps_last_updated() {
        let mut cache = TranslationCache::new(MemoryStore::new());
        assert!(cache.last_updated().is_none());

        let before = Utc::now() - chrono::Duration::seconds(1);
        cache.save_translation(&locale("da-DK"), "{}").unwrap();

        let stamped = cache.last_updated().expect("timestamp recorded");
        assert!(stamped >= before);
    }

    #[test]
    fn test_load_skips_bad_entries() {
        let mut store = MemoryStore::new();
        store
            .set("localize_translations_not-a-locale", "{}")
            .unwrap();
        store.set("localize_translations_fr-FR", "{broken").unwrap();
        store.set("localize_translations_de-DE", "[]").unwrap();
        store
            .set("localize_translations_sv-SE", r#"{"a":{"b":"c"}}"#)
            .unwrap();

        let cache = TranslationCache::new(store);
        let table = cache.load_translations();

        assert_eq!(table.len(), 1);
        assert!(table.contains(&locale("sv-SE")));
    }

    #[test]
    fn test_underscore_locale_keys_are_accepted() {
        let mut store = MemoryStore::new();
        store.set("localize_translations_en_GB", "{}").unwrap();

        let table = TranslationCache::new(store).load_translations();
        assert!(table.contains(&locale("en-GB")));
    }

    #[test]
    fn test_boxed_store_works_through_cache() {
        let boxed: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        let mut cache = TranslationCache::new(boxed);
        cache.save_translation(&locale("nb-NO"), "{}").unwrap();
        assert_eq!(cache.load_translations().len(), 1);
    }
}
