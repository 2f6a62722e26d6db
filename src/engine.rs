//! The translation engine: one owner for the tables, the active locale and
//! the listener registries.
//!
//! An [`Engine`] is only obtainable from [`EngineBuilder::build`], which loads
//! the persisted network cache and selects the initial language, so every
//! query runs against loaded state.
//!
//! Setting the active language always goes through resolution: the
//! requested locale may be kept (exact or language-code match) or degraded to
//! the default or first available locale. The flat lookup table is rebuilt
//! from the chosen document and language listeners are notified.

use crate::assets::AssetBundle;
use crate::cache::{KeyValueStore, MemoryStore, TranslationCache};
use crate::error::{LocalizeError, Result};
use crate::i18n::resolver::resolve;
use crate::i18n::{
    flatten, FlatTranslation, LanguageNotifier, ListenerId, LocaleKey, MatchStage,
    TranslationDocument, TranslationMetrics, TranslationStore,
};
use crate::network::AppUpdate;
use crate::settings::{AppInfo, UpdateSettings};
use crate::updater::{FetchedUpdate, RefreshState, UpdateOutcome, Updater};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Configures and loads an [`Engine`].
pub struct EngineBuilder {
    locale: Option<LocaleKey>,
    default_locale: LocaleKey,
    assets: AssetBundle,
    store: Box<dyn KeyValueStore>,
    app: AppInfo,
    auto_change_language: bool,
    notifier: LanguageNotifier,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            locale: None,
            default_locale: LocaleKey::default(),
            assets: AssetBundle::default(),
            store: Box::new(MemoryStore::new()),
            app: AppInfo::default(),
            auto_change_language: false,
            notifier: LanguageNotifier::new(),
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Language to select on build; the default language when unset.
    pub fn locale(mut self, locale: LocaleKey) -> Self {
        self.locale = Some(locale);
        self
    }

    /// Default language used when the asset bundle does not name one.
    pub fn default_locale(mut self, locale: LocaleKey) -> Self {
        self.default_locale = locale;
        self
    }

    pub fn assets(mut self, bundle: AssetBundle) -> Self {
        self.assets = bundle;
        self
    }

    /// Persistent store for fetched translations and update settings.
    pub fn store(mut self, store: impl KeyValueStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn app_info(mut self, app: AppInfo) -> Self {
        self.app = app;
        self
    }

    /// Follow device locale changes reported through
    /// [`Engine::on_device_locale_changed`].
    pub fn auto_change_language(mut self, enabled: bool) -> Self {
        self.auto_change_language = enabled;
        self
    }

    /// Register a language listener before the initial selection fires.
    pub fn on_language_changed<F>(mut self, listener: F) -> Self
    where
        F: FnMut(&LocaleKey) + Send + 'static,
    {
        self.notifier.add_language_listener(listener);
        self
    }

    /// Register a languages listener before the initial load fires.
    pub fn on_languages_changed<F>(mut self, listener: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.notifier.add_languages_listener(listener);
        self
    }

    /// Load the persisted network cache and select the initial language.
    pub fn build(self) -> Engine {
        let cache = TranslationCache::new(self.store);
        let network = cache.load_translations();
        let default_locale = self.assets.default_locale.unwrap_or(self.default_locale);
        let requested = self.locale.unwrap_or_else(|| default_locale.clone());

        info!(
            "Loaded translations: {} cached, {} bundled, default language {}",
            network.len(),
            self.assets.table.len(),
            default_locale
        );

        let mut engine = Engine {
            store: TranslationStore::new(network, self.assets.table),
            cache,
            app: self.app,
            active: requested.clone(),
            default_locale,
            flat: FlatTranslation::new(),
            notifier: self.notifier,
            metrics: TranslationMetrics::new(),
            auto_change_language: self.auto_change_language,
        };

        engine.notifier.notify_languages_changed();
        engine.select(&requested);
        engine
    }
}

/// Owns the translation tables, the active locale and its flat lookup
/// table, the listener registries and the persisted cache.
pub struct Engine {
    store: TranslationStore,
    cache: TranslationCache<Box<dyn KeyValueStore>>,
    app: AppInfo,
    active: LocaleKey,
    default_locale: LocaleKey,
    flat: FlatTranslation,
    notifier: LanguageNotifier,
    metrics: TranslationMetrics,
    auto_change_language: bool,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    // ==================== Queries ====================

    /// The active locale.
    pub fn language(&self) -> &LocaleKey {
        &self.active
    }

    pub fn default_language(&self) -> &LocaleKey {
        &self.default_locale
    }

    /// Locales of the effective table, in table order.
    pub fn available_languages(&self) -> Vec<LocaleKey> {
        self.store.available_locales()
    }

    pub fn store(&self) -> &TranslationStore {
        &self.store
    }

    /// Flat lookup table of the active document.
    pub fn translations(&self) -> &FlatTranslation {
        &self.flat
    }

    /// Whether `key` (optionally brace-wrapped) exists in the active table.
    pub fn has_key(&self, key: &str) -> bool {
        self.flat.has_key(key)
    }

    /// Look up a flattened key (`section_key`, optionally `{section_key}`).
    pub fn get_translation(&self, key: &str) -> Option<&str> {
        let value = self.flat.lookup(key);
        self.metrics.record_lookup(value.is_some());
        if value.is_none() {
            debug!("No translation for key {} in {}", key, self.active);
        }
        value
    }

    pub fn metrics(&self) -> &TranslationMetrics {
        &self.metrics
    }

    /// When translations were last written to the persisted cache.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.cache.last_updated()
    }

    pub fn auto_change_language(&self) -> bool {
        self.auto_change_language
    }

    pub fn set_auto_change_language(&mut self, enabled: bool) {
        self.auto_change_language = enabled;
    }

    // ==================== Selection ====================

    /// Select `locale` as the active language.
    ///
    /// # Returns
    /// The stage that matched, or `None` when no translations exist at all
    /// (the locale is still recorded as active).
    pub fn set_language(&mut self, locale: LocaleKey) -> Option<MatchStage> {
        self.select(&locale).map(|(_, stage)| stage)
    }

    /// Like [`set_language`](Self::set_language) for strings such as
    /// `en_GB` or `en-GB`.
    pub fn set_language_by_str(&mut self, locale: &str) -> Result<Option<MatchStage>> {
        let locale = LocaleKey::parse(locale)?;
        Ok(self.set_language(locale))
    }

    /// Resolve `requested` and make the outcome active.
    ///
    /// This is a selection, not a read: the active locale changes to
    /// `requested` or to whatever the fallback chain settled on, and language
    /// listeners are notified.
    pub fn resolve(&mut self, requested: &LocaleKey) -> Option<&TranslationDocument> {
        let (matched, _) = self.select(requested)?;
        self.store.effective_table().get(&matched)
    }

    /// React to the platform reporting a new device locale.
    ///
    /// # Returns
    /// `true` if the active language was changed.
    pub fn on_device_locale_changed(&mut self, locale: LocaleKey) -> bool {
        if !self.auto_change_language {
            debug!("Device locale changed to {}, auto change disabled", locale);
            return false;
        }
        info!("Device locale changed to {}, switching language", locale);
        self.select(&locale);
        true
    }

    /// Run resolution, rebuild the flat table and notify.
    ///
    /// Returns the matched table key and stage.
    fn select(&mut self, requested: &LocaleKey) -> Option<(LocaleKey, MatchStage)> {
        let Some(resolution) = resolve(
            self.store.effective_table(),
            requested,
            &self.default_locale,
        ) else {
            self.active = requested.clone();
            self.flat = FlatTranslation::new();
            return None;
        };

        let flat = flatten(resolution.document);
        let matched = resolution.matched.clone();
        let stage = resolution.stage;
        let active = resolution.locale;

        if stage.is_fallback() {
            self.metrics.record_fallback();
        }
        debug!(
            "Selected {} (matched {} via {:?}, {} keys)",
            active,
            matched,
            stage,
            flat.len()
        );

        self.active = active;
        self.flat = flat;
        self.notifier.notify_language_changed(&self.active);
        Some((matched, stage))
    }

    // ==================== Listeners ====================

    pub fn add_language_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&LocaleKey) + Send + 'static,
    {
        self.notifier.add_language_listener(listener)
    }

    pub fn remove_language_listener(&mut self, id: ListenerId) -> bool {
        self.notifier.remove_language_listener(id)
    }

    pub fn add_languages_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut() + Send + 'static,
    {
        self.notifier.add_languages_listener(listener)
    }

    pub fn remove_languages_listener(&mut self, id: ListenerId) -> bool {
        self.notifier.remove_languages_listener(id)
    }

    // ==================== Updates ====================

    /// Swap in a new bundled asset table and reselect the active language.
    pub fn replace_asset_table(&mut self, bundle: AssetBundle) {
        if let Some(default_locale) = bundle.default_locale {
            self.default_locale = default_locale;
        }
        self.store.replace_assets(bundle.table);
        self.notifier.notify_languages_changed();
        let requested = self.active.clone();
        self.select(&requested);
    }

    /// Device metadata for the next update check.
    pub fn update_settings(&mut self) -> UpdateSettings {
        UpdateSettings::load(self.cache.store_mut(), &self.app)
    }

    /// Apply a successful update check.
    ///
    /// Fetched documents are written and persisted first. Then the default
    /// locale is taken from the last `is_default` entry and the active
    /// locale from the last `is_best_fit` entry. Resolution runs once at the
    /// end, so a refresh emits at most one language notification.
    pub fn apply_update(&mut self, fetched: FetchedUpdate) -> AppUpdate {
        let FetchedUpdate {
            update,
            documents,
            failures,
        } = fetched;

        for _ in 0..failures {
            self.metrics.record_fetch_failure();
        }

        let written = documents.len();
        for (locale, document) in documents {
            if let Err(e) = self
                .cache
                .save_translation(&locale, &document.to_json_string())
            {
                warn!("Failed to persist translations for {}: {}", locale, e);
            }
            self.store.write_network(locale, document);
            self.metrics.record_document_fetched();
        }

        let mut best_fit = None;
        for entry in &update.localize {
            if entry.language.is_default {
                self.default_locale = entry.language.locale.clone();
            }
            if entry.language.is_best_fit {
                best_fit = Some(entry.language.locale.clone());
            }
        }

        if written > 0 {
            self.notifier.notify_languages_changed();
        }

        if written > 0 || best_fit.is_some() {
            let requested = best_fit.unwrap_or_else(|| self.active.clone());
            self.select(&requested);
        }

        info!(
            "Applied translation update: {} documents written, default {}, active {}",
            written, self.default_locale, self.active
        );
        update
    }

    /// Check for updates and apply them.
    pub async fn refresh(&mut self, updater: &Updater) -> UpdateOutcome {
        let settings = self.update_settings();
        let locale = self.active.clone();
        let result = updater.check(&locale, &settings).await;
        self.finish_refresh(result)
    }

    fn finish_refresh(&mut self, result: Result<FetchedUpdate>) -> UpdateOutcome {
        match result {
            Ok(fetched) => UpdateOutcome::Success(self.apply_update(fetched)),
            Err(LocalizeError::NoConnectivity) => UpdateOutcome::NoConnectivity,
            Err(e) => {
                warn!("Translation update failed, keeping current translations: {}", e);
                UpdateOutcome::Failure(e)
            }
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("active", &self.active)
            .field("default_locale", &self.default_locale)
            .field("store", &self.store)
            .field("keys", &self.flat.len())
            .field("notifier", &self.notifier)
            .field("auto_change_language", &self.auto_change_language)
            .finish_non_exhaustive()
    }
}

/// An [`Engine`] shared between tasks, with single-flight refreshes.
///
/// The network phase of a refresh runs without holding the engine lock, so
/// queries stay responsive. Only one refresh may be in flight; a second one
/// is rejected with [`LocalizeError::RefreshInFlight`].
#[derive(Clone)]
pub struct SharedEngine {
    engine: Arc<Mutex<Engine>>,
    state: Arc<StdMutex<RefreshState>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            state: Arc::new(StdMutex::new(RefreshState::Idle)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().await
    }

    pub fn refresh_state(&self) -> RefreshState {
        *lock_state(&self.state)
    }

    /// Check for updates and apply them.
    ///
    /// # Errors
    /// [`LocalizeError::RefreshInFlight`] if another refresh has not finished.
    /// Every other failure is reported through the outcome.
    pub async fn refresh(&self, updater: &Updater) -> Result<UpdateOutcome> {
        let flight = self.begin_refresh()?;

        let (locale, settings) = {
            let mut engine = self.engine.lock().await;
            let settings = engine.update_settings();
            (engine.language().clone(), settings)
        };

        let result = updater.check(&locale, &settings).await;

        if result.is_ok() {
            flight.set(RefreshState::Applying);
        }
        let mut engine = self.engine.lock().await;
        Ok(engine.finish_refresh(result))
    }

    fn begin_refresh(&self) -> Result<RefreshFlight> {
        let mut state = lock_state(&self.state);
        if *state != RefreshState::Idle {
            debug!("Rejecting refresh, state is {:?}", *state);
            return Err(LocalizeError::RefreshInFlight);
        }
        *state = RefreshState::Requesting;
        Ok(RefreshFlight {
            state: Arc::clone(&self.state),
        })
    }
}

impl fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEngine")
            .field("refresh_state", &self.refresh_state())
            .finish_non_exhaustive()
    }
}

fn lock_state(state: &StdMutex<RefreshState>) -> StdMutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a refresh in flight; returns the state to idle when dropped,
/// including when the refresh future is cancelled.
struct RefreshFlight {
    state: Arc<StdMutex<RefreshState>>,
}

impl RefreshFlight {
    fn set(&self, next: RefreshState) {
        *lock_state(&self.state) = next;
    }
}

impl Drop for RefreshFlight {
    fn drop(&mut self) {
        self.set(RefreshState::Idle);
    }
}
