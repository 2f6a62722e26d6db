//! Update orchestration: the network half of a refresh.
//!
//! [`Updater::check`] gates on connectivity, asks the service for the
//! localization index and downloads every document flagged `should_update`.
//! Nothing is written here; the result is handed to
//! [`Engine::apply_update`](crate::engine::Engine::apply_update), which
//! updates the tables, default locale and active locale in one step.

use crate::error::{LocalizeError, Result};
use crate::i18n::{LocaleKey, TranslationDocument};
use crate::network::{AppUpdate, LocalizeEntry, UpdateClient};
use crate::settings::UpdateSettings;
use futures::future::join_all;
use std::fmt;
use tracing::{info, warn};

/// Reports whether the device can currently reach the network.
pub trait Connectivity: Send + Sync {
    fn is_connected(&self) -> bool;
}

impl<F> Connectivity for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_connected(&self) -> bool {
        self()
    }
}

/// For hosts that cannot tell whether they are online; every check is attempted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_connected(&self) -> bool {
        true
    }
}

/// Where a refresh currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    /// Waiting on the update check or document downloads
    Requesting,
    /// Writing fetched documents and re-resolving
    Applying,
}

/// Result of one refresh.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// Offline; no request was made and nothing changed
    NoConnectivity,
    /// The index was received and applied; carries the index itself
    Success(AppUpdate),
    /// The update check failed; nothing was applied
    Failure(LocalizeError),
}

impl UpdateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UpdateOutcome::Success(_))
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::NoConnectivity => write!(f, "no connectivity"),
            UpdateOutcome::Success(update) => {
                write!(f, "success ({} localization entries)", update.localize.len())
            }
            UpdateOutcome::Failure(e) => write!(f, "failure: {}", e),
        }
    }
}

/// Everything a successful check brought back, not yet applied.
#[derive(Debug, Clone)]
pub struct FetchedUpdate {
    pub update: AppUpdate,
    /// Downloaded documents in index order
    pub documents: Vec<(LocaleKey, TranslationDocument)>,
    /// Entries flagged `should_update` whose download failed
    pub failures: usize,
}

/// Runs the update check against the service.
pub struct Updater {
    client: UpdateClient,
    connectivity: Box<dyn Connectivity>,
}

impl Updater {
    pub fn new(client: UpdateClient) -> Self {
        Self {
            client,
            connectivity: Box::new(AlwaysOnline),
        }
    }

    pub fn with_connectivity(mut self, connectivity: impl Connectivity + 'static) -> Self {
        self.connectivity = Box::new(connectivity);
        self
    }

    /// Fetch the localization index and every stale document.
    ///
    /// # Errors
    /// [`LocalizeError::NoConnectivity`] when offline, or the update check's
    /// transport, status or parse error. A failed document download is
    /// logged and counted, never an error.
    pub async fn check(
        &self,
        locale: &LocaleKey,
        settings: &UpdateSettings,
    ) -> Result<FetchedUpdate> {
        if !self.connectivity.is_connected() {
            info!("Skipping translation update, device is offline");
            return Err(LocalizeError::NoConnectivity);
        }

        info!("Checking for translation updates (locale {})", locale);
        let update = self.client.post_update_check(settings, locale).await?;

        let stale: Vec<&LocalizeEntry> = update
            .localize
            .iter()
            .filter(|entry| entry.should_update)
            .collect();

        let results = join_all(
            stale
                .iter()
                .map(|entry| self.client.fetch_document(&entry.url)),
        )
        .await;

        let mut documents = Vec::with_capacity(stale.len());
        let mut failures = 0;
        for (entry, result) in stale.iter().zip(results) {
            match result {
                Ok(document) => documents.push((entry.language.locale.clone(), document)),
                Err(e) => {
                    warn!(
                        "Failed to fetch translations for {} from {}: {}",
                        entry.language.locale, entry.url, e
                    );
                    failures += 1;
                }
            }
        }

        info!(
            "Update check complete: {} entries, {} downloaded, {} failed",
            update.localize.len(),
            documents.len(),
            failures
        );

        Ok(FetchedUpdate {
            update,
            documents,
            failures,
        })
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
