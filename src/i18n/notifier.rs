//! Observer registries for language change events.
//!
//! Two independent registries exist: language listeners receive the new
//! active locale, languages listeners are told to re-read the available
//! languages. Registration returns a [`ListenerId`] handle used for removal;
//! entries live until removed. Registering the same closure twice yields two
//! handles and two deliveries.
//!
//! Dispatch is synchronous and in registration order. A listener that panics
//! is logged and skipped; delivery continues with the next one. Listeners
//! cannot reach the notifier while it dispatches, so the registry cannot
//! change mid-dispatch.

use crate::i18n::LocaleKey;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// Handle identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type LanguageCallback = Box<dyn FnMut(&LocaleKey) + Send>;
type LanguagesCallback = Box<dyn FnMut() + Send>;

#[derive(Default)]
pub struct LanguageNotifier {
    next_id: u64,
    language: Vec<(ListenerId, LanguageCallback)>,
    languages: Vec<(ListenerId, LanguagesCallback)>,
}

impl LanguageNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    /// Register a callback for active-language changes.
    pub fn add_language_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&LocaleKey) + Send + 'static,
    {
        let id = self.allocate_id();
        self.language.push((id, Box::new(listener)));
        id
    }

    /// Remove a language listener.
    ///
    /// # Returns
    /// `true` if the handle was registered.
    pub fn remove_language_listener(&mut self, id: ListenerId) -> bool {
        remove_entry(&mut self.language, id)
    }

    /// Register a callback for available-languages changes.
    pub fn add_languages_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut() + Send + 'static,
    {
        let id = self.allocate_id();
        self.languages.push((id, Box::new(listener)));
        id
    }

    pub fn remove_languages_listener(&mut self, id: ListenerId) -> bool {
        remove_entry(&mut self.languages, id)
    }

    /// Deliver `locale` to every language listener.
    ///
    /// # Returns
    /// The number of listeners that completed without panicking.
    pub fn notify_language_changed(&mut self, locale: &LocaleKey) -> usize {
        let mut delivered = 0;
        for (id, listener) in self.language.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(locale))) {
                Ok(()) => delivered += 1,
                Err(_) => error!("Language listener {:?} panicked on {}", id, locale),
            }
        }
        delivered
    }

    /// Tell every languages listener that the available set changed.
    pub fn notify_languages_changed(&mut self) -> usize {
        let mut delivered = 0;
        for (id, listener) in self.languages.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener())) {
                Ok(()) => delivered += 1,
                Err(_) => error!("Languages listener {:?} panicked", id),
            }
        }
        delivered
    }

    pub fn language_listener_count(&self) -> usize {
        self.language.len()
    }

    pub fn languages_listener_count(&self) -> usize {
        self.languages.len()
    }
}

fn remove_entry<F>(entries: &mut Vec<(ListenerId, F)>, id: ListenerId) -> bool {
    match entries.iter().position(|(entry_id, _)| *entry_id == id) {
        Some(index) => {
            entries.remove(index);
            true
        }
        None => false,
    }
}

impl fmt::Debug for LanguageNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageNotifier")
            .field("language_listeners", &self.language.len())
            .field("languages_listeners", &self.languages.len())
            .finish()
    }
}
