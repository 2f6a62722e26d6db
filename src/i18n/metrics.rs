//! Translation metrics and observability module.
//!
//! Tracks how lookups and refreshes behave for one engine: key hits and
//! misses, documents fetched, fetch failures, and how often resolution had to
//! fall back away from the requested language.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters owned by an engine instance.
#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Lookups that found a value in the active flat table
    lookup_hits: AtomicUsize,

    /// Lookups for keys missing from the active flat table
    lookup_misses: AtomicUsize,

    /// Translation documents fetched and written to the network table
    documents_fetched: AtomicUsize,

    /// Translation document fetches that failed
    fetch_failures: AtomicUsize,

    /// Resolutions that ended on the default or first available locale
    resolution_fallbacks: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_lookup(&self, hit: bool) {
        let counter = if hit {
            &self.lookup_hits
        } else {
            &self.lookup_misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_document_fetched(&self) {
        self.documents_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.resolution_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let hits = self.lookup_hits.load(Ordering::Relaxed);
        let misses = self.lookup_misses.load(Ordering::Relaxed);
        let total_lookups = hits + misses;
        let lookup_hit_rate = if total_lookups > 0 {
            (hits as f64 / total_lookups as f64) * 100.0
        } else {
            0.0
        };

        let fetched = self.documents_fetched.load(Ordering::Relaxed);
        let failures = self.fetch_failures.load(Ordering::Relaxed);
        let attempts = fetched + failures;
        let fetch_success_rate = if attempts > 0 {
            (fetched as f64 / attempts as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            lookup_hits: hits,
            lookup_misses: misses,
            lookup_hit_rate,
            documents_fetched: fetched,
            fetch_failures: failures,
            fetch_success_rate,
            resolution_fallbacks: self.resolution_fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of an engine's translation statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub lookup_hits: usize,
    pub lookup_misses: usize,

    /// Lookup hit rate as a percentage (0-100)
    pub lookup_hit_rate: f64,

    pub documents_fetched: usize,
    pub fetch_failures: usize,

    /// Fetch success rate as a percentage (0-100)
    pub fetch_success_rate: f64,

    pub resolution_fallbacks: usize,
}

impl MetricsReport {
    /// Format the report as a human-readable summary.
    pub fn format_summary(&self) -> String {
        format!(
            "Lookups: {} hits, {} misses ({:.1}% hit rate)\n\
             Documents: {} fetched, {} failed ({:.1}% success rate)\n\
             Resolution fallbacks: {}",
            self.lookup_hits,
            self.lookup_misses,
            self.lookup_hit_rate,
            self.documents_fetched,
            self.fetch_failures,
            self.fetch_success_rate,
            self.resolution_fallbacks
        )
    }
}
