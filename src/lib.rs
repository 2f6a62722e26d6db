//! Client-side localization engine.
//!
//! Fetches translation documents from a localization service, persists them
//! in a key-value store, falls back to bundled assets, resolves the best
//! available language for the device and exposes flat `section_key`
//! lookups. See [`engine::Engine`] for the entry point.

pub mod assets;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod i18n;
pub mod network;
pub mod retry;
pub mod settings;
pub mod updater;

pub use engine::{Engine, EngineBuilder, SharedEngine};
pub use error::{LocalizeError, Result};
pub use updater::{UpdateOutcome, Updater};
