use crate::i18n::LocaleKey;
use crate::settings::AppInfo;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://nstack.io";

#[derive(Debug, Clone)]
pub struct Config {
    // Service
    pub base_url: String,
    pub app_id: String,
    pub api_key: String,
    pub dev: bool,
    pub http_timeout_secs: u64,

    // App metadata
    pub app_version: String,
    pub platform: String,

    // Languages
    pub locale: LocaleKey,
    pub default_locale: LocaleKey,
    pub auto_change_language: bool,

    // Storage
    pub assets_dir: PathBuf,
    pub cache_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let default_locale = match std::env::var("LOCALIZE_DEFAULT_LOCALE") {
            Ok(value) => LocaleKey::parse(&value)
                .with_context(|| format!("LOCALIZE_DEFAULT_LOCALE is not a locale: {}", value))?,
            Err(_) => LocaleKey::default(),
        };

        let locale = match std::env::var("LOCALIZE_LOCALE") {
            Ok(value) => LocaleKey::parse(&value)
                .with_context(|| format!("LOCALIZE_LOCALE is not a locale: {}", value))?,
            Err(_) => device_locale().unwrap_or_else(|| default_locale.clone()),
        };

        let app = AppInfo::default();

        Ok(Self {
            // Service
            base_url: std::env::var("LOCALIZE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            app_id: std::env::var("LOCALIZE_APP_ID").context("LOCALIZE_APP_ID not set")?,
            api_key: std::env::var("LOCALIZE_API_KEY").context("LOCALIZE_API_KEY not set")?,
            dev: env_bool("LOCALIZE_DEV", false),
            http_timeout_secs: std::env::var("LOCALIZE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),

            // App metadata
            app_version: std::env::var("LOCALIZE_APP_VERSION").unwrap_or(app.version),
            platform: std::env::var("LOCALIZE_PLATFORM").unwrap_or(app.platform),

            // Languages
            locale,
            default_locale,
            auto_change_language: env_bool("LOCALIZE_AUTO_CHANGE_LANGUAGE", false),

            // Storage
            assets_dir: std::env::var("LOCALIZE_ASSETS_DIR")
                .unwrap_or_else(|_| "assets".to_string())
                .into(),
            cache_file: std::env::var("LOCALIZE_CACHE_FILE")
                .unwrap_or_else(|_| "localize_cache.json".to_string())
                .into(),
        })
    }

    pub fn app_info(&self) -> AppInfo {
        AppInfo {
            version: self.app_version.clone(),
            platform: self.platform.clone(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// The operating system's preferred locale, if it parses.
fn device_locale() -> Option<LocaleKey> {
    sys_locale::get_locale().and_then(|l| LocaleKey::parse(&l).ok())
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "LOCALIZE_BASE_URL",
        "LOCALIZE_APP_ID",
        "LOCALIZE_API_KEY",
        "LOCALIZE_DEV",
        "LOCALIZE_HTTP_TIMEOUT_SECS",
        "LOCALIZE_APP_VERSION",
        "LOCALIZE_PLATFORM",
        "LOCALIZE_LOCALE",
        "LOCALIZE_DEFAULT_LOCALE",
        "LOCALIZE_AUTO_CHANGE_LANGUAGE",
        "LOCALIZE_ASSETS_DIR",
        "LOCALIZE_CACHE_FILE",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    fn set_required() {
        std::env::set_var("LOCALIZE_APP_ID", "app-id");
        std::env::set_var("LOCALIZE_API_KEY", "api-key");
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        set_required();
        std::env::set_var("LOCALIZE_LOCALE", "da_DK");

        let config = Config::from_env().unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.app_id, "app-id");
        assert!(!config.dev);
        assert_eq!(config.http_timeout(), Duration::from_secs(15));
        assert_eq!(config.app_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(config.locale, LocaleKey::parse("da-DK").unwrap());
        assert_eq!(config.default_locale, LocaleKey::default());
        assert!(!config.auto_change_language);
        assert_eq!(config.assets_dir, PathBuf::from("assets"));
        assert_eq!(config.cache_file, PathBuf::from("localize_cache.json"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_app_id_fails() {
        clear_env();
        std::env::set_var("LOCALIZE_API_KEY", "api-key");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("LOCALIZE_APP_ID"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_locale_fails() {
        clear_env();
        set_required();
        std::env::set_var("LOCALIZE_LOCALE", "english please");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("LOCALIZE_LOCALE"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        set_required();
        std::env::set_var("LOCALIZE_BASE_URL", "http://localhost:9000");
        std::env::set_var("LOCALIZE_DEV", "true");
        std::env::set_var("LOCALIZE_HTTP_TIMEOUT_SECS", "3");
        std::env::set_var("LOCALIZE_APP_VERSION", "4.2.0");
        std::env::set_var("LOCALIZE_PLATFORM", "android");
        std::env::set_var("LOCALIZE_LOCALE", "fr-FR");
        std::env::set_var("LOCALIZE_DEFAULT_LOCALE", "de_DE");
        std::env::set_var("LOCALIZE_AUTO_CHANGE_LANGUAGE", "1");
        std::env::set_var("LOCALIZE_ASSETS_DIR", "/opt/app/assets");

        let config = Config::from_env().unwrap();

        assert_eq!(config.base_url, "http://localhost:9000");
        assert!(config.dev);
        assert_eq!(config.http_timeout_secs, 3);
        assert_eq!(
            config.app_info(),
            AppInfo {
                version: "4.2.0".to_string(),
                platform: "android".to_string(),
            }
        );
        assert_eq!(config.default_locale, LocaleKey::parse("de-DE").unwrap());
        assert!(config.auto_change_language);
        assert_eq!(config.assets_dir, PathBuf::from("/opt/app/assets"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_unparseable_values_fall_back() {
        clear_env();
        set_required();
        std::env::set_var("LOCALIZE_LOCALE", "en-GB");
        std::env::set_var("LOCALIZE_HTTP_TIMEOUT_SECS", "soon");
        std::env::set_var("LOCALIZE_DEV", "maybe");

        let config = Config::from_env().unwrap();

        assert_eq!(config.http_timeout_secs, 15);
        assert!(!config.dev);

        clear_env();
    }
}
