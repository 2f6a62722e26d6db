use anyhow::{Context, Result};
use localize_engine::assets::load_asset_bundle;
use localize_engine::cache::{FileStore, KeyValueStore, MemoryStore};
use localize_engine::config::Config;
use localize_engine::network::UpdateClient;
use localize_engine::{Engine, UpdateOutcome, Updater};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when the variables come from the environment)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("localize_engine=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        "Starting localization refresh for {} (locale {})",
        config.base_url, config.locale
    );

    // Step 1: Load bundled assets and the persisted cache
    let bundle = load_asset_bundle(&config.assets_dir)
        .with_context(|| format!("Failed to read assets from {}", config.assets_dir.display()))?;
    let store: Box<dyn KeyValueStore> = match FileStore::open(&config.cache_file) {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(
                "Cannot open cache {}, translations will not persist: {}",
                config.cache_file.display(),
                e
            );
            Box::new(MemoryStore::new())
        }
    };

    let mut engine = Engine::builder()
        .locale(config.locale.clone())
        .default_locale(config.default_locale.clone())
        .assets(bundle)
        .store(store)
        .app_info(config.app_info())
        .auto_change_language(config.auto_change_language)
        .on_language_changed(|locale| info!("Active language is now {}", locale))
        .on_languages_changed(|| info!("Available languages changed"))
        .build();

    // Step 2: Check the service for newer translations
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .context("Failed to build HTTP client")?;
    let client = UpdateClient::new(http, &config.base_url, &config.app_id, &config.api_key)
        .with_dev(config.dev);
    let updater = Updater::new(client);

    match engine.refresh(&updater).await {
        UpdateOutcome::Failure(e) => warn!("Refresh failed, using cached translations: {}", e),
        outcome => info!("Refresh finished: {}", outcome),
    }

    // Step 3: Report what is available and look up any requested keys
    let languages: Vec<String> = engine
        .available_languages()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("Active language: {}", engine.language());
    println!("Available languages: {}", languages.join(", "));

    for key in std::env::args().skip(1) {
        match engine.get_translation(&key) {
            Some(value) => println!("{} = {}", key, value),
            None => println!("{} is not translated", key),
        }
    }

    println!("{}", engine.metrics().report().format_summary());
    Ok(())
}
