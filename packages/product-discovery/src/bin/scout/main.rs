// Entry point for the scout batch runner

mod config;

use anyhow::{Context, Result};
use llm_client::LlmClient;
use product_discovery::{
    CacheStore, CachedFetcher, DeepSeekModel, DiscoveryConfig, ExtractionConfig, FetchConfig,
    HttpFetcher, JsonFileCache, Pipeline, PipelineConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,product_discovery=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(sites = config.sites.len(), cache = %config.cache_path.display(), "Configuration loaded");

    if let Some(parent) = config.cache_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create cache directory {}", parent.display()))?;
    }
    let cache = Arc::new(
        JsonFileCache::open(&config.cache_path)
            .await
            .context("Failed to open cache")?,
    );

    let fetch_config = FetchConfig::default();
    let http = HttpFetcher::new(&fetch_config).context("Failed to build HTTP client")?;
    let fetcher = CachedFetcher::new(Arc::new(http), cache.clone(), fetch_config.cache_ttl);

    let extraction = ExtractionConfig::new();
    let mut pipeline = Pipeline::new(
        fetcher,
        DiscoveryConfig::new().with_coffee_only(true),
        extraction.clone(),
        PipelineConfig::default().with_concurrency(config.concurrency),
    );

    match &config.deepseek_api_key {
        Some(key) => {
            let client = LlmClient::new(key.clone())
                .with_timeout(Duration::from_secs(60))
                .context("Failed to build language model client")?;
            pipeline = pipeline.with_language_model(Arc::new(DeepSeekModel::new(client, &extraction)));
            tracing::info!(model = %extraction.model, "Language-model fallback enabled");
        }
        None => tracing::warn!("DEEPSEEK_API_KEY not set, language-model fallback disabled"),
    }

    let summary = pipeline.run(config.sites.clone()).await;

    let json = serde_json::to_string_pretty(&summary).context("Failed to serialize results")?;
    match &config.output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Results written");
        }
        None => println!("{}", json),
    }

    cache.flush().await.context("Failed to flush cache")?;

    tracing::info!(
        sites = summary.stats.sites_processed,
        products = summary.stats.products_extracted,
        enriched = summary.stats.products_enriched,
        errors = summary.stats.errors,
        "Scout finished"
    );
    Ok(())
}
