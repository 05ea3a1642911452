use anyhow::{Context, Result};
use dotenvy::dotenv;
use product_discovery::{Platform, SiteRequest};
use std::env;
use std::path::PathBuf;

/// Scout configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// DeepSeek key; the language-model fallback is disabled without it
    pub deepseek_api_key: Option<String>,
    pub sites: Vec<SiteRequest>,
    pub cache_path: PathBuf,
    pub concurrency: usize,
    pub refresh: bool,
    /// JSON output file; stdout when unset
    pub output: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let refresh = match env::var("SCOUT_REFRESH") {
            Ok(v) => parse_flag(&v).context("SCOUT_REFRESH must be true or false")?,
            Err(_) => false,
        };
        let sites = parse_sites(&env::var("SCOUT_SITES").context("SCOUT_SITES must be set")?, refresh)?;

        Ok(Self {
            deepseek_api_key: env::var("DEEPSEEK_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            sites,
            cache_path: env::var("SCOUT_CACHE_PATH")
                .unwrap_or_else(|_| ".cache/scout.json".to_string())
                .into(),
            concurrency: env::var("SCOUT_CONCURRENCY")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("SCOUT_CONCURRENCY must be a valid number")?,
            refresh,
            output: env::var("SCOUT_OUTPUT").ok().map(PathBuf::from),
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Parse `url[|platform]` entries separated by commas.
pub fn parse_sites(raw: &str, refresh: bool) -> Result<Vec<SiteRequest>> {
    let sites: Vec<SiteRequest> = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (url, platform) = match entry.split_once('|') {
                Some((url, hint)) => (url.trim(), Platform::from_hint(hint)),
                None => (entry, Platform::Unknown),
            };
            SiteRequest::new(url).with_platform(platform).with_refresh(refresh)
        })
        .collect();

    anyhow::ensure!(!sites.is_empty(), "SCOUT_SITES lists no sites");
    Ok(sites)
}
