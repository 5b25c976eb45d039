use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;
use url::Url;

use crate::errors::ConfigError;
use crate::language_utils;

/// Application configuration module
/// This module handles the engine configuration including defaults,
/// environment fallbacks and validation of the settings.
/// Represents the engine configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Site being localized
    #[serde(default)]
    pub site: SiteConfig,

    /// Translation API settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Cache store settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Task scheduling settings
    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Site settings handed over by the build pipeline
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SiteConfig {
    /// Brand name that must never be translated
    #[serde(default = "default_brand_name")]
    pub brand_name: String,

    /// Canonical base URL of the published site (no trailing slash needed)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Language the source documents are written in
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Languages to produce
    #[serde(default)]
    pub target_languages: Vec<String>,

    /// Regex patterns for links that keep pointing at the source language
    #[serde(default = "default_link_ignore_patterns")]
    pub link_ignore_patterns: Vec<String>,

    /// Sitemap file relative to the site directory
    #[serde(default = "default_sitemap_path")]
    pub sitemap_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            brand_name: default_brand_name(),
            base_url: default_base_url(),
            source_language: default_source_language(),
            target_languages: Vec::new(),
            link_ignore_patterns: default_link_ignore_patterns(),
            sitemap_path: default_sitemap_path(),
        }
    }
}

/// Chat-completion endpoint settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Service endpoint URL (OpenAI-compatible, without `/chat/completions`)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key for the service
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Completion token budget per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Price per 1000 prompt tokens, for the run summary
    #[serde(default)]
    pub prompt_price_per_1k: f64,

    /// Price per 1000 completion tokens, for the run summary
    #[serde(default)]
    pub completion_price_per_1k: f64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            prompt_price_per_1k: 0.0,
            completion_price_per_1k: 0.0,
        }
    }
}

/// Cache backend type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    // @backend: Git branch on a GitHub repository
    #[default]
    GitHub,
    // @backend: Local mirror directory only
    Local,
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitHub => write!(f, "github"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "local" => Ok(Self::Local),
            _ => Err(anyhow::anyhow!("Invalid cache backend: {}", s)),
        }
    }
}

/// Cache store settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Which store backs the cache
    #[serde(default)]
    pub backend: CacheBackend,

    /// Repository owner
    #[serde(default = "String::new")]
    pub owner: String,

    /// Repository name
    #[serde(default = "String::new")]
    pub repo: String,

    /// Branch used as the cache medium
    #[serde(default = "default_cache_branch")]
    pub branch: String,

    /// Token for the hosting API and git pushes
    #[serde(default = "String::new")]
    pub token: String,

    /// Hosting REST API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Git remote override (defaults to the token-authenticated GitHub URL)
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Local mirror directory (defaults to the user cache directory)
    #[serde(default)]
    pub mirror_dir: Option<PathBuf>,

    /// Seconds after which a hash-matching entry is re-translated; 0 disables expiry
    #[serde(default)]
    pub recheck_window_secs: u64,

    /// Whether cache changes are pushed at the end of a run
    #[serde(default)]
    pub publish: bool,

    /// Rebuild the branch from scratch on a side branch and swap it in
    #[serde(default)]
    pub force_recreate: bool,

    /// Delete mirrored artifacts that no current document maps to
    #[serde(default = "default_true")]
    pub sweep_orphans: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            owner: String::new(),
            repo: String::new(),
            branch: default_cache_branch(),
            token: String::new(),
            api_base: default_api_base(),
            remote_url: None,
            mirror_dir: None,
            recheck_window_secs: 0,
            publish: false,
            force_recreate: false,
            sweep_orphans: true,
        }
    }
}

impl CacheConfig {
    /// Resolve the mirror directory, falling back to the user cache directory
    pub fn resolved_mirror_dir(&self) -> PathBuf {
        if let Some(dir) = &self.mirror_dir {
            return dir.clone();
        }

        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("sitelingo")
            .join(format!("{}-{}", self.repo, self.branch))
    }

    /// Git remote URL, token-authenticated unless overridden
    pub fn resolved_remote_url(&self) -> String {
        match &self.remote_url {
            Some(url) => url.clone(),
            None => format!(
                "https://x-access-token:{}@github.com/{}/{}.git",
                self.token, self.owner, self.repo
            ),
        }
    }
}

/// Task scheduling settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrchestrationConfig {
    /// Number of tasks run concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between batches in milliseconds
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Fail the process when any task failed
    #[serde(default)]
    pub strict: bool,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            strict: false,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Map to the `log` crate filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_brand_name() -> String {
    "Acme".to_string()
}

fn default_base_url() -> String {
    "https://example.com".to_string()
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_sitemap_path() -> String {
    "sitemap.xml".to_string()
}

fn default_link_ignore_patterns() -> Vec<String> {
    [
        // Social profiles
        r"^https?://([a-z0-9-]+\.)?(twitter|x|facebook|instagram|linkedin|youtube|github|discord)\.com/",
        // Auth routes
        r"^/(login|logout|signin|signup|register|auth)(/|$)",
        // Checkout routes
        r"^/(checkout|cart)(/|$)",
        // Legal pages
        r"^/(terms|privacy|legal|cookies)(/|\.html|$)",
        // Redirect permalinks
        r"^/go/",
        // Admin paths
        r"^/admin(/|$)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    16000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_retry_count() -> u32 {
    3 // Default to 3 retries
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_cache_branch() -> String {
    "translation-cache".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Fill empty credentials from the environment
    pub fn apply_env_overrides(&mut self) {
        if self.translation.api_key.is_empty() {
            if let Some(key) = ["SITELINGO_API_KEY", "OPENAI_API_KEY"]
                .iter()
                .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
            {
                self.translation.api_key = key;
            }
        }

        if self.cache.token.is_empty() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                self.cache.token = token;
            }
        }
    }

    /// Target languages normalized for URLs and cache keys, first occurrence kept
    pub fn target_languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = Vec::with_capacity(self.site.target_languages.len());
        for language in &self.site.target_languages {
            let normalized = language_utils::normalize_locale(language);
            if !languages.contains(&normalized) {
                languages.push(normalized);
            }
        }
        languages
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ConfigError> {
        language_utils::validate_language_code(&self.site.source_language).map_err(|e| {
            ConfigError::Invalid {
                field: "site.source_language".to_string(),
                message: e.to_string(),
            }
        })?;

        if self.site.target_languages.is_empty() {
            return Err(ConfigError::Invalid {
                field: "site.target_languages".to_string(),
                message: "at least one target language is required".to_string(),
            });
        }

        for language in &self.site.target_languages {
            language_utils::validate_language_code(language).map_err(|e| ConfigError::Invalid {
                field: "site.target_languages".to_string(),
                message: e.to_string(),
            })?;
        }

        let base = Url::parse(&self.site.base_url).map_err(|e| ConfigError::Invalid {
            field: "site.base_url".to_string(),
            message: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "site.base_url".to_string(),
                message: format!("unsupported scheme '{}'", base.scheme()),
            });
        }

        for pattern in &self.site.link_ignore_patterns {
            regex::Regex::new(pattern).map_err(|e| ConfigError::Invalid {
                field: "site.link_ignore_patterns".to_string(),
                message: e.to_string(),
            })?;
        }

        if self.translation.api_key.is_empty() {
            return Err(ConfigError::MissingCredential(
                "translation API key (set translation.api_key or SITELINGO_API_KEY)".to_string(),
            ));
        }

        if self.orchestration.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "orchestration.batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        self.validate_cache()
    }

    /// Validate only the cache settings, for commands that never translate
    pub fn validate_cache(&self) -> Result<(), ConfigError> {
        if self.cache.backend == CacheBackend::GitHub {
            if self.cache.owner.is_empty() || self.cache.repo.is_empty() {
                return Err(ConfigError::Invalid {
                    field: "cache.owner/cache.repo".to_string(),
                    message: "required for the github backend".to_string(),
                });
            }
            if self.cache.token.is_empty() {
                return Err(ConfigError::MissingCredential(
                    "GitHub token (set cache.token or GITHUB_TOKEN)".to_string(),
                ));
            }
        }
        Ok(())
    }
}
