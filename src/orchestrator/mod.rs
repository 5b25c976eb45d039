/*!
 * Translation orchestration.
 *
 * A run fetches the cache, extracts every document once, then drains
 * `(document, language)` tasks in fixed-size concurrent batches. Each task
 * either reuses a cached translation or calls the API, renders the localized
 * page into a fresh parse of the source, rewrites links and alternates, and
 * verifies the control sentinel. Metadata is saved and the cache flushed in a
 * single step once every task is done.
 */

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::app_config::Config;
use crate::cache::{CacheEntry, CacheStore, FlushOptions, Mirror, PerLanguageMeta};
use crate::document::dom::serialize_dom;
use crate::document::hreflang::{self, Alternate};
use crate::document::links::{LinkRewriter, localized_url, source_url};
use crate::document::sitemap::Sitemap;
use crate::document::{self, Document, ReinsertReport, TextNodeCollector};
use crate::errors::{ConfigError, IntegrityError};
use crate::translation::TranslationClient;

pub mod report;
pub mod task;

pub use self::report::{RunReport, RunSummary};
pub use self::task::{PreparedDocument, TaskOutcome, TaskSource, TaskStatus, TranslationTask};

/// Progress callback: `(completed tasks, total tasks)`
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// A localized page before it is recorded as an outcome
struct RenderedPage {
    html: String,
    reinsert: ReinsertReport,
    sentinel_intact: bool,
}

/// Runs translation over a set of documents
pub struct Orchestrator {
    client: TranslationClient,
    store: Arc<dyn CacheStore>,
    base_url: Url,
    source_language: String,
    languages: Vec<String>,
    ignore_patterns: Vec<Regex>,
    batch_size: usize,
    batch_delay: Duration,
    recheck_window_secs: u64,
    publish: bool,
    force_recreate: bool,
    sweep_orphans: bool,
    prices: (f64, f64),
    metas: Mutex<HashMap<String, PerLanguageMeta>>,
    progress: Option<ProgressCallback>,
}

impl Orchestrator {
    /// Create an orchestrator
    pub fn new(config: &Config, client: TranslationClient, store: Arc<dyn CacheStore>) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.site.base_url).map_err(|e| ConfigError::Invalid {
            field: "site.base_url".to_string(),
            message: e.to_string(),
        })?;

        let ignore_patterns = config
            .site
            .link_ignore_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::Invalid {
                    field: "site.link_ignore_patterns".to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            client,
            store,
            base_url,
            source_language: config.site.source_language.clone(),
            languages: config.target_languages(),
            ignore_patterns,
            batch_size: config.orchestration.batch_size.max(1),
            batch_delay: Duration::from_millis(config.orchestration.batch_delay_ms),
            recheck_window_secs: config.cache.recheck_window_secs,
            publish: config.cache.publish,
            force_recreate: config.cache.force_recreate,
            sweep_orphans: config.cache.sweep_orphans,
            prices: (
                config.translation.prompt_price_per_1k,
                config.translation.completion_price_per_1k,
            ),
            metas: Mutex::new(HashMap::new()),
            progress: None,
        })
    }

    /// Report progress after every finished task
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Target languages of this run
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Translate `documents` into every target language
    ///
    /// `sitemap` is the XML of the site's sitemap, if it has one; the report
    /// carries it back with hreflang alternates merged in.
    pub async fn run(&self, documents: Vec<Document>, sitemap: Option<String>) -> Result<RunReport> {
        let start = Instant::now();
        let cache_state = self.store.fetch().await.context("Failed to fetch translation cache")?;
        info!("Translation cache is {:?}", cache_state);

        self.load_metas()?;

        let prepared: Vec<PreparedDocument> = documents
            .into_iter()
            .filter_map(|doc| {
                let path = doc.relative_path.clone();
                match PreparedDocument::prepare(doc) {
                    Ok(prepared) => Some(prepared),
                    Err(e) => {
                        error!("Skipping {}: {}", path, e);
                        None
                    }
                }
            })
            .collect();

        let tasks: Vec<TranslationTask> = (0..prepared.len())
            .flat_map(|document_index| {
                self.languages.iter().map(move |language| TranslationTask {
                    document_index,
                    language: language.clone(),
                })
            })
            .collect();
        info!(
            "Processing {} documents in {} languages ({} tasks)",
            prepared.len(),
            self.languages.len(),
            tasks.len()
        );

        let outcomes = self.run_tasks(&prepared, &tasks).await;

        let originals = self.localize_originals(&prepared);
        let sitemap = sitemap.map(|xml| self.localize_sitemap(&prepared, xml));

        self.save_metas(&prepared)?;
        let (flush, flush_error) = if self.publish {
            match self.store.flush(&self.flush_options(&prepared)).await {
                Ok(outcome) => {
                    info!("Cache flush: {:?}", outcome);
                    (Some(outcome), None)
                }
                Err(e) => {
                    error!("Failed to publish translation cache: {}", e);
                    (None, Some(e.to_string()))
                }
            }
        } else {
            debug!("Cache publishing disabled");
            (None, None)
        };

        let summary = RunSummary::from_outcomes(
            &outcomes,
            prepared.len(),
            self.languages.len(),
            self.prices,
            start.elapsed(),
        );

        Ok(RunReport {
            cache_state,
            outcomes,
            originals,
            sitemap,
            flush,
            flush_error,
            summary,
        })
    }

    async fn run_tasks(&self, prepared: &[PreparedDocument], tasks: &[TranslationTask]) -> Vec<TaskOutcome> {
        let total = tasks.len();
        let mut outcomes = Vec::with_capacity(total);

        for (batch_index, batch) in tasks.chunks(self.batch_size).enumerate() {
            if batch_index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            debug!("Starting batch {} ({} tasks)", batch_index + 1, batch.len());

            let results = join_all(
                batch
                    .iter()
                    .map(|task| self.run_task(&prepared[task.document_index], &task.language)),
            )
            .await;
            outcomes.extend(results);

            if let Some(progress) = &self.progress {
                progress(outcomes.len(), total);
            }
        }

        outcomes
    }

    /// Process one (document, language) pair
    async fn run_task(&self, prepared: &PreparedDocument, language: &str) -> TaskOutcome {
        let start = Instant::now();
        let key = prepared.document.relative_path.as_str();

        let (blob, source, usage, api_time, translation_error) = match self.cached_blob(prepared, language) {
            Some(blob) => {
                debug!("Cache hit for {} ({})", key, language);
                (blob, TaskSource::CacheHit, None, Duration::ZERO, None)
            }
            None => match self.client.translate(&prepared.blob, language).await {
                Ok(translated) => {
                    if let Err(e) = self.store.put(language, key, &translated.text) {
                        warn!("Failed to cache {} ({}): {}", key, language, e);
                    }
                    (
                        translated.text,
                        TaskSource::Translated,
                        Some(translated.usage),
                        translated.elapsed,
                        None,
                    )
                }
                Err(e) => (
                    prepared.blob.clone(),
                    TaskSource::Fallback,
                    None,
                    Duration::ZERO,
                    Some(e.to_string()),
                ),
            },
        };

        let rendered = self.render(prepared, language, &blob);
        let (status, html, missing_spans) = match rendered {
            Err(e) => (TaskStatus::RenderFailed(e.to_string()), None, 0),
            Ok(page) => {
                let status = if let Some(message) = translation_error {
                    TaskStatus::TranslationFailed(message)
                } else if !page.sentinel_intact || page.reinsert.missing.contains(&prepared.sentinel_index) {
                    let integrity = IntegrityError {
                        relative_path: key.to_string(),
                        language: language.to_string(),
                    };
                    TaskStatus::IntegrityFailed(integrity.to_string())
                } else {
                    TaskStatus::Done
                };
                (status, Some(page.html), page.reinsert.missing.len())
            }
        };

        let elapsed = start.elapsed();
        match (&status, source) {
            (TaskStatus::Done, TaskSource::Translated) => {
                self.record(language, CacheEntry::success(key, &prepared.hash));
            }
            (TaskStatus::Done, _) => {}
            (failure, _) => {
                error!(
                    "{} ({}) failed after {:.2}s: {:?}",
                    key,
                    language,
                    elapsed.as_secs_f64(),
                    failure
                );
                self.record(language, CacheEntry::failed(key));
            }
        }

        TaskOutcome {
            relative_path: key.to_string(),
            language: language.to_string(),
            source,
            status,
            html,
            usage,
            api_time,
            missing_spans,
            elapsed,
        }
    }

    /// Cached translated blob, when the entry is usable and the artifact exists
    fn cached_blob(&self, prepared: &PreparedDocument, language: &str) -> Option<String> {
        let key = prepared.document.relative_path.as_str();
        let usable = self
            .metas
            .lock()
            .get(language)
            .and_then(|meta| meta.usable_entry(key, &prepared.hash, self.recheck_window_secs, Utc::now()))
            .is_some();
        if !usable {
            return None;
        }

        match self.store.lookup(language, key) {
            Ok(Some(blob)) => Some(blob),
            Ok(None) => {
                debug!("Cache entry for {} ({}) has no artifact", key, language);
                None
            }
            Err(e) => {
                warn!("Failed to read cached {} ({}): {}", key, language, e);
                None
            }
        }
    }

    fn record(&self, language: &str, entry: CacheEntry) {
        let mut metas = self.metas.lock();
        metas
            .entry(language.to_string())
            .or_insert_with(|| PerLanguageMeta::new(self.client.prompt_hash(language)))
            .record(entry);
    }

    /// Build the localized page; all DOM work stays inside this call
    fn render(&self, prepared: &PreparedDocument, language: &str, blob: &str) -> Result<RenderedPage> {
        let dom = prepared.document.parse()?;
        document::inject_sentinel(&dom);
        let reinsert = TextNodeCollector::reinsert(&dom, blob, &prepared.spans)?;
        let sentinel_intact = document::sentinel_intact(&dom);
        document::remove_sentinel(&dom);

        let page_path = prepared.document.url_path();
        let rewriter = LinkRewriter::new(
            self.base_url.clone(),
            language,
            self.languages.clone(),
            self.ignore_patterns.clone(),
        );
        rewriter.rewrite_dom(&dom, &page_path);

        hreflang::set_document_language(&dom, language);
        hreflang::set_canonical(&dom, &localized_url(&self.base_url, language, &page_path));
        hreflang::merge_alternates(&dom, &self.alternates(&page_path));

        Ok(RenderedPage {
            html: serialize_dom(&dom)?,
            reinsert,
            sentinel_intact,
        })
    }

    fn alternates(&self, page_path: &str) -> Vec<Alternate> {
        hreflang::alternates_for(&self.base_url, &self.source_language, &self.languages, page_path)
    }

    /// Source documents with alternates merged in
    fn localize_originals(&self, prepared: &[PreparedDocument]) -> Vec<Document> {
        prepared
            .iter()
            .map(|p| {
                let original = &p.document;
                let merged = original.parse().and_then(|dom| {
                    hreflang::merge_alternates(&dom, &self.alternates(&original.url_path()));
                    serialize_dom(&dom)
                });
                match merged {
                    Ok(html) => Document::new(&original.relative_path, html),
                    Err(e) => {
                        warn!("Keeping {} unchanged: {}", original.relative_path, e);
                        original.clone()
                    }
                }
            })
            .collect()
    }

    fn localize_sitemap(&self, prepared: &[PreparedDocument], xml: String) -> String {
        let mut sitemap = Sitemap::new(xml);
        let mut changed = 0;
        for p in prepared {
            let page_path = p.document.url_path();
            changed += sitemap.merge_alternates(&source_url(&self.base_url, &page_path), &self.alternates(&page_path));
        }
        debug!("Sitemap: {} alternate links added or updated", changed);
        sitemap.into_string()
    }

    fn load_metas(&self) -> Result<()> {
        let mut metas = self.metas.lock();
        metas.clear();
        for language in &self.languages {
            let meta = self
                .store
                .load_meta(language, &self.client.prompt_hash(language))
                .with_context(|| format!("Failed to load cache metadata for {}", language))?;
            debug!("Loaded {} cache entries for {}", meta.entries.len(), language);
            metas.insert(language.clone(), meta);
        }
        Ok(())
    }

    fn save_metas(&self, prepared: &[PreparedDocument]) -> Result<()> {
        let valid: HashSet<String> = prepared.iter().map(|p| p.document.relative_path.clone()).collect();
        let mut metas = self.metas.lock();
        for (language, meta) in metas.iter_mut() {
            if self.sweep_orphans {
                let pruned = meta.prune(&valid);
                if pruned > 0 {
                    debug!("Pruned {} stale entries for {}", pruned, language);
                }
            }
            self.store
                .save_meta(language, meta)
                .with_context(|| format!("Failed to save cache metadata for {}", language))?;
        }
        Ok(())
    }

    fn flush_options(&self, prepared: &[PreparedDocument]) -> FlushOptions {
        let valid_keys = self.sweep_orphans.then(|| {
            self.languages
                .iter()
                .flat_map(|language| {
                    prepared
                        .iter()
                        .map(move |p| Mirror::artifact_key(language, &p.document.relative_path))
                })
                .collect()
        });
        FlushOptions {
            valid_keys,
            force_recreate: self.force_recreate,
        }
    }
}
