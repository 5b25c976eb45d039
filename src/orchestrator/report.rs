use std::fmt;
use std::time::Duration;

use super::task::{TaskOutcome, TaskSource, TaskStatus};
use crate::cache::{CacheState, FlushOutcome};
use crate::document::Document;
use crate::translation::TokenUsageStats;

/// Counters for the end-of-run summary
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Documents processed
    pub documents: usize,
    /// Target languages
    pub languages: usize,
    /// Tasks run
    pub tasks: usize,
    /// Tasks served from the cache
    pub cache_hits: usize,
    /// Tasks translated during this run
    pub translated: usize,
    /// Tasks whose translation call failed
    pub failed: usize,
    /// Tasks whose control sentinel did not survive
    pub integrity_failures: usize,
    /// Tasks whose page could not be rendered
    pub render_failures: usize,
    /// Token usage of all API calls
    pub usage: TokenUsageStats,
    /// Estimated API cost
    pub estimated_cost: f64,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl RunSummary {
    /// Tally task outcomes
    pub fn from_outcomes(
        outcomes: &[TaskOutcome],
        documents: usize,
        languages: usize,
        prices: (f64, f64),
        elapsed: Duration,
    ) -> Self {
        let mut summary = Self {
            documents,
            languages,
            tasks: outcomes.len(),
            elapsed,
            ..Default::default()
        };

        for outcome in outcomes {
            match outcome.source {
                TaskSource::CacheHit => summary.cache_hits += 1,
                TaskSource::Translated => summary.translated += 1,
                TaskSource::Fallback => {}
            }
            match outcome.status {
                TaskStatus::Done => {}
                TaskStatus::TranslationFailed(_) => summary.failed += 1,
                TaskStatus::IntegrityFailed(_) => summary.integrity_failures += 1,
                TaskStatus::RenderFailed(_) => summary.render_failures += 1,
            }
            if let Some(usage) = outcome.usage {
                summary.usage.record(usage, outcome.api_time);
            }
        }

        summary.estimated_cost = summary.usage.estimated_cost(prices.0, prices.1);
        summary
    }

    /// Tasks that ended in any failure state
    pub fn total_failures(&self) -> usize {
        self.failed + self.integrity_failures + self.render_failures
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run Summary:\n\
             Documents: {} x {} languages = {} tasks\n\
             Cache hits: {}\n\
             Translated: {}\n\
             Failed: {} (translation {}, integrity {}, render {})\n\
             Tokens: {} prompt + {} completion = {}\n\
             Estimated cost: ${:.4}\n\
             Elapsed time: {:.2}s",
            self.documents,
            self.languages,
            self.tasks,
            self.cache_hits,
            self.translated,
            self.total_failures(),
            self.failed,
            self.integrity_failures,
            self.render_failures,
            self.usage.prompt_tokens,
            self.usage.completion_tokens,
            self.usage.total_tokens(),
            self.estimated_cost,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    /// State of the cache when the run started
    pub cache_state: CacheState,
    /// One outcome per (document, language), document-major
    pub outcomes: Vec<TaskOutcome>,
    /// Source documents with hreflang alternates merged in
    pub originals: Vec<Document>,
    /// Sitemap with hreflang alternates, when one was supplied
    pub sitemap: Option<String>,
    /// Result of publishing the cache, when it was published
    pub flush: Option<FlushOutcome>,
    /// Why publishing failed, when it did
    pub flush_error: Option<String>,
    /// Counters
    pub summary: RunSummary,
}

impl RunReport {
    /// Localized pages as `(language, relative path, html)`
    pub fn pages(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.outcomes.iter().filter_map(|outcome| {
            outcome
                .html
                .as_deref()
                .map(|html| (outcome.language.as_str(), outcome.relative_path.as_str(), html))
        })
    }

    /// Whether any task failed or the cache could not be published
    pub fn has_failures(&self) -> bool {
        self.summary.total_failures() > 0 || self.flush_error.is_some()
    }

    /// Outcome of one task
    pub fn outcome(&self, relative_path: &str, language: &str) -> Option<&TaskOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.relative_path == relative_path && o.language == language)
    }
}
