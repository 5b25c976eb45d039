//! Per-document preparation and per-(document, language) task results.

use anyhow::{Result, anyhow};
use std::time::Duration;

use crate::document::{self, CONTROL_SENTINEL, Document, TextNodeCollector, TextSpan};
use crate::providers::Usage;

/// A document extracted once and shared by all of its language tasks
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// The source document
    pub document: Document,
    /// Spans, the control sentinel last
    pub spans: Vec<TextSpan>,
    /// Tagged blob sent for translation
    pub blob: String,
    /// SHA-256 of `blob`
    pub hash: String,
    /// Index of the control sentinel span
    pub sentinel_index: usize,
}

impl PreparedDocument {
    /// Parse, inject the control sentinel and extract
    pub fn prepare(document: Document) -> Result<Self> {
        let dom = document.parse()?;
        document::inject_sentinel(&dom);
        let spans = TextNodeCollector::extract(&dom);

        let sentinel_index = spans
            .iter()
            .rposition(|span| span.core_text() == CONTROL_SENTINEL)
            .ok_or_else(|| anyhow!("Control sentinel was not extracted from {}", document.relative_path))?;

        let blob = TextNodeCollector::build_blob(&spans);
        let hash = TextNodeCollector::content_hash(&blob);
        Ok(Self {
            document,
            spans,
            blob,
            hash,
            sentinel_index,
        })
    }
}

/// One unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationTask {
    /// Index into the prepared documents
    pub document_index: usize,
    /// Target language
    pub language: String,
}

/// Where the translated blob of a task came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSource {
    /// Served from the cache
    CacheHit,
    /// Translated during this run
    Translated,
    /// Translation failed; the page carries the source text
    Fallback,
}

/// Final state of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Page produced with a verified translation
    Done,
    /// The translation API failed
    TranslationFailed(String),
    /// The control sentinel did not survive; the page is kept
    IntegrityFailed(String),
    /// The page could not be rendered
    RenderFailed(String),
}

/// Result of one task, never an error so sibling tasks are unaffected
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Document path relative to the site root
    pub relative_path: String,
    /// Target language
    pub language: String,
    /// Where the translation came from
    pub source: TaskSource,
    /// Final status
    pub status: TaskStatus,
    /// Localized HTML, absent only when rendering failed
    pub html: Option<String>,
    /// Token usage of the API call, if one was made
    pub usage: Option<Usage>,
    /// API time of the call, if one was made
    pub api_time: Duration,
    /// Spans that kept their source text
    pub missing_spans: usize,
    /// Wall time of the task
    pub elapsed: Duration,
}

impl TaskOutcome {
    /// Whether the task ended in any failure state
    pub fn is_failure(&self) -> bool {
        !matches!(self.status, TaskStatus::Done)
    }
}
