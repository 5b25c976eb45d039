//! Per-language cache metadata stored as `<lang>/meta.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Content hash recorded for failed translations; never equals a SHA-256 hex digest
pub const FAILED_HASH: &str = "failed";

/// Outcome recorded for a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Success,
    Failed,
}

/// Cache record for one document in one language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Document path relative to the site root
    pub relative_key: String,

    /// SHA-256 of the source blob, or [`FAILED_HASH`]
    pub content_hash: String,

    /// When the entry was written
    pub timestamp: DateTime<Utc>,

    /// Whether the translation succeeded
    pub status: EntryStatus,
}

impl CacheEntry {
    /// Entry for a successful translation of `content_hash`
    pub fn success(relative_key: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            relative_key: relative_key.into(),
            content_hash: content_hash.into(),
            timestamp: Utc::now(),
            status: EntryStatus::Success,
        }
    }

    /// Entry for a failed translation
    pub fn failed(relative_key: impl Into<String>) -> Self {
        Self {
            relative_key: relative_key.into(),
            content_hash: FAILED_HASH.to_string(),
            timestamp: Utc::now(),
            status: EntryStatus::Failed,
        }
    }

    /// Whether this entry can serve a document whose blob hashes to `content_hash`
    ///
    /// A `recheck_window_secs` of 0 disables time-based expiry.
    pub fn is_usable(&self, content_hash: &str, recheck_window_secs: u64, now: DateTime<Utc>) -> bool {
        if self.status != EntryStatus::Success || self.content_hash != content_hash {
            return false;
        }
        if recheck_window_secs == 0 {
            return true;
        }
        let age = now.signed_duration_since(self.timestamp).num_seconds();
        age <= recheck_window_secs as i64
    }
}

/// Metadata of one language directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerLanguageMeta {
    /// Hash of the system prompt the entries were produced with
    #[serde(default)]
    pub prompt_hash: String,

    /// Entries by relative key, sorted for stable serialization
    #[serde(default)]
    pub entries: BTreeMap<String, CacheEntry>,
}

impl PerLanguageMeta {
    /// Empty metadata for a prompt
    pub fn new(prompt_hash: impl Into<String>) -> Self {
        Self {
            prompt_hash: prompt_hash.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Look up a usable entry for a document
    pub fn usable_entry(
        &self,
        relative_key: &str,
        content_hash: &str,
        recheck_window_secs: u64,
        now: DateTime<Utc>,
    ) -> Option<&CacheEntry> {
        self.entries
            .get(relative_key)
            .filter(|entry| entry.is_usable(content_hash, recheck_window_secs, now))
    }

    /// Insert or replace an entry
    pub fn record(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.relative_key.clone(), entry);
    }

    /// Drop entries for documents that no longer exist, returning how many were removed
    pub fn prune(&mut self, valid_keys: &HashSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| valid_keys.contains(key));
        before - self.entries.len()
    }

    /// `(successes, failures)`
    pub fn counts(&self) -> (usize, usize) {
        self.entries
            .values()
            .fold((0, 0), |(ok, failed), entry| match entry.status {
                EntryStatus::Success => (ok + 1, failed),
                EntryStatus::Failed => (ok, failed + 1),
            })
    }
}
