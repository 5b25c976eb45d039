/*!
 * Content cache for translated pages.
 *
 * The cache is a directory mirror (`mirror`) with per-language metadata
 * (`meta`). Stores decide where the mirror comes from and where it goes:
 * - `branch::GitBranchCache`: a git branch on GitHub, fetched as a zipball
 *   and pushed with the git CLI (`git`, `github`)
 * - `local::LocalCache`: the mirror directory alone
 */

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::{CacheBackend, CacheConfig};
use crate::errors::{CacheError, ConfigError};

pub mod branch;
pub mod git;
pub mod github;
pub mod local;
pub mod meta;
pub mod mirror;

pub use self::branch::GitBranchCache;
pub use self::local::LocalCache;
pub use self::meta::{CacheEntry, EntryStatus, FAILED_HASH, PerLanguageMeta};
pub use self::mirror::Mirror;

/// State of the cache after fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Existing cache contents were loaded
    Warm,
    /// Nothing cached yet; every document is a miss
    Cold,
}

/// What a flush should do besides committing the mirror
#[derive(Debug, Clone, Default)]
pub struct FlushOptions {
    /// Mirror keys still referenced; everything else is swept when set
    pub valid_keys: Option<HashSet<String>>,
    /// Rebuild the branch without history
    pub force_recreate: bool,
}

/// Result of a flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing changed since the last push
    Unchanged,
    /// Changes were committed and pushed
    Pushed {
        /// Files in the commit
        files: usize,
        /// Whether a force push was needed
        forced: bool,
        /// Whether only statistics changed
        readme_only: bool,
    },
    /// The branch was rebuilt and swapped in
    Recreated {
        /// Files in the new root commit
        files: usize,
    },
    /// The mirror was updated on disk only
    Saved {
        /// Orphaned files removed
        swept: usize,
    },
}

/// Key/value store of translated blobs and their metadata
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// The local mirror backing this store
    fn mirror(&self) -> &Mirror;

    /// Bring the mirror up to date with the remote store
    async fn fetch(&self) -> Result<CacheState, CacheError>;

    /// Cached translated blob of a document
    fn lookup(&self, language: &str, relative_path: &str) -> Result<Option<String>, CacheError> {
        self.mirror().read_artifact(language, relative_path)
    }

    /// Store a translated blob
    fn put(&self, language: &str, relative_path: &str, translated_blob: &str) -> Result<(), CacheError> {
        self.mirror().write_artifact(language, relative_path, translated_blob)
    }

    /// Metadata of a language, emptied when produced under another prompt
    fn load_meta(&self, language: &str, prompt_hash: &str) -> Result<PerLanguageMeta, CacheError> {
        self.mirror().read_meta(language, prompt_hash)
    }

    /// Persist metadata of a language
    fn save_meta(&self, language: &str, meta: &PerLanguageMeta) -> Result<(), CacheError> {
        self.mirror().write_meta(language, meta)
    }

    /// Remove artifacts not in `valid_keys`
    fn orphan_sweep(&self, valid_keys: &HashSet<String>) -> Result<usize, CacheError> {
        self.mirror().sweep_orphans(valid_keys)
    }

    /// Publish the mirror
    async fn flush(&self, options: &FlushOptions) -> Result<FlushOutcome, CacheError>;
}

/// Build the store selected by the configuration
pub async fn store_from_config(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, ConfigError> {
    match config.backend {
        CacheBackend::GitHub => {
            git::ensure_available().await?;
            Ok(Arc::new(GitBranchCache::from_config(config)))
        }
        CacheBackend::Local => Ok(Arc::new(LocalCache::new(config.resolved_mirror_dir()))),
    }
}
