use async_trait::async_trait;
use log::info;
use std::path::PathBuf;

use super::{CacheState, CacheStore, FlushOptions, FlushOutcome, Mirror};
use crate::errors::CacheError;

/// Cache kept in a local directory, with no remote
#[derive(Debug, Clone)]
pub struct LocalCache {
    mirror: Mirror,
}

impl LocalCache {
    /// Create a cache rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            mirror: Mirror::new(root),
        }
    }
}

#[async_trait]
impl CacheStore for LocalCache {
    fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    async fn fetch(&self) -> Result<CacheState, CacheError> {
        let root = self.mirror.root();
        std::fs::create_dir_all(root).map_err(|e| CacheError::io(root, e))?;
        if self.mirror.languages()?.is_empty() {
            info!("Local cache at {} is empty", root.display());
            Ok(CacheState::Cold)
        } else {
            Ok(CacheState::Warm)
        }
    }

    async fn flush(&self, options: &FlushOptions) -> Result<FlushOutcome, CacheError> {
        let swept = match &options.valid_keys {
            Some(keys) => self.orphan_sweep(keys)?,
            None => 0,
        };
        self.mirror.refresh_readme()?;
        Ok(FlushOutcome::Saved { swept })
    }
}
