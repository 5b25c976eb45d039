/*!
 * Cache store backed by a git branch on GitHub.
 *
 * - fetch: zipball of the branch, extracted into an emptied mirror; a missing
 *   branch is created with a parentless placeholder commit
 * - flush: the mirror is the git working directory; it is reset onto the
 *   remote head, staged, committed and pushed (forced on rejection)
 * - force recreate: a fresh history is pushed to a side branch and swapped in
 *   through the refs API
 */

use async_trait::async_trait;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use super::git::{GitRepo, PushResult};
use super::github::GitHubClient;
use super::mirror::README_FILE;
use super::{CacheState, CacheStore, FlushOptions, FlushOutcome, Mirror};
use crate::app_config::CacheConfig;
use crate::errors::CacheError;

/// README committed when the branch is first created
const PLACEHOLDER_README: &str = "# Translation cache\n\nThis branch is maintained automatically.\n";

/// Attempts at reading a freshly pushed ref before giving up
const REF_READ_RETRIES: u32 = 5;

/// Base delay between ref reads, doubled on each attempt
const REF_READ_BACKOFF_MS: u64 = 500;

/// Cache stored on a branch of a GitHub repository
#[derive(Debug, Clone)]
pub struct GitBranchCache {
    mirror: Mirror,
    git: GitRepo,
    api: GitHubClient,
    branch: String,
    remote_url: String,
    ref_backoff_ms: u64,
}

impl GitBranchCache {
    /// Build the store from configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        let api = GitHubClient::new(&config.api_base, &config.owner, &config.repo, &config.token);
        Self::new(
            config.resolved_mirror_dir(),
            api,
            &config.branch,
            config.resolved_remote_url(),
        )
    }

    /// Build the store from its parts
    pub fn new(
        mirror_dir: impl Into<PathBuf>,
        api: GitHubClient,
        branch: impl Into<String>,
        remote_url: impl Into<String>,
    ) -> Self {
        let mirror_dir = mirror_dir.into();
        Self {
            mirror: Mirror::new(&mirror_dir),
            git: GitRepo::new(mirror_dir),
            api,
            branch: branch.into(),
            remote_url: remote_url.into(),
            ref_backoff_ms: REF_READ_BACKOFF_MS,
        }
    }

    /// Override the delay between ref reads
    pub fn with_ref_backoff(mut self, backoff_ms: u64) -> Self {
        self.ref_backoff_ms = backoff_ms;
        self
    }

    /// Branch name
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Point `target` at the head of `source`, then delete `source`
    ///
    /// The source ref is read with retries since a just-pushed branch may not
    /// be visible through the API right away.
    pub async fn replace_branch(&self, source: &str, target: &str) -> Result<(), CacheError> {
        let mut head = None;
        for attempt in 0..REF_READ_RETRIES {
            if let Some(sha) = self.api.get_ref(source).await? {
                head = Some(sha);
                break;
            }
            let backoff_ms = self.ref_backoff_ms * (1u64 << attempt);
            debug!("Branch {} not visible yet, retrying in {}ms", source, backoff_ms);
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }
        let head = head.ok_or_else(|| CacheError::Http {
            status: 404,
            endpoint: format!("git/ref/heads/{}", source),
            message: format!("branch not visible after {} attempts", REF_READ_RETRIES),
        })?;

        match self.api.get_ref(target).await? {
            Some(_) => self.api.update_ref(target, &head, true).await?,
            None => self.api.create_ref(target, &head).await?,
        }
        self.api.delete_ref(source).await?;
        info!("Replaced {} with {} at {}", target, source, &head[..head.len().min(7)]);
        Ok(())
    }

    /// Upload a single file unless the remote copy already has the same content
    ///
    /// Returns whether an upload happened.
    pub async fn put_remote_file(&self, path: &str, content: &[u8]) -> Result<bool, CacheError> {
        let remote = self.api.get_file(path, &self.branch).await?;
        if let Some(file) = &remote {
            if Sha256::digest(&file.content) == Sha256::digest(content) {
                info!("{} is unchanged on {}, skipping upload", path, self.branch);
                return Ok(false);
            }
        }

        self.api
            .put_file(
                path,
                &self.branch,
                content,
                &format!("Update {}", path),
                remote.as_ref().map(|file| file.sha.as_str()),
            )
            .await?;
        info!("Uploaded {} to {}", path, self.branch);
        Ok(true)
    }

    /// Sweep orphans and refresh statistics ahead of staging
    fn prepare_tree(&self, options: &FlushOptions) -> Result<usize, CacheError> {
        let swept = match &options.valid_keys {
            Some(keys) => self.orphan_sweep(keys)?,
            None => 0,
        };
        if self.mirror.refresh_readme()? {
            debug!("Cache statistics changed");
        }
        Ok(swept)
    }

    async fn flush_incremental(&self, options: &FlushOptions) -> Result<FlushOutcome, CacheError> {
        if !self.git.is_initialized() {
            self.git.init(&self.branch).await?;
        }
        self.git.set_remote(&self.remote_url).await?;
        if self.git.fetch_shallow(&self.branch).await? {
            self.git.reset_to_fetched().await?;
        }

        self.prepare_tree(options)?;
        self.git.add_all().await?;
        let staged = self.git.staged_files().await?;
        if staged.is_empty() {
            info!("Translation cache unchanged, nothing to push");
            return Ok(FlushOutcome::Unchanged);
        }

        let readme_only = staged.iter().all(|file| file == README_FILE);
        let message = if readme_only {
            "Update translation cache statistics".to_string()
        } else {
            format!("Update translation cache ({} files)", staged.len())
        };
        self.git.commit(&message).await?;

        let forced = match self.git.push(&self.branch, false).await? {
            PushResult::Accepted => false,
            PushResult::Rejected(reason) => {
                warn!("Push to {} rejected, forcing: {}", self.branch, reason);
                self.git
                    .push(&self.branch, true)
                    .await
                    .map_err(|e| CacheError::Rejected {
                        branch: self.branch.clone(),
                        reason: e.to_string(),
                    })?;
                true
            }
        };

        info!("Pushed {} changed files to {}", staged.len(), self.branch);
        Ok(FlushOutcome::Pushed {
            files: staged.len(),
            forced,
            readme_only,
        })
    }

    async fn flush_recreated(&self, options: &FlushOptions) -> Result<FlushOutcome, CacheError> {
        let git_dir = self.mirror.root().join(".git");
        if git_dir.exists() {
            std::fs::remove_dir_all(&git_dir).map_err(|e| CacheError::io(&git_dir, e))?;
        }

        let suffix = Uuid::new_v4().simple().to_string();
        let side = format!("{}-rebuild-{}", self.branch, &suffix[..8]);

        self.prepare_tree(options)?;
        self.git.init(&side).await?;
        self.git.set_remote(&self.remote_url).await?;
        self.git.add_all().await?;
        let files = self.git.staged_files().await?.len();
        self.git.commit("Recreate translation cache").await?;

        if let PushResult::Rejected(reason) = self.git.push(&side, true).await? {
            return Err(CacheError::Rejected { branch: side, reason });
        }
        self.replace_branch(&side, &self.branch).await?;

        info!("Recreated {} with {} files", self.branch, files);
        Ok(FlushOutcome::Recreated { files })
    }
}

#[async_trait]
impl CacheStore for GitBranchCache {
    fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    async fn fetch(&self) -> Result<CacheState, CacheError> {
        if !self.api.branch_exists(&self.branch).await? {
            info!("Cache branch {} does not exist, creating it", self.branch);
            self.api
                .create_orphan_branch(&self.branch, PLACEHOLDER_README, "Initialize translation cache")
                .await?;
            self.mirror.clear()?;
            return Ok(CacheState::Cold);
        }

        let snapshot = self.api.download_zipball(&self.branch).await?;
        let files = self.mirror.extract_snapshot(&snapshot)?;
        info!("Fetched {} cached files from {}", files, self.branch);
        Ok(CacheState::Warm)
    }

    async fn flush(&self, options: &FlushOptions) -> Result<FlushOutcome, CacheError> {
        if options.force_recreate {
            self.flush_recreated(options).await
        } else {
            self.flush_incremental(options).await
        }
    }
}
