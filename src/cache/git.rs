/*!
 * git porcelain driven through `tokio::process`.
 *
 * Only the handful of commands the cache flush needs are wrapped. Remote URLs
 * may carry a token, so command lines are never logged with their arguments
 * expanded past the subcommand name.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::errors::{CacheError, ConfigError};

/// Upper bound for a single git invocation
const GIT_TIMEOUT: Duration = Duration::from_secs(300);

static CREDENTIALS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://)[^/@\s]+@").expect("Invalid credential regex"));

/// Author used for cache commits
pub const COMMIT_NAME: &str = "sitelingo";
/// Author email used for cache commits
pub const COMMIT_EMAIL: &str = "sitelingo@users.noreply.github.com";

/// Result of a push attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    /// The remote accepted the push
    Accepted,
    /// The remote refused a non-forced push
    Rejected(String),
}

/// Check that the `git` binary can be executed
pub async fn ensure_available() -> Result<(), ConfigError> {
    match Command::new("git").arg("--version").output().await {
        Ok(output) if output.status.success() => {
            debug!("{}", String::from_utf8_lossy(&output.stdout).trim());
            Ok(())
        }
        Ok(output) => Err(ConfigError::MissingTool(format!(
            "git --version failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
        Err(e) => Err(ConfigError::MissingTool(format!("git: {}", e))),
    }
}

/// A git working directory
#[derive(Debug, Clone)]
pub struct GitRepo {
    dir: PathBuf,
}

impl GitRepo {
    /// Wrap a working directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Whether the directory already holds a repository
    pub fn is_initialized(&self) -> bool {
        self.dir.join(".git").exists()
    }

    /// Run git and return its raw output, whatever the exit status
    async fn output(&self, args: &[&str]) -> Result<Output, CacheError> {
        let subcommand = args.first().copied().unwrap_or_default().to_string();
        debug!("git {} (in {})", subcommand, self.dir.display());

        let child = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output();

        tokio::select! {
            result = child => result.map_err(|e| CacheError::Git {
                command: subcommand.clone(),
                stderr: e.to_string(),
            }),
            _ = tokio::time::sleep(GIT_TIMEOUT) => Err(CacheError::Git {
                command: subcommand,
                stderr: format!("timed out after {}s", GIT_TIMEOUT.as_secs()),
            }),
        }
    }

    /// Run git and fail on a non-zero exit status
    async fn run(&self, args: &[&str]) -> Result<String, CacheError> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(CacheError::Git {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: redact(&String::from_utf8_lossy(&output.stderr)),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// `git init` with `branch` as the initial branch
    pub async fn init(&self, branch: &str) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;
        self.run(&["init", "--quiet"]).await?;
        // Older git lacks `init -b`, so point HEAD at the branch explicitly
        self.run(&["symbolic-ref", "HEAD", &format!("refs/heads/{}", branch)])
            .await?;
        Ok(())
    }

    /// Add or replace the `origin` remote
    pub async fn set_remote(&self, url: &str) -> Result<(), CacheError> {
        let existing = self.output(&["remote", "get-url", "origin"]).await?;
        if existing.status.success() {
            self.run(&["remote", "set-url", "origin", url]).await?;
        } else {
            self.run(&["remote", "add", "origin", url]).await?;
        }
        Ok(())
    }

    /// Shallow-fetch `branch` from origin; `false` when the remote branch does not exist
    pub async fn fetch_shallow(&self, branch: &str) -> Result<bool, CacheError> {
        let output = self
            .output(&["fetch", "--quiet", "--depth", "1", "origin", branch])
            .await?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("couldn't find remote ref") || stderr.contains("could not find remote ref") {
            debug!("Remote branch {} does not exist yet", branch);
            return Ok(false);
        }
        Err(CacheError::Git {
            command: "fetch".to_string(),
            stderr: redact(&stderr),
        })
    }

    /// Mixed reset to `FETCH_HEAD`: adopt the remote history, keep the working tree
    pub async fn reset_to_fetched(&self) -> Result<(), CacheError> {
        self.run(&["reset", "--quiet", "--mixed", "FETCH_HEAD"]).await?;
        Ok(())
    }

    /// Stage everything, deletions included
    pub async fn add_all(&self) -> Result<(), CacheError> {
        self.run(&["add", "--all"]).await?;
        Ok(())
    }

    /// Paths staged for the next commit
    pub async fn staged_files(&self) -> Result<Vec<String>, CacheError> {
        let stdout = self.run(&["diff", "--cached", "--name-only"]).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Commit staged changes with the cache author identity
    pub async fn commit(&self, message: &str) -> Result<(), CacheError> {
        let name = format!("user.name={}", COMMIT_NAME);
        let email = format!("user.email={}", COMMIT_EMAIL);
        self.run(&["-c", &name, "-c", &email, "commit", "--quiet", "-m", message])
            .await?;
        Ok(())
    }

    /// Push `HEAD` to `branch` on origin
    pub async fn push(&self, branch: &str, force: bool) -> Result<PushResult, CacheError> {
        let refspec = format!("HEAD:refs/heads/{}", branch);
        let mut args = vec!["push", "--quiet", "--porcelain"];
        if force {
            args.push("--force");
        }
        args.push("origin");
        args.push(&refspec);

        let output = self.output(&args).await?;
        if output.status.success() {
            return Ok(PushResult::Accepted);
        }

        let stderr = redact(&String::from_utf8_lossy(&output.stderr));
        let stdout = String::from_utf8_lossy(&output.stdout);
        let rejected = ["rejected", "non-fast-forward", "fetch first"]
            .iter()
            .any(|marker| stderr.contains(marker) || stdout.contains(marker));
        if rejected && !force {
            return Ok(PushResult::Rejected(stderr));
        }
        Err(CacheError::Git {
            command: "push".to_string(),
            stderr,
        })
    }
}

/// Strip credentials embedded in URLs from git output
fn redact(text: &str) -> String {
    CREDENTIALS_REGEX.replace_all(text.trim(), "$1***@").into_owned()
}
