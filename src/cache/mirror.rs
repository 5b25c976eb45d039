/*!
 * Local mirror of the cache branch.
 *
 * Layout:
 * - `<root>/<lang>/meta.json`: per-language metadata
 * - `<root>/<lang>/pages/<relative path>`: translated blob of one document
 * - `<root>/README.md`: human-readable statistics
 *
 * The mirror directory doubles as the git working directory when the cache
 * is backed by a branch.
 */

use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use super::meta::PerLanguageMeta;
use crate::errors::CacheError;

/// Metadata file name inside each language directory
pub const META_FILE: &str = "meta.json";
/// Statistics file at the mirror root
pub const README_FILE: &str = "README.md";
/// Directory holding translated blobs inside each language directory
pub const PAGES_DIR: &str = "pages";

/// Cache mirror directory
#[derive(Debug, Clone)]
pub struct Mirror {
    root: PathBuf,
}

impl Mirror {
    /// Create a mirror rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Mirror root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mirror-relative key of an artifact, `<lang>/pages/<relative path>`
    pub fn artifact_key(language: &str, relative_path: &str) -> String {
        let relative: Vec<&str> = normal_components(relative_path);
        format!("{}/{}/{}", language, PAGES_DIR, relative.join("/"))
    }

    /// Absolute path of an artifact
    pub fn artifact_path(&self, language: &str, relative_path: &str) -> PathBuf {
        let mut path = self.root.join(language).join(PAGES_DIR);
        for component in normal_components(relative_path) {
            path.push(component);
        }
        path
    }

    /// Absolute path of a language's metadata file
    pub fn meta_path(&self, language: &str) -> PathBuf {
        self.root.join(language).join(META_FILE)
    }

    /// Read a cached translated blob
    pub fn read_artifact(&self, language: &str, relative_path: &str) -> Result<Option<String>, CacheError> {
        let path = self.artifact_path(language, relative_path);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Write a translated blob
    pub fn write_artifact(&self, language: &str, relative_path: &str, content: &str) -> Result<(), CacheError> {
        let path = self.artifact_path(language, relative_path);
        write_file(&path, content.as_bytes())
    }

    /// Load metadata, discarding entries produced with a different prompt
    pub fn read_meta(&self, language: &str, prompt_hash: &str) -> Result<PerLanguageMeta, CacheError> {
        let path = self.meta_path(language);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PerLanguageMeta::new(prompt_hash));
            }
            Err(e) => return Err(CacheError::io(&path, e)),
        };

        let meta: PerLanguageMeta = match serde_json::from_str(&content) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Ignoring unreadable cache metadata {}: {}", path.display(), e);
                return Ok(PerLanguageMeta::new(prompt_hash));
            }
        };

        if meta.prompt_hash != prompt_hash {
            info!(
                "Prompt changed for {}, discarding {} cached entries",
                language,
                meta.entries.len()
            );
            return Ok(PerLanguageMeta::new(prompt_hash));
        }
        Ok(meta)
    }

    /// Persist metadata
    pub fn write_meta(&self, language: &str, meta: &PerLanguageMeta) -> Result<(), CacheError> {
        let path = self.meta_path(language);
        let json = serde_json::to_string_pretty(meta).map_err(|e| CacheError::Metadata {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        write_file(&path, format!("{}\n", json).as_bytes())
    }

    /// Language directories present in the mirror, sorted
    pub fn languages(&self) -> Result<Vec<String>, CacheError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.root, e)),
        };

        let mut languages: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect();
        languages.sort();
        Ok(languages)
    }

    /// Delete every artifact whose key is not in `valid_keys`
    ///
    /// `meta.json` files and the root `README.md` are never removed; empty
    /// directories left behind are pruned. Returns the number of files deleted.
    pub fn sweep_orphans(&self, valid_keys: &HashSet<String>) -> Result<usize, CacheError> {
        if !self.root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git");

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(key) = self.relative_key(entry.path()) else {
                continue;
            };
            if is_protected(&key) || valid_keys.contains(&key) {
                continue;
            }
            debug!("Removing orphaned cache file {}", key);
            fs::remove_file(entry.path()).map_err(|e| CacheError::io(entry.path(), e))?;
            removed += 1;
        }

        self.prune_empty_dirs()?;
        if removed > 0 {
            info!("Removed {} orphaned cache files", removed);
        }
        Ok(removed)
    }

    /// README text reflecting the current metadata
    pub fn readme_content(&self) -> Result<String, CacheError> {
        let mut rows = Vec::new();
        let mut total_artifacts = 0;

        for language in self.languages()? {
            let meta_path = self.meta_path(&language);
            let (ok, failed) = match fs::read_to_string(&meta_path) {
                Ok(content) => serde_json::from_str::<PerLanguageMeta>(&content)
                    .map(|meta| meta.counts())
                    .unwrap_or((0, 0)),
                Err(_) => (0, 0),
            };
            let artifacts = count_files(&self.root.join(&language).join(PAGES_DIR));
            total_artifacts += artifacts;
            rows.push(format!("| {} | {} | {} | {} |", language, ok, failed, artifacts));
        }

        let mut readme = String::from(
            "# Translation cache\n\n\
             This branch is maintained automatically. It stores translated page\n\
             blobs keyed by language and page path.\n\n",
        );
        if rows.is_empty() {
            readme.push_str("No languages cached yet.\n");
        } else {
            readme.push_str("| Language | Translated | Failed | Artifacts |\n");
            readme.push_str("|----------|------------|--------|-----------|\n");
            for row in rows {
                readme.push_str(&row);
                readme.push('\n');
            }
            readme.push_str(&format!("\nTotal artifacts: {}\n", total_artifacts));
        }
        Ok(readme)
    }

    /// Rewrite README.md when its content changed; returns whether it was written
    pub fn refresh_readme(&self) -> Result<bool, CacheError> {
        let content = self.readme_content()?;
        let path = self.root.join(README_FILE);
        if fs::read_to_string(&path).ok().as_deref() == Some(content.as_str()) {
            return Ok(false);
        }
        write_file(&path, content.as_bytes())?;
        Ok(true)
    }

    /// Remove everything in the mirror, including any git metadata
    pub fn clear(&self) -> Result<(), CacheError> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(|e| CacheError::io(&self.root, e))?;
        }
        fs::create_dir_all(&self.root).map_err(|e| CacheError::io(&self.root, e))
    }

    /// Replace the mirror with the contents of a zip snapshot
    ///
    /// Archives produced by the hosting API wrap everything in a single
    /// `<owner>-<repo>-<sha>/` folder, which is stripped.
    pub fn extract_snapshot(&self, bytes: &[u8]) -> Result<usize, CacheError> {
        let mut archive =
            zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| CacheError::Snapshot(e.to_string()))?;
        self.clear()?;

        let mut extracted = 0;
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| CacheError::Snapshot(e.to_string()))?;
            if !entry.is_file() {
                continue;
            }
            let Some(name) = entry.enclosed_name() else {
                warn!("Skipping unsafe snapshot entry {}", entry.name());
                continue;
            };
            let relative: PathBuf = name.components().skip(1).collect();
            if relative.as_os_str().is_empty() {
                continue;
            }

            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut buf)
                .map_err(|e| CacheError::Snapshot(e.to_string()))?;
            write_file(&self.root.join(relative), &buf)?;
            extracted += 1;
        }

        debug!("Extracted {} files into {}", extracted, self.root.display());
        Ok(extracted)
    }

    fn relative_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Some(parts.join("/"))
    }

    fn prune_empty_dirs(&self) -> Result<(), CacheError> {
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git");

        for entry in walker.filter_map(|e| e.ok()) {
            if entry.file_type().is_dir() {
                let is_empty = fs::read_dir(entry.path())
                    .map(|mut dir| dir.next().is_none())
                    .unwrap_or(false);
                if is_empty {
                    fs::remove_dir(entry.path()).map_err(|e| CacheError::io(entry.path(), e))?;
                }
            }
        }
        Ok(())
    }
}

fn is_protected(key: &str) -> bool {
    key == README_FILE || key.rsplit('/').next() == Some(META_FILE)
}

fn normal_components(relative_path: &str) -> Vec<&str> {
    Path::new(relative_path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect()
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| CacheError::io(path, e))
}
