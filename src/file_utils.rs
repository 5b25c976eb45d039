use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::document::Document;
use crate::orchestrator::RunReport;

// @module: Site file discovery and output

// @struct: File operations utility
pub struct FileManager;

/// Counts of files written for a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WrittenFiles {
    /// Localized pages
    pub pages: usize,
    /// Source pages rewritten with alternates
    pub originals: usize,
    /// Whether the sitemap was rewritten
    pub sitemap: bool,
}

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Find HTML files under a site root, skipping locale output directories
    ///
    /// Paths are returned relative to `site_dir`, with `/` separators, sorted.
    pub fn discover_documents<P: AsRef<Path>>(site_dir: P, locale_dirs: &[String]) -> Result<Vec<Document>> {
        let site_dir = site_dir.as_ref();
        if !Self::dir_exists(site_dir) {
            return Err(anyhow::anyhow!("Site directory does not exist: {:?}", site_dir));
        }

        let walker = WalkDir::new(site_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                if name.starts_with('.') {
                    return false;
                }
                // Skip previously generated locale trees at the site root
                !(entry.depth() == 1
                    && entry.file_type().is_dir()
                    && locale_dirs.iter().any(|l| l.eq_ignore_ascii_case(&name)))
            });

        let mut documents = Vec::new();
        for entry in walker {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            let is_html = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
                .unwrap_or(false);
            if !path.is_file() || !is_html {
                continue;
            }

            let relative = relative_slash_path(site_dir, path)?;
            let source = Self::read_to_string(path)?;
            documents.push(Document::new(relative, source));
        }

        debug!("Discovered {} HTML documents in {:?}", documents.len(), site_dir);
        Ok(documents)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Read an optional file, `None` when it does not exist
    pub fn read_optional<P: AsRef<Path>>(path: P) -> Result<Option<String>> {
        if Self::file_exists(&path) {
            Self::read_to_string(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;
        Ok(())
    }

    // @generates: Output path of a localized page
    pub fn localized_path<P: AsRef<Path>>(site_dir: P, language: &str, relative_path: &str) -> PathBuf {
        let mut path = site_dir.as_ref().join(language);
        for part in relative_path.split('/').filter(|p| !p.is_empty() && *p != "..") {
            path.push(part);
        }
        path
    }

    /// Write everything a run produced back into the site
    pub fn write_report<P: AsRef<Path>>(site_dir: P, sitemap_path: &str, report: &RunReport) -> Result<WrittenFiles> {
        let site_dir = site_dir.as_ref();
        let mut written = WrittenFiles::default();

        for (language, relative_path, html) in report.pages() {
            Self::write_to_file(Self::localized_path(site_dir, language, relative_path), html)?;
            written.pages += 1;
        }

        for original in &report.originals {
            let path = site_dir.join(&original.relative_path);
            // Only touch files whose content actually changed
            if Self::read_optional(&path)?.as_deref() != Some(original.source.as_str()) {
                Self::write_to_file(&path, &original.source)?;
                written.originals += 1;
            }
        }

        if let Some(sitemap) = &report.sitemap {
            Self::write_to_file(site_dir.join(sitemap_path), sitemap)?;
            written.sitemap = true;
        }

        info!(
            "Wrote {} localized pages, updated {} originals{}",
            written.pages,
            written.originals,
            if written.sitemap { " and the sitemap" } else { "" }
        );
        Ok(written)
    }
}

fn relative_slash_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{:?} is outside {:?}", path, root))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/"))
}
