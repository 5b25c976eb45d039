/*!
 * # SiteLingo - static site localization with AI
 *
 * A Rust library that translates the HTML pages of a built static site into
 * several languages through a chat-completion API, and keeps the results in
 * a content-addressed cache so unchanged pages are never translated twice.
 *
 * ## Features
 *
 * - Text extraction that leaves markup, scripts and styles untouched
 * - One API call per page and language, with numbered segment tags
 * - Integrity check through a hidden control sentinel
 * - Locale-aware link rewriting, canonical URLs and hreflang alternates
 * - Sitemap alternates for every localized page
 * - Translation cache stored on a git branch, or in a local directory
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `document`: HTML parsing, text extraction and reinsertion:
 *   - `document::collector`: Text span extraction and reinsertion
 *   - `document::tags`: Segment tag parsing
 *   - `document::links`: Locale-aware link rewriting
 *   - `document::hreflang`: Canonical and alternate links
 *   - `document::sitemap`: Sitemap alternates
 * - `translation`: Prompt rendering and the translation client
 * - `cache`: Translation cache stores:
 *   - `cache::branch`: Git branch store
 *   - `cache::local`: Local directory store
 * - `orchestrator`: Batched task scheduling for a run
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `providers`: Chat-completion clients
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod cache;
pub mod document;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod orchestrator;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use cache::{CacheState, CacheStore, GitBranchCache, LocalCache};
pub use document::{CONTROL_SENTINEL, Document, TextNodeCollector};
pub use errors::{CacheError, ConfigError, IntegrityError, ProviderError, TranslationError};
pub use file_utils::FileManager;
pub use language_utils::{get_language_name, normalize_locale};
pub use orchestrator::{Orchestrator, RunReport, RunSummary};
pub use translation::{PromptTemplate, TranslationClient};
