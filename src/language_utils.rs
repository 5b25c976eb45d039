//! Language utilities for site locale handling
//!
//! Site locales are BCP 47-ish tags such as `es`, `pt-BR` or `zh-Hant`. The
//! primary subtag must be an ISO 639-1 (2-letter) or ISO 639-3 (3-letter) code;
//! the remaining subtags are carried through untouched.

use anyhow::{Result, anyhow};
use isolang::Language;

/// Split a locale into its primary language subtag and the optional rest
pub fn split_locale(code: &str) -> (String, Option<String>) {
    let trimmed = code.trim();
    match trimmed.split_once(['-', '_']) {
        Some((primary, rest)) if !rest.is_empty() => {
            (primary.to_lowercase(), Some(rest.to_string()))
        }
        _ => (trimmed.trim_end_matches(['-', '_']).to_lowercase(), None),
    }
}

/// Look up the ISO language for the primary subtag of a locale
fn lookup_language(code: &str) -> Option<Language> {
    let (primary, _) = split_locale(code);
    match primary.len() {
        2 => Language::from_639_1(&primary),
        3 => Language::from_639_3(&primary),
        _ => None,
    }
}

/// Validate that a locale starts with a known ISO 639 language code
pub fn validate_language_code(code: &str) -> Result<()> {
    lookup_language(code)
        .map(|_| ())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Normalize a locale for use in URLs and cache keys (`pt_BR` -> `pt-br`)
pub fn normalize_locale(code: &str) -> String {
    match split_locale(code) {
        (primary, Some(rest)) => format!("{}-{}", primary, rest.replace('_', "-").to_lowercase()),
        (primary, None) => primary,
    }
}

/// Get the English language name for a locale, keeping any region subtag
pub fn get_language_name(code: &str) -> Result<String> {
    let lang = lookup_language(code)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;

    let name = lang.to_name().to_string();
    match split_locale(code) {
        (_, Some(rest)) => Ok(format!("{} ({})", name, rest.to_uppercase())),
        (_, None) => Ok(name),
    }
}
