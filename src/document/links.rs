//! Rewrites same-origin hyperlinks of a localized page to the locale root.

use log::debug;
use markup5ever_rcdom::RcDom;
use regex::Regex;
use url::Url;

use super::dom::{find_nodes, get_node_attr, set_node_attr};

/// Schemes and prefixes that are never rewritten
const SKIPPED_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:", "data:"];

/// Rewrites links for a single target language
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    base: Url,
    language: String,
    locale_roots: Vec<String>,
    ignore_patterns: Vec<Regex>,
}

impl LinkRewriter {
    /// Create a rewriter
    ///
    /// # Arguments
    /// * `base` - Canonical site origin, e.g. `https://example.com`
    /// * `language` - Target language code used as the path prefix
    /// * `locale_roots` - Every configured target language; links already under
    ///   one of these roots are left alone
    /// * `ignore_patterns` - Links matching any of these are left alone
    pub fn new(
        base: Url,
        language: impl Into<String>,
        locale_roots: Vec<String>,
        ignore_patterns: Vec<Regex>,
    ) -> Self {
        Self {
            base,
            language: language.into(),
            locale_roots,
            ignore_patterns,
        }
    }

    /// Rewrite every `<a href>` in the document, returning the number changed
    ///
    /// `page_path` is the URL path of the document, used to resolve relative links.
    pub fn rewrite_dom(&self, dom: &RcDom, page_path: &str) -> usize {
        let page_url = self.base.join(page_path).unwrap_or_else(|_| self.base.clone());
        let mut rewritten = 0;

        for anchor in find_nodes(&dom.document, "a") {
            let Some(href) = get_node_attr(&anchor, "href") else {
                continue;
            };
            if let Some(localized) = self.rewrite_href(&page_url, &href) {
                set_node_attr(&anchor, "href", Some(localized));
                rewritten += 1;
            }
        }

        debug!("Rewrote {} links on {} for {}", rewritten, page_path, self.language);
        rewritten
    }

    /// Localized form of `href`, or `None` when the link must stay untouched
    pub fn rewrite_href(&self, page_url: &Url, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        let lowered = href.to_ascii_lowercase();
        if SKIPPED_PREFIXES.iter().any(|prefix| lowered.starts_with(prefix)) {
            return None;
        }

        let resolved = page_url.join(href).ok()?;
        if !matches!(resolved.scheme(), "http" | "https") {
            return None;
        }
        if resolved.origin() != self.base.origin() {
            return None;
        }

        let path = resolved.path();
        if self
            .ignore_patterns
            .iter()
            .any(|pattern| pattern.is_match(href) || pattern.is_match(path) || pattern.is_match(resolved.as_str()))
        {
            return None;
        }
        if self.is_localized(path) {
            return None;
        }

        let mut localized = localized_url(&self.base, &self.language, path);
        if let Some(query) = resolved.query() {
            localized.push('?');
            localized.push_str(query);
        }
        if let Some(fragment) = resolved.fragment() {
            localized.push('#');
            localized.push_str(fragment);
        }
        Some(localized)
    }

    fn is_localized(&self, path: &str) -> bool {
        self.locale_roots.iter().any(|root| {
            let prefix = format!("/{}", root);
            path == prefix || path.starts_with(&format!("{}/", prefix))
        })
    }
}

/// Origin of a base URL without a trailing slash
pub fn site_origin(base: &Url) -> String {
    base.origin().ascii_serialization()
}

/// Absolute URL of `path` on the unlocalized site
pub fn source_url(base: &Url, path: &str) -> String {
    format!("{}{}", site_origin(base), ensure_leading_slash(path))
}

/// Absolute URL of `path` under the locale root of `language`
pub fn localized_url(base: &Url, language: &str, path: &str) -> String {
    format!("{}/{}{}", site_origin(base), language, ensure_leading_slash(path))
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
