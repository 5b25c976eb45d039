/*!
 * HTML document handling.
 *
 * This module contains everything that touches the parsed HTML tree:
 * - `dom`: query/mutation helpers over html5ever's `RcDom`
 * - `tags`: `[i]...[/i]` segment markers and the tolerant reply parser
 * - `collector`: span extraction and reinsertion
 * - `links`: same-origin link localization
 * - `hreflang`: `<html lang>`, canonical and alternate links
 * - `sitemap`: alternates in `sitemap.xml`
 *
 * Documents are kept as source text; every consumer parses its own tree so
 * `Rc`-based DOM values never leave the synchronous function that built them.
 */

use anyhow::Result;
use markup5ever_rcdom::RcDom;

pub mod collector;
pub mod dom;
pub mod hreflang;
pub mod links;
pub mod sitemap;
pub mod tags;

pub use collector::{ReinsertReport, SpanKind, SpanLocation, TextNodeCollector, TextSpan};

/// Token that must come back from the model unchanged
pub const CONTROL_SENTINEL: &str = "SLG_CTRL_7F3A9C";

/// Attribute marking the hidden sentinel element
const SENTINEL_ATTR: &str = "data-sitelingo-sentinel";

/// An HTML file of the site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the site root, with `/` separators
    pub relative_path: String,
    /// Raw HTML
    pub source: String,
}

impl Document {
    /// Create a document
    pub fn new(relative_path: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into().replace('\\', "/"),
            source: source.into(),
        }
    }

    /// Fresh parse of the source
    pub fn parse(&self) -> Result<RcDom> {
        dom::html_to_dom(&self.source)
    }

    /// URL path the document is served at
    ///
    /// `index.html` files map to their directory: `blog/index.html` is `/blog/`.
    pub fn url_path(&self) -> String {
        let path = self.relative_path.trim_start_matches('/');
        if path == "index.html" {
            return "/".to_string();
        }
        match path.strip_suffix("/index.html") {
            Some(dir) => format!("/{}/", dir),
            None => format!("/{}", path),
        }
    }
}

/// Append the hidden control sentinel to `<body>`
pub fn inject_sentinel(dom: &RcDom) {
    let parent = dom::find_first(&dom.document, "body").unwrap_or_else(|| dom.document.clone());
    let marker = dom::append_element(dom, &parent, "span", &[("hidden", ""), (SENTINEL_ATTR, "")]);
    dom::append_text(dom, &marker, CONTROL_SENTINEL);
}

/// Whether the sentinel element is present with its text unaltered
pub fn sentinel_intact(dom: &RcDom) -> bool {
    let markers = sentinel_nodes(dom);
    !markers.is_empty()
        && markers
            .iter()
            .all(|marker| dom::text_content(marker).trim() == CONTROL_SENTINEL)
}

/// Remove every sentinel element
pub fn remove_sentinel(dom: &RcDom) {
    for marker in sentinel_nodes(dom) {
        dom::remove_node(dom, &marker);
    }
}

fn sentinel_nodes(dom: &RcDom) -> Vec<markup5ever_rcdom::Handle> {
    dom::find_nodes(&dom.document, "span")
        .into_iter()
        .filter(|span| dom::get_node_attr(span, SENTINEL_ATTR).is_some())
        .collect()
}
