//! hreflang alternates in `sitemap.xml`.
//!
//! The sitemap is edited as text: each `<url>` block whose `<loc>` matches a
//! page receives `<xhtml:link rel="alternate" .../>` children.

use once_cell::sync::Lazy;
use regex::Regex;

use super::hreflang::Alternate;

const XHTML_NAMESPACE: &str = r#"xmlns:xhtml="http://www.w3.org/1999/xhtml""#;

static URL_BLOCK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<url>(.*?)</url>").expect("Invalid url block regex"));

static LOC_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<loc>\s*(.*?)\s*</loc>").expect("Invalid loc regex"));

static ALTERNATE_LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<xhtml:link\s+rel="alternate"\s+hreflang="([^"]*)"\s+href="([^"]*)"\s*/>"#)
        .expect("Invalid alternate link regex")
});

static URLSET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<urlset\b[^>]*>").expect("Invalid urlset regex"));

/// In-memory sitemap document
#[derive(Debug, Clone)]
pub struct Sitemap {
    xml: String,
}

impl Sitemap {
    /// Wrap sitemap XML
    pub fn new(xml: impl Into<String>) -> Self {
        Self { xml: xml.into() }
    }

    /// Current XML text
    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Consume into XML text
    pub fn into_string(self) -> String {
        self.xml
    }

    /// Merge alternates into the `<url>` entry whose `<loc>` equals `page_url`
    ///
    /// Returns the number of links added or updated. Pages without an entry are
    /// left alone.
    pub fn merge_alternates(&mut self, page_url: &str, alternates: &[Alternate]) -> usize {
        let mut changed = 0;
        let mut rebuilt = String::with_capacity(self.xml.len());
        let mut cursor = 0;

        for block in URL_BLOCK_REGEX.captures_iter(&self.xml) {
            let (Some(whole), Some(inner)) = (block.get(0), block.get(1)) else {
                continue;
            };
            let matches_page = LOC_REGEX
                .captures(inner.as_str())
                .map(|loc| unescape(&loc[1]) == page_url)
                .unwrap_or(false);
            if !matches_page {
                continue;
            }

            let (merged, count) = merge_into_block(inner.as_str(), alternates);
            if count == 0 {
                continue;
            }
            rebuilt.push_str(&self.xml[cursor..whole.start()]);
            rebuilt.push_str("<url>");
            rebuilt.push_str(&merged);
            rebuilt.push_str("</url>");
            cursor = whole.end();
            changed += count;
        }

        if changed > 0 {
            rebuilt.push_str(&self.xml[cursor..]);
            self.xml = ensure_xhtml_namespace(&rebuilt);
        }
        changed
    }
}

fn merge_into_block(inner: &str, alternates: &[Alternate]) -> (String, usize) {
    let mut block = inner.to_string();
    let mut changed = 0;

    for alternate in alternates {
        let href = escape(&alternate.href);
        let wanted = format!(
            r#"<xhtml:link rel="alternate" hreflang="{}" href="{}"/>"#,
            alternate.hreflang, href
        );

        let existing = ALTERNATE_LINK_REGEX
            .captures_iter(&block)
            .find(|caps| caps[1].eq_ignore_ascii_case(&alternate.hreflang))
            .and_then(|caps| caps.get(0).map(|m| (m.range(), caps[2].to_string())));

        match existing {
            Some((_, current)) if current == href => {}
            Some((range, _)) => {
                block.replace_range(range, &wanted);
                changed += 1;
            }
            None => {
                let trimmed = block.trim_end().len();
                let indent = block[..trimmed]
                    .rfind('\n')
                    .map(|newline| {
                        block[newline + 1..]
                            .chars()
                            .take_while(|c| c.is_whitespace())
                            .collect::<String>()
                    })
                    .unwrap_or_default();
                block.insert_str(trimmed, &format!("\n{}{}", indent, wanted));
                changed += 1;
            }
        }
    }

    (block, changed)
}

fn ensure_xhtml_namespace(xml: &str) -> String {
    if xml.contains(XHTML_NAMESPACE) {
        return xml.to_string();
    }
    match URLSET_REGEX.find(xml) {
        Some(urlset) => {
            let open = urlset.as_str();
            let (head, self_closing) = match open.strip_suffix("/>") {
                Some(head) => (head, true),
                None => (open.trim_end_matches('>'), false),
            };
            let replaced = format!(
                "{} {}{}",
                head.trim_end(),
                XHTML_NAMESPACE,
                if self_closing { "/>" } else { ">" }
            );
            format!("{}{}{}", &xml[..urlset.start()], replaced, &xml[urlset.end()..])
        }
        None => xml.to_string(),
    }
}

fn escape(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn unescape(value: &str) -> String {
    value.replace("&quot;", "\"").replace("&amp;", "&")
}
