//! `<html lang>`, canonical URL and hreflang alternates.

use markup5ever_rcdom::{Handle, RcDom};
use url::Url;

use super::dom::{append_element, find_first, find_nodes, get_node_attr, set_node_attr};
use super::links::{localized_url, source_url};

/// hreflang value pointing at the unlocalized fallback
pub const X_DEFAULT: &str = "x-default";

/// One `rel="alternate"` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternate {
    /// Language code or `x-default`
    pub hreflang: String,
    /// Absolute URL of that version
    pub href: String,
}

/// Every alternate of a page: each target language, the source language and `x-default`
pub fn alternates_for(base: &Url, source_language: &str, targets: &[String], page_path: &str) -> Vec<Alternate> {
    let mut alternates: Vec<Alternate> = targets
        .iter()
        .map(|language| Alternate {
            hreflang: language.clone(),
            href: localized_url(base, language, page_path),
        })
        .collect();

    let original = source_url(base, page_path);
    alternates.push(Alternate {
        hreflang: source_language.to_string(),
        href: original.clone(),
    });
    alternates.push(Alternate {
        hreflang: X_DEFAULT.to_string(),
        href: original,
    });
    alternates
}

/// Set `<html lang>`
pub fn set_document_language(dom: &RcDom, language: &str) {
    if let Some(html) = find_first(&dom.document, "html") {
        set_node_attr(&html, "lang", Some(language.to_string()));
    }
}

/// Point `link[rel=canonical]` and `meta[property=og:url]` at `url`, creating them when absent
pub fn set_canonical(dom: &RcDom, url: &str) {
    let Some(head) = find_first(&dom.document, "head") else {
        return;
    };

    match find_link(&head, "canonical", None) {
        Some(link) => set_node_attr(&link, "href", Some(url.to_string())),
        None => {
            append_element(dom, &head, "link", &[("rel", "canonical"), ("href", url)]);
        }
    }

    let og_url = find_nodes(&head, "meta")
        .into_iter()
        .find(|meta| get_node_attr(meta, "property").as_deref() == Some("og:url"));
    match og_url {
        Some(meta) => set_node_attr(&meta, "content", Some(url.to_string())),
        None => {
            append_element(dom, &head, "meta", &[("property", "og:url"), ("content", url)]);
        }
    }
}

/// Merge alternates into `<head>`
///
/// Identical tags are left as they are; a tag with the same hreflang but a
/// different href is updated in place. Returns the number of tags added or changed.
pub fn merge_alternates(dom: &RcDom, alternates: &[Alternate]) -> usize {
    let Some(head) = find_first(&dom.document, "head") else {
        return 0;
    };

    let mut changed = 0;
    for alternate in alternates {
        match find_link(&head, "alternate", Some(&alternate.hreflang)) {
            Some(link) => {
                if get_node_attr(&link, "href").as_deref() != Some(alternate.href.as_str()) {
                    set_node_attr(&link, "href", Some(alternate.href.clone()));
                    changed += 1;
                }
            }
            None => {
                append_element(
                    dom,
                    &head,
                    "link",
                    &[
                        ("rel", "alternate"),
                        ("hreflang", &alternate.hreflang),
                        ("href", &alternate.href),
                    ],
                );
                changed += 1;
            }
        }
    }
    changed
}

fn find_link(head: &Handle, rel: &str, hreflang: Option<&str>) -> Option<Handle> {
    find_nodes(head, "link").into_iter().find(|link| {
        let rel_matches = get_node_attr(link, "rel")
            .map(|value| value.split_whitespace().any(|r| r.eq_ignore_ascii_case(rel)))
            .unwrap_or(false);
        let lang_matches = match hreflang {
            Some(expected) => get_node_attr(link, "hreflang")
                .map(|value| value.eq_ignore_ascii_case(expected))
                .unwrap_or(false),
            None => true,
        };
        rel_matches && lang_matches
    })
}
