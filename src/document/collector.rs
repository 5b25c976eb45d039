/*!
 * Text extraction and reinsertion.
 *
 * Spans are collected in document order from three kinds of locations:
 * the `<title>` text, allow-listed `<meta content>` attributes, and every
 * other non-blank text node outside `script`, `style` and `noscript`.
 * Reinsertion walks a fresh parse of the same source with the identical
 * traversal, so span `i` always lands on the same slot it came from.
 */

use anyhow::{Result, anyhow};
use log::{debug, warn};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use sha2::{Digest, Sha256};

use super::dom::{get_node_attr, get_node_name, get_text, set_node_attr, set_text};
use super::tags::{self, TagIssue};

/// Elements whose contents are never translated
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript"];

/// `<meta name|property>` values whose `content` is translated
const TRANSLATABLE_META: &[&str] = &[
    "description",
    "og:title",
    "og:description",
    "twitter:title",
    "twitter:description",
];

/// Where a span lives in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Regular text node
    Body,
    /// `<title>` text
    Title,
    /// `content` attribute of a meta tag
    MetaAttr,
}

/// Stable reference to a span's slot within a parse of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanLocation {
    /// N-th extractable text node in traversal order
    TextNode {
        /// Position among text slots
        ordinal: usize,
    },
    /// Meta tag identified by its `name` or `property`
    MetaContent {
        /// The `name`/`property` value
        key: String,
    },
}

/// One translatable unit of a document
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// Position in document order, contiguous from 0
    pub index: usize,
    /// Kind of location
    pub kind: SpanKind,
    /// Slot reference
    pub location: SpanLocation,
    /// Text exactly as found in the source
    pub raw_text: String,
    /// Whitespace before the trimmed text
    pub leading_ws: String,
    /// Whitespace after the trimmed text
    pub trailing_ws: String,
    /// Trimmed text wrapped in index markers
    pub tagged_text: String,
}

impl TextSpan {
    fn new(index: usize, kind: SpanKind, location: SpanLocation, raw_text: String) -> Self {
        let core = raw_text.trim();
        let start = raw_text.len() - raw_text.trim_start().len();
        let end = raw_text.trim_end().len();
        Self {
            index,
            kind,
            location,
            leading_ws: raw_text[..start].to_string(),
            trailing_ws: raw_text[end..].to_string(),
            tagged_text: tags::tag(index, core),
            raw_text,
        }
    }

    /// Trimmed source text
    pub fn core_text(&self) -> &str {
        self.raw_text.trim()
    }

    /// Re-apply the original surrounding whitespace to a translation
    pub fn with_whitespace(&self, translated: &str) -> String {
        format!("{}{}{}", self.leading_ws, translated.trim(), self.trailing_ws)
    }
}

/// Outcome of writing a translated blob back into a document
#[derive(Debug, Default, Clone)]
pub struct ReinsertReport {
    /// Spans that received a translation
    pub applied: usize,
    /// Span indices that kept their original text
    pub missing: Vec<usize>,
    /// Marker problems found in the translated blob
    pub issues: Vec<TagIssue>,
}

impl ReinsertReport {
    /// Whether every span got its translation
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// A slot found by the shared traversal
struct Slot {
    kind: SpanKind,
    location: SpanLocation,
    node: Handle,
    text: String,
}

/// Extracts translatable spans and writes translations back
pub struct TextNodeCollector;

impl TextNodeCollector {
    /// Collect all translatable spans in document order
    pub fn extract(dom: &RcDom) -> Vec<TextSpan> {
        collect_slots(&dom.document)
            .into_iter()
            .enumerate()
            .map(|(index, slot)| TextSpan::new(index, slot.kind, slot.location, slot.text))
            .collect()
    }

    /// Join the tagged spans into a single blob
    pub fn build_blob(spans: &[TextSpan]) -> String {
        spans
            .iter()
            .map(|span| span.tagged_text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Hex SHA-256 of a blob
    pub fn content_hash(blob: &str) -> String {
        format!("{:x}", Sha256::digest(blob.as_bytes()))
    }

    /// Write a translated blob into `dom`, which must be a fresh parse of the
    /// document the spans were extracted from.
    pub fn reinsert(dom: &RcDom, translated_blob: &str, spans: &[TextSpan]) -> Result<ReinsertReport> {
        let slots = collect_slots(&dom.document);
        if slots.len() != spans.len() {
            return Err(anyhow!(
                "Document has {} translatable slots but {} spans were extracted",
                slots.len(),
                spans.len()
            ));
        }

        let parsed = tags::parse_segments(translated_blob, spans.len());
        let mut report = ReinsertReport {
            issues: parsed.issues.clone(),
            ..Default::default()
        };

        for (span, slot) in spans.iter().zip(slots.iter()) {
            if slot.location != span.location {
                return Err(anyhow!(
                    "Slot {} moved from {:?} to {:?}",
                    span.index,
                    span.location,
                    slot.location
                ));
            }

            let translated = parsed.get(span.index).filter(|text| !text.trim().is_empty());

            match translated {
                Some(text) => {
                    write_slot(slot, &span.with_whitespace(text));
                    report.applied += 1;
                }
                None => report.missing.push(span.index),
            }
        }

        if !report.missing.is_empty() {
            warn!(
                "{} of {} spans had no usable translation and keep their source text: {:?}",
                report.missing.len(),
                spans.len(),
                report.missing
            );
        }
        if !report.issues.is_empty() {
            debug!("Malformed markers in translated blob: {:?}", report.issues);
        }

        Ok(report)
    }
}

fn write_slot(slot: &Slot, text: &str) {
    match slot.kind {
        SpanKind::MetaAttr => set_node_attr(&slot.node, "content", Some(text.to_string())),
        SpanKind::Body | SpanKind::Title => set_text(&slot.node, text),
    }
}

fn collect_slots(root: &Handle) -> Vec<Slot> {
    let mut slots = Vec::new();
    let mut ordinal = 0;
    walk(root, false, &mut ordinal, &mut slots);
    slots
}

fn walk(node: &Handle, in_title: bool, ordinal: &mut usize, slots: &mut Vec<Slot>) {
    match &node.data {
        NodeData::Element { .. } => {
            let name = get_node_name(node).unwrap_or_default();
            if SKIPPED_ELEMENTS.contains(&name) {
                return;
            }
            if name == "meta" {
                if let Some(slot) = meta_slot(node) {
                    slots.push(slot);
                }
                return;
            }
            let in_title = in_title || name == "title";
            for child in node.children.borrow().iter() {
                walk(child, in_title, ordinal, slots);
            }
        }
        NodeData::Text { .. } => {
            let Some(text) = get_text(node) else { return };
            if text.trim().is_empty() {
                return;
            }
            slots.push(Slot {
                kind: if in_title { SpanKind::Title } else { SpanKind::Body },
                location: SpanLocation::TextNode { ordinal: *ordinal },
                node: node.clone(),
                text,
            });
            *ordinal += 1;
        }
        NodeData::Document => {
            for child in node.children.borrow().iter() {
                walk(child, in_title, ordinal, slots);
            }
        }
        _ => {}
    }
}

fn meta_slot(node: &Handle) -> Option<Slot> {
    let key = ["name", "property"]
        .iter()
        .filter_map(|attr| get_node_attr(node, attr))
        .find(|value| TRANSLATABLE_META.contains(&value.to_ascii_lowercase().as_str()))?;
    let content = get_node_attr(node, "content")?;
    if content.trim().is_empty() {
        return None;
    }
    Some(Slot {
        kind: SpanKind::MetaAttr,
        location: SpanLocation::MetaContent { key },
        node: node.clone(),
        text: content,
    })
}
