/*!
 * Segment markers for document blobs.
 *
 * Every extracted span travels to the model as `[i]text[/i]`. Replies are read
 * back with a stack-based matcher so nested or partially broken markers still
 * yield as many segments as possible:
 *
 * - `[n]` opens a segment, `[/n]` closes the innermost open segment `n`
 * - text inside a nested segment belongs only to that nested segment
 * - `[n]` is literal text when `n` is out of range, already open, or already
 *   closed while another segment is open (footnote refs such as `[1]`)
 * - a close whose index is not open is kept as literal text
 * - a segment left open when an outer segment closes is folded back into
 *   that outer segment as literal text; at end of input the outermost
 *   unclosed segment is dropped
 * - when an index appears twice, the first closed occurrence wins
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(/?)(\d{1,6})\]").expect("Invalid marker regex"));

/// Wrap span text in its index markers
pub fn tag(index: usize, text: &str) -> String {
    format!("[{}]{}[/{}]", index, text, index)
}

/// Problems noticed while reading a translated blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagIssue {
    /// Segment opened but never closed
    Unclosed(usize),
    /// Close marker with no matching open marker
    StrayClose(usize),
    /// Segment index seen more than once
    Duplicate(usize),
}

/// Result of reading a translated blob
#[derive(Debug, Default, Clone)]
pub struct ParsedSegments {
    /// Segment text by span index, untrimmed
    pub segments: HashMap<usize, String>,
    /// Malformed marker diagnostics
    pub issues: Vec<TagIssue>,
}

impl ParsedSegments {
    /// Text for a span index
    pub fn get(&self, index: usize) -> Option<&str> {
        self.segments.get(&index).map(String::as_str)
    }
}

/// A segment opened but not yet closed
struct OpenSegment<'a> {
    index: usize,
    marker: &'a str,
    text: String,
}

fn push_text(stack: &mut [OpenSegment<'_>], text: &str) {
    if let Some(open) = stack.last_mut() {
        open.text.push_str(text);
    }
}

/// Pop the innermost open segment and hand its marker and text back to its parent
fn fold_unclosed(stack: &mut Vec<OpenSegment<'_>>, issues: &mut Vec<TagIssue>) {
    let Some(unclosed) = stack.pop() else { return };
    issues.push(TagIssue::Unclosed(unclosed.index));
    if let Some(parent) = stack.last_mut() {
        parent.text.push_str(unclosed.marker);
        parent.text.push_str(&unclosed.text);
    }
}

/// Read `[i]...[/i]` segments out of a translated blob of `span_count` spans
pub fn parse_segments(blob: &str, span_count: usize) -> ParsedSegments {
    let mut parsed = ParsedSegments::default();
    let mut stack: Vec<OpenSegment<'_>> = Vec::new();
    let mut cursor = 0;

    for caps in MARKER_REGEX.captures_iter(blob) {
        let Some(marker) = caps.get(0) else { continue };
        push_text(&mut stack, &blob[cursor..marker.start()]);
        cursor = marker.end();

        let Ok(index) = caps[2].parse::<usize>() else {
            push_text(&mut stack, marker.as_str());
            continue;
        };
        let closing = !caps[1].is_empty();

        if !closing {
            // `[n]` inside a segment is page text unless it can still start a real segment
            let literal = index >= span_count
                || stack.iter().any(|open| open.index == index)
                || (!stack.is_empty() && parsed.segments.contains_key(&index));
            if literal {
                push_text(&mut stack, marker.as_str());
            } else {
                stack.push(OpenSegment {
                    index,
                    marker: marker.as_str(),
                    text: String::new(),
                });
            }
            continue;
        }

        match stack.iter().rposition(|open| open.index == index) {
            Some(position) => {
                while stack.len() > position + 1 {
                    fold_unclosed(&mut stack, &mut parsed.issues);
                }
                if let Some(closed) = stack.pop() {
                    if parsed.segments.contains_key(&closed.index) {
                        parsed.issues.push(TagIssue::Duplicate(closed.index));
                    } else {
                        parsed.segments.insert(closed.index, closed.text);
                    }
                }
            }
            None => {
                push_text(&mut stack, marker.as_str());
                parsed.issues.push(TagIssue::StrayClose(index));
            }
        }
    }

    push_text(&mut stack, &blob[cursor..]);
    while !stack.is_empty() {
        fold_unclosed(&mut stack, &mut parsed.issues);
    }

    parsed
}
