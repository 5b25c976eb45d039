//! Thin tree-query/mutation layer over html5ever's `RcDom`.
//!
//! Extraction, reinsertion and link/meta rewriting are expressed purely
//! against these helpers.

use anyhow::{Context, Result};
use html5ever::serialize::{SerializeOpts, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{NodeOrText, TreeSink, create_element};
use html5ever::{Attribute, LocalName, QualName, namespace_url, ns, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

/// Parse an HTML document
pub fn html_to_dom(source: &str) -> Result<RcDom> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut source.as_bytes())
        .context("Failed to parse HTML document")
}

/// Serialize a whole document back to HTML
pub fn serialize_dom(dom: &RcDom) -> Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = dom.document.clone().into();
    serialize(&mut buf, &serializable, SerializeOpts::default())
        .context("Unable to serialize DOM into buffer")?;
    String::from_utf8(buf).context("Serialized DOM is not valid UTF-8")
}

/// Get the local tag name of an element
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// Get an attribute value
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// Set, replace, or (with `None`) remove an attribute
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();

        match attr_value {
            Some(value) => {
                if let Some(existing) = attrs_mut
                    .iter_mut()
                    .find(|attr| &*attr.name.local == attr_name)
                {
                    existing.value = StrTendril::from_slice(&value);
                } else {
                    attrs_mut.push(Attribute {
                        name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                        value: StrTendril::from_slice(&value),
                    });
                }
            }
            None => attrs_mut.retain(|attr| &*attr.name.local != attr_name),
        }
    }
}

/// Replace the contents of a text node
pub fn set_text(node: &Handle, text: &str) {
    if let NodeData::Text { contents } = &node.data {
        *contents.borrow_mut() = StrTendril::from_slice(text);
    }
}

/// Text contents of a text node
pub fn get_text(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// Concatenated text of all descendant text nodes
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    if let Some(text) = get_text(node) {
        out.push_str(&text);
    }
    for child in node.children.borrow().iter() {
        out.push_str(&text_content(child));
    }
    out
}

/// Find all elements with the given tag name, in document order
pub fn find_nodes(node: &Handle, tag_name: &str) -> Vec<Handle> {
    let mut found = Vec::new();
    collect_nodes(node, tag_name, &mut found);
    found
}

fn collect_nodes(node: &Handle, tag_name: &str, found: &mut Vec<Handle>) {
    if get_node_name(node) == Some(tag_name) {
        found.push(node.clone());
    }
    for child in node.children.borrow().iter() {
        collect_nodes(child, tag_name, found);
    }
}

/// First element with the given tag name
pub fn find_first(node: &Handle, tag_name: &str) -> Option<Handle> {
    find_nodes(node, tag_name).into_iter().next()
}

/// Create an element and append it to `parent`
pub fn append_element(dom: &RcDom, parent: &Handle, tag_name: &str, attrs: &[(&str, &str)]) -> Handle {
    let attributes = attrs
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: StrTendril::from_slice(value),
        })
        .collect();

    let element = create_element(
        dom,
        QualName::new(None, ns!(html), LocalName::from(tag_name)),
        attributes,
    );
    dom.append(parent, NodeOrText::AppendNode(element.clone()));
    element
}

/// Append a text node to `parent`
pub fn append_text(dom: &RcDom, parent: &Handle, text: &str) {
    dom.append(parent, NodeOrText::AppendText(StrTendril::from_slice(text)));
}

/// Detach a node from its parent
pub fn remove_node(dom: &RcDom, node: &Handle) {
    dom.remove_from_parent(node);
}
