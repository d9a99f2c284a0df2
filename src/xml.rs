// src/xml.rs

//! Namespace-agnostic lookups over a parsed document.
//!
//! Invoices arrive from several upstream systems, some with a default
//! namespace, some with prefixes, some with none. Every lookup here compares
//! the element's local name only. Parent links come from the tree itself, so
//! "is my parent a `Charge`" is a constant-time check.

use crate::error::Result;
use roxmltree::{Document, Node, ParsingOptions};

/// Parse decoded text into a tree. A leading BOM is tolerated.
pub fn parse(text: &str) -> Result<Document<'_>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Ok(Document::parse_with_options(text, options)?)
}

pub fn is_named(node: Node<'_, '_>, local_name: &str) -> bool {
    node.is_element() && node.tag_name().name() == local_name
}

/// All elements at or below `root` with the given local name, document order.
pub fn named<'a, 'input: 'a>(
    root: Node<'a, 'input>,
    local_name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    root.descendants().filter(move |n| is_named(*n, local_name))
}

/// Direct element children with the given local name.
pub fn children_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    local_name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| is_named(*n, local_name))
}

pub fn parent_is(node: Node<'_, '_>, local_name: &str) -> bool {
    node.parent_element()
        .is_some_and(|parent| is_named(parent, local_name))
}

/// Leading text of an element, `None` when empty.
pub fn text_of<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.text().filter(|t| !t.is_empty())
}
