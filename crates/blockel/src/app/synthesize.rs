//! Selector synthesis for picked elements.

use crate::domain::dom::{Document, NodeId};
use crate::domain::query::{escape_identifier, type_position};

/// Class tokens considered by the tag+class tier.
const MAX_ELEMENT_CLASSES: usize = 3;
/// Class tokens considered for each path segment.
const MAX_SEGMENT_CLASSES: usize = 2;

/// Derives a selector that matches the given element in the document as it is now.
///
/// Tiers are tried in order and the first selector matching exactly one element
/// wins: the element id, its tag plus leading classes, then a ` > ` chain built
/// from the element up towards (but excluding) the root element. When no tier is
/// unique the full chain is returned as a best effort.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectorSynthesizer;

impl SelectorSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(&self, doc: &Document, element: NodeId) -> String {
        if let Some(selector) = unique_id_selector(doc, element) {
            return selector;
        }

        let tag = tag_of(doc, element);
        let classes = class_suffix(doc, element, MAX_ELEMENT_CLASSES);
        if !classes.is_empty() {
            let selector = format!("{tag}{classes}");
            if is_unique(doc, &selector) {
                return selector;
            }
        }

        self.path_selector(doc, element)
    }

    fn path_selector(&self, doc: &Document, element: NodeId) -> String {
        let root = doc.root_element();
        let mut walk = vec![element];
        walk.extend(doc.ancestors(element));

        let mut parts: Vec<String> = Vec::new();
        for node in walk.into_iter().take_while(|node| *node != root) {
            parts.insert(0, segment(doc, node));
            let selector = parts.join(" > ");
            if is_unique(doc, &selector) {
                return selector;
            }
        }

        if parts.is_empty() {
            return tag_of(doc, element);
        }
        parts.join(" > ")
    }
}

/// Convenience wrapper around [`SelectorSynthesizer::synthesize`].
pub fn synthesize(doc: &Document, element: NodeId) -> String {
    SelectorSynthesizer.synthesize(doc, element)
}

fn segment(doc: &Document, node: NodeId) -> String {
    if let Some(selector) = unique_id_selector(doc, node) {
        return selector;
    }

    let tag = tag_of(doc, node);
    let classes = usable_classes(doc, node, MAX_SEGMENT_CLASSES);
    let siblings: Vec<NodeId> = doc
        .parent_element(node)
        .map(|parent| {
            doc.children(parent)
                .iter()
                .copied()
                .filter(|sibling| doc.tag_name(*sibling) == doc.tag_name(node))
                .collect()
        })
        .unwrap_or_default();

    // A class segment shared by a same-tag sibling cannot tell the two apart.
    if !classes.is_empty() {
        let shared = siblings.iter().any(|sibling| {
            *sibling != node
                && classes
                    .iter()
                    .all(|class| doc.classes(*sibling).any(|token| token == *class))
        });
        if !shared {
            return format!("{tag}{}", join_classes(&classes));
        }
    }

    if siblings.len() > 1 {
        return format!("{tag}:nth-of-type({})", type_position(doc, node));
    }

    tag
}

fn unique_id_selector(doc: &Document, node: NodeId) -> Option<String> {
    let id = doc.id(node).filter(|id| !id.is_empty())?;
    let selector = format!("#{}", escape_identifier(id));
    is_unique(doc, &selector).then_some(selector)
}

fn class_suffix(doc: &Document, node: NodeId, limit: usize) -> String {
    join_classes(&usable_classes(doc, node, limit))
}

/// Leading class tokens that look like neither pseudo-classes nor attribute selectors.
fn usable_classes(doc: &Document, node: NodeId, limit: usize) -> Vec<&str> {
    doc.classes(node)
        .filter(|class| !class.contains(':') && !class.contains('['))
        .take(limit)
        .collect()
}

fn join_classes(classes: &[&str]) -> String {
    classes
        .iter()
        .map(|class| format!(".{}", escape_identifier(class)))
        .collect()
}

fn tag_of(doc: &Document, node: NodeId) -> String {
    doc.tag_name(node).unwrap_or("*").to_ascii_lowercase()
}

fn is_unique(doc: &Document, selector: &str) -> bool {
    match doc.query_selector_all(selector) {
        Ok(matches) => matches.len() == 1,
        Err(err) => {
            tracing::debug!(selector, error = %err, "synthesized selector did not parse");
            false
        }
    }
}
