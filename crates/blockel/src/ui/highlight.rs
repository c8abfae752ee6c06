//! Hover highlighting through inline style mutation.

use crate::domain::dom::{Document, NodeId};

pub const DEFAULT_HIGHLIGHT_COLOR: &str = "oklch(0.723 0.191 142.5)";
const OUTLINE_REST: &str = "outline-offset: 2px !important; cursor: crosshair !important;";

/// Inline-style snapshot of a highlighted element, used for exact restoration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    element: NodeId,
    /// `None` when the element had no `style` attribute at all.
    original_style: Option<String>,
}

impl Highlight {
    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn original_style(&self) -> Option<&str> {
        self.original_style.as_deref()
    }
}

/// Appends an outline declaration to one element and puts it back afterwards.
#[derive(Debug, Clone)]
pub struct HighlightRenderer {
    declaration: String,
}

impl Default for HighlightRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_HIGHLIGHT_COLOR)
    }
}

impl HighlightRenderer {
    pub fn new(color: &str) -> Self {
        Self {
            declaration: format!("outline: 2px solid {color} !important; {OUTLINE_REST}"),
        }
    }

    pub fn declaration(&self) -> &str {
        &self.declaration
    }

    /// Highlight `element`, returning the snapshot needed to undo it.
    ///
    /// Detached elements are left untouched.
    pub fn apply(&self, doc: &mut Document, element: NodeId) -> Option<Highlight> {
        if !doc.is_connected(element) {
            return None;
        }
        let original_style = doc.attribute(element, "style").map(str::to_owned);
        let highlighted = match original_style.as_deref().map(str::trim_end) {
            Some("") | None => self.declaration.clone(),
            Some(existing) if existing.ends_with(';') => format!("{existing} {}", self.declaration),
            Some(existing) => format!("{existing}; {}", self.declaration),
        };
        doc.set_attribute(element, "style", &highlighted);
        Some(Highlight {
            element,
            original_style,
        })
    }

    /// Put back the exact `style` attribute captured by [`HighlightRenderer::apply`].
    pub fn restore(&self, doc: &mut Document, highlight: Highlight) {
        match highlight.original_style {
            Some(style) => doc.set_attribute(highlight.element, "style", &style),
            None => doc.remove_attribute(highlight.element, "style"),
        }
    }
}
