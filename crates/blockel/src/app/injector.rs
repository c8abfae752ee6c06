//! Managed stylesheet that hides blocked elements.

use crate::domain::dom::{Document, NodeId};
use crate::domain::model::Rule;

/// Marker id of the single managed `<style>` element.
pub const STYLE_ID: &str = "be-injected-styles";

/// The hide declaration for one selector.
pub fn hide_declaration(selector: &str) -> String {
    format!("{selector} {{ display: none !important; }}")
}

/// Newline-joined hide declarations for the enabled rules, in order.
pub fn render_rules(rules: &[Rule]) -> String {
    rules
        .iter()
        .filter(|rule| rule.is_enabled)
        .map(|rule| hide_declaration(&rule.selector))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Writes hide declarations into one lazily created style element per document.
///
/// Elements are hidden with `display: none`, never removed, so disabling a rule
/// later brings them back untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct StyleInjector;

impl StyleInjector {
    pub fn new() -> Self {
        Self
    }

    /// Replace the managed content with declarations for `rules`.
    pub fn materialize(&self, doc: &mut Document, rules: &[Rule]) -> NodeId {
        let style = self.ensure_element(doc);
        doc.set_text_content(style, render_rules(rules));
        tracing::debug!(rules = rules.len(), "materialized managed stylesheet");
        style
    }

    /// Append a single declaration to whatever the managed element already holds.
    pub fn append(&self, doc: &mut Document, selector: &str) -> NodeId {
        let style = self.ensure_element(doc);
        let mut css = doc.text_content(style).unwrap_or_default().to_owned();
        if !css.is_empty() {
            css.push('\n');
        }
        css.push_str(&hide_declaration(selector));
        doc.set_text_content(style, css);
        style
    }

    pub fn managed_css(doc: &Document) -> Option<&str> {
        let style = doc.get_element_by_id(STYLE_ID)?;
        doc.text_content(style)
    }

    fn ensure_element(&self, doc: &mut Document) -> NodeId {
        if let Some(existing) = doc.get_element_by_id(STYLE_ID) {
            return existing;
        }
        let parent = if doc.is_connected(doc.head()) {
            doc.head()
        } else {
            doc.root_element()
        };
        doc.append_element(parent, "style", &[("id", STYLE_ID)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(selector: &str, is_enabled: bool) -> Rule {
        Rule {
            id: format!("id-{selector}"),
            selector: selector.into(),
            domain: "example.com".into(),
            is_enabled,
            created_at: "2026-01-01T00:00:00Z".into(),
            label: None,
        }
    }

    #[test]
    fn renders_only_enabled_rules_newline_joined() {
        let css = render_rules(&[rule("#a", true), rule(".b", false), rule("div.c", true)]);
        assert_eq!(
            css,
            "#a { display: none !important; }\ndiv.c { display: none !important; }"
        );
    }

    #[test]
    fn repeated_materialization_reuses_one_element() {
        let mut doc = Document::new("https://example.com/").unwrap();
        let injector = StyleInjector::new();

        let first = injector.materialize(&mut doc, &[rule("#a", true)]);
        let second = injector.materialize(&mut doc, &[rule("#b", true)]);

        assert_eq!(first, second);
        assert_eq!(doc.query_selector_all("style").unwrap().len(), 1);
        assert_eq!(doc.parent_element(first), Some(doc.head()));
        assert_eq!(
            StyleInjector::managed_css(&doc),
            Some("#b { display: none !important; }")
        );
    }

    #[test]
    fn zero_rules_leave_empty_content() {
        let mut doc = Document::new("https://example.com/").unwrap();
        StyleInjector::new().materialize(&mut doc, &[]);
        assert_eq!(StyleInjector::managed_css(&doc), Some(""));
    }

    #[test]
    fn append_extends_existing_content() {
        let mut doc = Document::new("https://example.com/").unwrap();
        let body = doc.body();
        let banner = doc.append_element(body, "div", &[("class", "ad-banner")]);
        let injector = StyleInjector::new();
        injector.materialize(&mut doc, &[rule("#a", true)]);

        injector.append(&mut doc, "div.ad-banner");

        assert_eq!(
            StyleInjector::managed_css(&doc),
            Some("#a { display: none !important; }\ndiv.ad-banner { display: none !important; }")
        );
        assert!(doc.is_connected(banner));
    }

    #[test]
    fn append_without_prior_materialization_creates_element() {
        let mut doc = Document::new("https://example.com/").unwrap();
        StyleInjector::new().append(&mut doc, "#x");
        assert_eq!(
            StyleInjector::managed_css(&doc),
            Some("#x { display: none !important; }")
        );
    }
}
