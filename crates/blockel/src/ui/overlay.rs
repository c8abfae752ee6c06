//! Confirmation toolbar shown in an isolated scope next to the picked element.

use anyhow::{Result, anyhow};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::domain::dom::{Document, NodeId, Rect};
use crate::domain::model::ColorScheme;

pub const TOOLBAR_HOST_ID: &str = "be-toolbar-host";
pub const DEFAULT_OVERLAY_WIDTH: f64 = 320.0;

const HOST_STYLE: &str =
    "all: initial; position: fixed; z-index: 2147483647; pointer-events: auto;";
const TEMPLATE_NAME: &str = "toolbar.html";
const VIEWPORT_MARGIN: f64 = 8.0;
const ANCHOR_OFFSET: f64 = 60.0;

/// What the user chose on the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    Confirm,
    Cancel,
}

impl OverlayAction {
    pub fn button_id(&self) -> &'static str {
        match self {
            OverlayAction::Confirm => "btn-block",
            OverlayAction::Cancel => "btn-cancel",
        }
    }

    pub fn from_button_id(id: &str) -> Option<Self> {
        match id {
            "btn-block" => Some(OverlayAction::Confirm),
            "btn-cancel" => Some(OverlayAction::Cancel),
            _ => None,
        }
    }
}

/// Top-left corner of the toolbar in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub top: f64,
    pub left: f64,
}

impl Placement {
    /// Anchor above `rect`, kept inside the viewport.
    pub fn near(rect: Rect, viewport_width: f64, overlay_width: f64) -> Self {
        let top = (rect.top - ANCHOR_OFFSET).max(VIEWPORT_MARGIN);
        let left = rect
            .left
            .min(viewport_width - overlay_width)
            .max(VIEWPORT_MARGIN);
        Self { top, left }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct Palette {
    background: &'static str,
    border: &'static str,
    text_primary: &'static str,
    text_secondary: &'static str,
    selector_background: &'static str,
    cancel_background: &'static str,
    cancel_text: &'static str,
    shadow: &'static str,
}

const LIGHT: Palette = Palette {
    background: "#ffffff",
    border: "#e5e7eb",
    text_primary: "#111827",
    text_secondary: "#6b7280",
    selector_background: "#f9fafb",
    cancel_background: "#f3f4f6",
    cancel_text: "#374151",
    shadow: "rgba(0,0,0,0.15)",
};

const DARK: Palette = Palette {
    background: "#1c1c1c",
    border: "rgba(255,255,255,0.1)",
    text_primary: "#f9fafb",
    text_secondary: "#9ca3af",
    selector_background: "#2a2a2a",
    cancel_background: "#2a2a2a",
    cancel_text: "#d1d5db",
    shadow: "rgba(0,0,0,0.5)",
};

fn palette(scheme: ColorScheme) -> Palette {
    match scheme {
        ColorScheme::Light => LIGHT,
        ColorScheme::Dark => DARK,
    }
}

/// Renders and mounts the toolbar. At most one instance exists per document.
pub struct ConfirmationOverlay {
    env: Environment<'static>,
    width: f64,
    accent: String,
}

impl std::fmt::Debug for ConfirmationOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationOverlay")
            .field("width", &self.width)
            .field("accent", &self.accent)
            .finish()
    }
}

impl ConfirmationOverlay {
    pub fn new(width: f64, accent: impl Into<String>) -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template(TEMPLATE_NAME, TOOLBAR_TEMPLATE)
            .map_err(|err| anyhow!("failed to register toolbar template: {err}"))?;
        Ok(Self {
            env,
            width,
            accent: accent.into(),
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Render the scoped markup. The selector is HTML-escaped by the template.
    pub fn render(
        &self,
        selector: &str,
        placement: Placement,
        scheme: ColorScheme,
    ) -> Result<String> {
        let template = self
            .env
            .get_template(TEMPLATE_NAME)
            .map_err(|err| anyhow!("toolbar template missing: {err}"))?;
        template
            .render(context! {
                selector => selector,
                top => placement.top.round() as i64,
                left => placement.left.round() as i64,
                width => self.width.round() as i64,
                scheme => scheme.to_string(),
                palette => palette(scheme),
                accent => self.accent.as_str(),
                confirm_id => OverlayAction::Confirm.button_id(),
                cancel_id => OverlayAction::Cancel.button_id(),
            })
            .map_err(|err| anyhow!("failed to render toolbar: {err}"))
    }

    /// Mount a toolbar for `target`, replacing any toolbar already on the page.
    pub fn show(
        &self,
        doc: &mut Document,
        target: NodeId,
        selector: &str,
        scheme: ColorScheme,
    ) -> Result<NodeId> {
        Self::remove(doc);

        let (viewport_width, _) = doc.viewport();
        let placement = Placement::near(doc.bounding_rect(target), viewport_width, self.width);
        let markup = self.render(selector, placement, scheme)?;

        let host = doc.create_element("div");
        doc.set_attribute(host, "id", TOOLBAR_HOST_ID);
        doc.set_attribute(host, "style", HOST_STYLE);
        doc.attach_scoped_markup(host, markup);
        let root = doc.root_element();
        doc.append_child(root, host);
        Ok(host)
    }

    pub fn remove(doc: &mut Document) {
        while let Some(host) = doc.get_element_by_id(TOOLBAR_HOST_ID) {
            doc.remove(host);
        }
    }

    pub fn is_present(doc: &Document) -> bool {
        doc.get_element_by_id(TOOLBAR_HOST_ID).is_some()
    }
}

const TOOLBAR_TEMPLATE: &str = r#"<style>
  * { box-sizing: border-box; font-family: system-ui, -apple-system, sans-serif; }
  .toolbar {
    position: fixed;
    top: {{ top }}px;
    left: {{ left }}px;
    min-width: 280px;
    max-width: {{ width }}px;
    display: flex;
    flex-direction: column;
    gap: 8px;
    padding: 10px 12px;
    background: {{ palette.background }};
    border: 1px solid {{ palette.border }};
    border-radius: 10px;
    box-shadow: 0 4px 20px {{ palette.shadow }};
  }
  .toolbar-header {
    display: flex;
    align-items: center;
    gap: 6px;
    font-size: 12px;
    font-weight: 600;
    color: {{ palette.text_primary }};
  }
  .toolbar-selector {
    font-family: 'Courier New', monospace;
    font-size: 11px;
    color: {{ palette.text_secondary }};
    background: {{ palette.selector_background }};
    border: 1px solid {{ palette.border }};
    border-radius: 6px;
    padding: 5px 8px;
    word-break: break-all;
    max-height: 48px;
    overflow-y: auto;
  }
  .toolbar-actions { display: flex; gap: 6px; }
  .btn {
    flex: 1;
    padding: 6px 12px;
    border: none;
    border-radius: 7px;
    font-size: 12px;
    font-weight: 500;
    cursor: pointer;
  }
  .btn:hover { opacity: 0.85; }
  .btn-block { background: {{ accent }}; color: white; }
  .btn-cancel {
    background: {{ palette.cancel_background }};
    color: {{ palette.cancel_text }};
    border: 1px solid {{ palette.border }};
  }
</style>
<div class="toolbar" data-theme="{{ scheme }}">
  <div class="toolbar-header">Block this element?</div>
  <div class="toolbar-selector">{{ selector }}</div>
  <div class="toolbar-actions">
    <button class="btn btn-block" id="{{ confirm_id }}">Block Element</button>
    <button class="btn btn-cancel" id="{{ cancel_id }}">Cancel</button>
  </div>
</div>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::highlight::DEFAULT_HIGHLIGHT_COLOR;

    fn overlay() -> ConfirmationOverlay {
        ConfirmationOverlay::new(DEFAULT_OVERLAY_WIDTH, DEFAULT_HIGHLIGHT_COLOR).unwrap()
    }

    fn page() -> (Document, NodeId) {
        let mut doc = Document::new("https://example.com/").unwrap();
        let body = doc.body();
        let target = doc.append_element(body, "div", &[("class", "ad")]);
        doc.set_bounding_rect(target, Rect::new(200.0, 100.0, 300.0, 90.0));
        (doc, target)
    }

    #[test]
    fn placement_is_clamped_inside_viewport() {
        let near_top = Placement::near(Rect::new(20.0, -40.0, 10.0, 10.0), 1024.0, 320.0);
        assert_eq!(near_top, Placement { top: 8.0, left: 8.0 });

        let near_right = Placement::near(Rect::new(300.0, 900.0, 10.0, 10.0), 1024.0, 320.0);
        assert_eq!(near_right, Placement { top: 240.0, left: 704.0 });
    }

    #[test]
    fn selector_text_is_html_escaped() {
        let overlay = overlay();
        let markup = overlay
            .render(
                "body > div.x<script>",
                Placement { top: 8.0, left: 8.0 },
                ColorScheme::Light,
            )
            .unwrap();
        assert!(markup.contains("body &gt; div.x&lt;script&gt;"));
        assert!(!markup.contains("<script>"));
    }

    #[test]
    fn theme_selects_palette() {
        let overlay = overlay();
        let placement = Placement { top: 8.0, left: 8.0 };
        let dark = overlay.render("#a", placement, ColorScheme::Dark).unwrap();
        let light = overlay.render("#a", placement, ColorScheme::Light).unwrap();
        assert!(dark.contains("background: #1c1c1c"));
        assert!(dark.contains(r#"data-theme="dark""#));
        assert!(light.contains("background: #ffffff"));
    }

    #[test]
    fn showing_twice_keeps_a_single_host() {
        let (mut doc, target) = page();
        let overlay = overlay();

        let first = overlay.show(&mut doc, target, "div.ad", ColorScheme::Light).unwrap();
        let second = overlay.show(&mut doc, target, "div.ad", ColorScheme::Dark).unwrap();

        assert!(!doc.is_connected(first));
        assert!(doc.is_connected(second));
        assert_eq!(doc.query_selector_all("#be-toolbar-host").unwrap(), vec![second]);
        assert!(doc.scoped_markup(second).unwrap().contains("top: 140px"));
    }

    #[test]
    fn scoped_markup_is_invisible_to_page_queries() {
        let (mut doc, target) = page();
        let overlay = overlay();
        overlay.show(&mut doc, target, "div.ad", ColorScheme::Light).unwrap();

        assert!(doc.query_selector_all("#btn-block").unwrap().is_empty());
        assert!(ConfirmationOverlay::is_present(&doc));

        ConfirmationOverlay::remove(&mut doc);
        assert!(!ConfirmationOverlay::is_present(&doc));
    }

    #[test]
    fn button_ids_map_to_actions() {
        assert_eq!(OverlayAction::from_button_id("btn-block"), Some(OverlayAction::Confirm));
        assert_eq!(OverlayAction::from_button_id("btn-cancel"), Some(OverlayAction::Cancel));
        assert_eq!(OverlayAction::from_button_id("other"), None);
    }
}
