//! Interactive element picking.
//!
//! A [`PickerStateMachine`] owns at most one `PickerSession` at a time. The
//! session is created by [`PickerStateMachine::activate`] and dropped by
//! [`PickerStateMachine::deactivate`], which every exit path funnels through, so
//! the overlay, listeners, highlight, and toolbar never outlive it.

use std::sync::Arc;

use anyhow::Result;

use crate::app::injector::StyleInjector;
use crate::app::rules::RuleStore;
use crate::app::synthesize::SelectorSynthesizer;
use crate::domain::dom::{Document, EventKind, ListenerId, NodeId};
use crate::domain::errors::StoreError;
use crate::domain::model::{ColorScheme, Rule, RuleDraft};
use crate::infra::config::Config;
use crate::ui::highlight::{DEFAULT_HIGHLIGHT_COLOR, Highlight, HighlightRenderer};
use crate::ui::overlay::{
    ConfirmationOverlay, DEFAULT_OVERLAY_WIDTH, OverlayAction, TOOLBAR_HOST_ID,
};

pub const OVERLAY_ID: &str = "be-overlay";

const OVERLAY_STYLE: &str =
    "position: fixed; inset: 0; z-index: 2147483646; cursor: crosshair; pointer-events: none;";
const CAPTURED_EVENTS: [EventKind; 4] = [
    EventKind::MouseOver,
    EventKind::Click,
    EventKind::ContextMenu,
    EventKind::KeyDown,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerPhase {
    Inactive,
    /// Listening, nothing highlighted.
    Active,
    /// One element highlighted.
    Hovering,
    /// Toolbar shown for the clicked element.
    Confirming,
}

/// Input delivered by the document-level capturing listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    PointerMove { target: NodeId },
    Click { target: NodeId },
    ContextMenu { target: NodeId },
    KeyDown { key: String },
}

impl PageEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PageEvent::PointerMove { .. } => EventKind::MouseOver,
            PageEvent::Click { .. } => EventKind::Click,
            PageEvent::ContextMenu { .. } => EventKind::ContextMenu,
            PageEvent::KeyDown { .. } => EventKind::KeyDown,
        }
    }
}

/// What the picker did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// The event continues to the page untouched.
    Ignored,
    Handled,
    /// Default action prevented and propagation stopped; the page never sees it.
    Suppressed,
}

/// Result of confirming a pick. A failed save still ends the session.
#[derive(Debug)]
pub enum ConfirmOutcome {
    Saved(Rule),
    Failed(StoreError),
}

#[derive(Debug, Clone)]
pub struct PickerOptions {
    pub highlight_color: String,
    pub overlay_width: f64,
}

impl Default for PickerOptions {
    fn default() -> Self {
        Self {
            highlight_color: DEFAULT_HIGHLIGHT_COLOR.to_owned(),
            overlay_width: DEFAULT_OVERLAY_WIDTH,
        }
    }
}

impl PickerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            highlight_color: config.picker.highlight_color().to_owned(),
            overlay_width: config.picker.overlay_width(),
        }
    }
}

/// Working state of one activation cycle.
#[derive(Debug)]
struct PickerSession {
    phase: PickerPhase,
    overlay: NodeId,
    listeners: Vec<(EventKind, ListenerId)>,
    highlight: Option<Highlight>,
    selector: Option<String>,
}

impl PickerSession {
    fn listening(&self, doc: &Document, kind: EventKind) -> bool {
        self.listeners
            .iter()
            .any(|(listener_kind, id)| *listener_kind == kind && doc.has_listener(*id))
    }
}

pub struct PickerStateMachine {
    store: Arc<dyn RuleStore>,
    synthesizer: SelectorSynthesizer,
    highlighter: HighlightRenderer,
    overlay: ConfirmationOverlay,
    injector: StyleInjector,
    session: Option<PickerSession>,
}

impl std::fmt::Debug for PickerStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickerStateMachine")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl PickerStateMachine {
    pub fn new(store: Arc<dyn RuleStore>, options: PickerOptions) -> Result<Self> {
        Ok(Self {
            store,
            synthesizer: SelectorSynthesizer::new(),
            highlighter: HighlightRenderer::new(&options.highlight_color),
            overlay: ConfirmationOverlay::new(options.overlay_width, options.highlight_color)?,
            injector: StyleInjector::new(),
            session: None,
        })
    }

    pub fn phase(&self) -> PickerPhase {
        self.session
            .as_ref()
            .map_or(PickerPhase::Inactive, |session| session.phase)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Selector computed for the element awaiting confirmation.
    pub fn current_selector(&self) -> Option<&str> {
        self.session.as_ref()?.selector.as_deref()
    }

    pub fn highlighted(&self) -> Option<NodeId> {
        self.session.as_ref()?.highlight.as_ref().map(Highlight::element)
    }

    /// Start a session: mount the occlusion overlay and capture page input. No-op when active.
    pub fn activate(&mut self, doc: &mut Document) {
        if self.session.is_some() {
            tracing::debug!("picker already active");
            return;
        }

        let root = doc.root_element();
        let overlay =
            doc.append_element(root, "div", &[("id", OVERLAY_ID), ("style", OVERLAY_STYLE)]);
        let listeners = CAPTURED_EVENTS
            .iter()
            .map(|kind| (*kind, doc.add_event_listener(*kind, true)))
            .collect();

        self.session = Some(PickerSession {
            phase: PickerPhase::Active,
            overlay,
            listeners,
            highlight: None,
            selector: None,
        });
        tracing::info!(domain = doc.hostname(), "picker activated");
    }

    /// Tear the session down from any phase. No-op when inactive.
    pub fn deactivate(&mut self, doc: &mut Document) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        if let Some(highlight) = session.highlight.take() {
            self.highlighter.restore(doc, highlight);
        }
        ConfirmationOverlay::remove(doc);
        doc.remove(session.overlay);
        for (_, listener) in session.listeners {
            doc.remove_event_listener(listener);
        }
        tracing::info!("picker deactivated");
    }

    /// Route one captured event through the state machine.
    pub async fn dispatch(&mut self, doc: &mut Document, event: PageEvent) -> EventDisposition {
        let Some(session) = self.session.as_ref() else {
            return EventDisposition::Ignored;
        };
        if !session.listening(doc, event.kind()) {
            return EventDisposition::Ignored;
        }

        match event {
            PageEvent::KeyDown { key } if key == "Escape" => {
                self.cancel(doc);
                EventDisposition::Handled
            }
            PageEvent::KeyDown { .. } => EventDisposition::Ignored,
            PageEvent::PointerMove { target } => self.hover(doc, target),
            PageEvent::Click { target } | PageEvent::ContextMenu { target } => {
                self.pick(doc, target).await
            }
        }
    }

    /// Callback for the toolbar buttons.
    pub async fn resolve(
        &mut self,
        doc: &mut Document,
        action: OverlayAction,
    ) -> Option<ConfirmOutcome> {
        match action {
            OverlayAction::Confirm => self.confirm(doc).await,
            OverlayAction::Cancel => {
                self.cancel(doc);
                None
            }
        }
    }

    /// Save the pending selector, hide its elements right away, and end the session.
    ///
    /// Returns `None` unless a pick is awaiting confirmation.
    pub async fn confirm(&mut self, doc: &mut Document) -> Option<ConfirmOutcome> {
        let session = self.session.as_ref()?;
        if session.phase != PickerPhase::Confirming {
            return None;
        }
        let selector = session.selector.clone()?;

        let draft = RuleDraft::for_selector(selector.as_str(), doc.hostname());
        let outcome = match self.store.create_rule(draft).await {
            Ok(rule) => {
                self.injector.append(doc, &selector);
                ConfirmOutcome::Saved(rule)
            }
            Err(err) => {
                tracing::error!(error = %err, selector = %selector, "failed to save rule");
                ConfirmOutcome::Failed(err)
            }
        };

        ConfirmationOverlay::remove(doc);
        self.deactivate(doc);
        Some(outcome)
    }

    /// Dismiss the toolbar (if any) and end the session.
    pub fn cancel(&mut self, doc: &mut Document) {
        ConfirmationOverlay::remove(doc);
        self.deactivate(doc);
    }

    fn hover(&mut self, doc: &mut Document, target: NodeId) -> EventDisposition {
        if !is_candidate(doc, target) {
            return EventDisposition::Ignored;
        }
        let Some(session) = self.session.as_mut() else {
            return EventDisposition::Ignored;
        };
        if session.phase == PickerPhase::Confirming {
            return EventDisposition::Ignored;
        }
        if session.highlight.as_ref().map(Highlight::element) == Some(target) {
            return EventDisposition::Handled;
        }

        if let Some(previous) = session.highlight.take() {
            self.highlighter.restore(doc, previous);
        }
        session.highlight = self.highlighter.apply(doc, target);
        session.phase = if session.highlight.is_some() {
            PickerPhase::Hovering
        } else {
            PickerPhase::Active
        };
        EventDisposition::Handled
    }

    async fn pick(&mut self, doc: &mut Document, target: NodeId) -> EventDisposition {
        if !is_candidate(doc, target) {
            return EventDisposition::Ignored;
        }
        if self.phase() == PickerPhase::Confirming {
            return EventDisposition::Suppressed;
        }

        let selector = self.synthesizer.synthesize(doc, target);
        let scheme = self.resolve_scheme(doc).await;

        if let Err(err) = self.overlay.show(doc, target, &selector, scheme) {
            tracing::error!(error = %err, "failed to show confirmation toolbar");
            self.deactivate(doc);
            return EventDisposition::Suppressed;
        }

        if let Some(session) = self.session.as_mut() {
            tracing::debug!(selector = %selector, "picked element");
            session.phase = PickerPhase::Confirming;
            session.selector = Some(selector);
        }
        EventDisposition::Suppressed
    }

    async fn resolve_scheme(&self, doc: &Document) -> ColorScheme {
        let ambient_dark = doc.prefers_dark_scheme();
        match self.store.theme_preference().await {
            Ok(theme) => theme.resolve(ambient_dark),
            Err(err) => {
                tracing::warn!(error = %err, "theme lookup failed, using ambient scheme");
                if ambient_dark {
                    ColorScheme::Dark
                } else {
                    ColorScheme::Light
                }
            }
        }
    }
}

fn is_candidate(doc: &Document, target: NodeId) -> bool {
    doc.is_connected(target)
        && !matches!(doc.id(target), Some(OVERLAY_ID) | Some(TOOLBAR_HOST_ID))
}
