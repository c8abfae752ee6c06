//! Page-embedded core: one per page, wiring load-time hiding to the picker.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::app::injector::StyleInjector;
use crate::app::messages::{ContentMessage, success};
use crate::app::picker::{PickerOptions, PickerStateMachine};
use crate::app::rules::RuleStore;
use crate::domain::dom::Document;

/// Set on the root element once a script has been installed on the page.
pub const INIT_MARKER: &str = "data-be-initialized";

pub struct ContentScript {
    store: Arc<dyn RuleStore>,
    injector: StyleInjector,
    picker: PickerStateMachine,
}

impl std::fmt::Debug for ContentScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentScript")
            .field("picker", &self.picker)
            .finish_non_exhaustive()
    }
}

impl ContentScript {
    /// Install on `doc` and hide elements matching the page's stored rules.
    ///
    /// Returns `Ok(None)` when a script is already installed on this page.
    pub async fn install(
        doc: &mut Document,
        store: Arc<dyn RuleStore>,
        options: PickerOptions,
    ) -> Result<Option<Self>> {
        let root = doc.root_element();
        if doc.attribute(root, INIT_MARKER).is_some() {
            tracing::debug!(domain = doc.hostname(), "content script already installed");
            return Ok(None);
        }

        let script = Self {
            picker: PickerStateMachine::new(store.clone(), options)?,
            store,
            injector: StyleInjector::new(),
        };
        doc.set_attribute(root, INIT_MARKER, "true");
        script.inject_rules(doc).await;
        Ok(Some(script))
    }

    /// Materialize the enabled rules for this page's domain, unless blocking is
    /// off globally or the domain is whitelisted. Store failures are logged.
    pub async fn inject_rules(&self, doc: &mut Document) {
        let domain = doc.hostname().to_owned();
        let settings = match self.store.settings().await {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read settings, skipping rule injection");
                return;
            }
        };
        if !settings.blocks_on(&domain) {
            tracing::debug!(domain = %domain, "blocking disabled for domain");
            return;
        }

        match self.store.enabled_rules(&domain).await {
            Ok(rules) => {
                self.injector.materialize(doc, &rules);
                tracing::debug!(domain = %domain, rules = rules.len(), "injected rules");
            }
            Err(err) => tracing::warn!(error = %err, domain = %domain, "failed to load rules"),
        }
    }

    pub fn handle(&mut self, doc: &mut Document, message: ContentMessage) -> Value {
        match message {
            ContentMessage::ActivatePicker => self.picker.activate(doc),
            ContentMessage::DeactivatePicker => self.picker.deactivate(doc),
        }
        success()
    }

    pub fn picker(&self) -> &PickerStateMachine {
        &self.picker
    }

    pub fn picker_mut(&mut self) -> &mut PickerStateMachine {
        &mut self.picker
    }
}
