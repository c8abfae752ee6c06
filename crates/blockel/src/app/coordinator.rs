//! Background lifecycle hooks that sit outside the message protocol.
//!
//! On install the coordinator seeds default settings and hands back the
//! context menu to register. A click on that menu reaches the page's content
//! script, installing one first when the page has none.

use std::sync::Arc;

use anyhow::{Result, bail};
use serde::Serialize;
use serde_json::Value;

use crate::app::content::ContentScript;
use crate::app::messages::ContentMessage;
use crate::app::picker::PickerOptions;
use crate::app::rules::{RuleService, RuleStore};
use crate::app::storage::Storage;
use crate::domain::dom::Document;

pub const BLOCK_ELEMENT_MENU_ID: &str = "block-element-picker";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub id: &'static str,
    pub title: &'static str,
    pub contexts: &'static [&'static str],
}

/// Context menu entries registered on install, replacing any earlier ones.
pub fn context_menus() -> Vec<MenuItem> {
    vec![MenuItem {
        id: BLOCK_ELEMENT_MENU_ID,
        title: "Block this element",
        contexts: &["all"],
    }]
}

/// The page command a click on `menu_id` stands for.
pub fn menu_command(menu_id: &str) -> Option<ContentMessage> {
    (menu_id == BLOCK_ELEMENT_MENU_ID).then_some(ContentMessage::ActivatePicker)
}

/// A page the coordinator can reach, along with its content script once injected.
#[derive(Debug)]
pub struct Tab {
    pub document: Document,
    script: Option<ContentScript>,
}

impl Tab {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            script: None,
        }
    }

    pub fn script(&self) -> Option<&ContentScript> {
        self.script.as_ref()
    }

    pub fn script_mut(&mut self) -> Option<&mut ContentScript> {
        self.script.as_mut()
    }
}

#[derive(Debug)]
pub struct Coordinator<S> {
    service: Arc<RuleService<S>>,
    options: PickerOptions,
}

impl<S: Storage + 'static> Coordinator<S> {
    pub fn new(service: Arc<RuleService<S>>, options: PickerOptions) -> Self {
        Self { service, options }
    }

    pub fn service(&self) -> &Arc<RuleService<S>> {
        &self.service
    }

    /// Persist defaults for anything the store lacks and return the menus to register.
    pub async fn on_installed(&self) -> Result<Vec<MenuItem>> {
        self.service.install_defaults().await?;
        Ok(context_menus())
    }

    /// A page finished loading: make sure its stored rules are in effect.
    pub async fn on_page_loaded(&self, tab: &mut Tab) -> Result<()> {
        self.ensure_script(tab).await
    }

    /// Route a context menu click on `tab`.
    ///
    /// Clicks on items this coordinator did not register return `Ok(None)`.
    pub async fn on_menu_clicked(&self, menu_id: &str, tab: &mut Tab) -> Result<Option<Value>> {
        let Some(command) = menu_command(menu_id) else {
            tracing::debug!(menu_id, "ignoring unknown menu item");
            return Ok(None);
        };
        self.ensure_script(tab).await?;
        let Tab { document, script } = tab;
        let Some(script) = script.as_mut() else {
            bail!("no content script on {}", document.hostname());
        };
        Ok(Some(script.handle(document, command)))
    }

    async fn ensure_script(&self, tab: &mut Tab) -> Result<()> {
        if tab.script.is_some() {
            return Ok(());
        }
        let store: Arc<dyn RuleStore> = self.service.clone();
        let installed =
            ContentScript::install(&mut tab.document, store, self.options.clone()).await?;
        let Some(script) = installed else {
            bail!(
                "page {} already carries a content script this coordinator does not own",
                tab.document.hostname()
            );
        };
        tracing::debug!(domain = tab.document.hostname(), "injected content script");
        tab.script = Some(script);
        Ok(())
    }
}
