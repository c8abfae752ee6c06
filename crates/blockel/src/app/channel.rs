//! Cross-context request/response channel to the background coordinator.
//!
//! Pages never touch storage directly. A [`RuntimeChannel`] serializes each
//! request as a [`BackgroundMessage`], awaits the coordinator's JSON reply, and
//! turns `{"error": ...}` replies and dropped channels into [`StoreError`]s.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::app::messages::{BackgroundMessage, handle_message};
use crate::app::rules::{RuleService, RuleStore};
use crate::app::storage::Storage;
use crate::domain::errors::StoreError;
use crate::domain::model::{Rule, RuleDraft, Settings};

/// One in-flight request and the slot its response goes to.
#[derive(Debug)]
pub struct Request {
    pub message: BackgroundMessage,
    reply: oneshot::Sender<Value>,
}

impl Request {
    pub fn respond(self, response: Value) {
        deliver(self.reply, response);
    }
}

fn deliver(reply: oneshot::Sender<Value>, response: Value) {
    if reply.send(response).is_err() {
        tracing::debug!("requester went away before the response was delivered");
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeChannel {
    tx: mpsc::Sender<Request>,
}

impl RuntimeChannel {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Request>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    /// Send `message` and wait for the raw response.
    pub async fn send(&self, message: BackgroundMessage) -> Result<Value, StoreError> {
        let (reply, response) = oneshot::channel();
        self.tx.send(Request { message, reply }).await.map_err(|_| {
            StoreError::Unavailable("background coordinator is not listening".into())
        })?;
        let value = response.await.map_err(|_| {
            StoreError::Unavailable("background coordinator dropped the request".into())
        })?;
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(StoreError::Rejected(error.to_owned()));
        }
        Ok(value)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        message: BackgroundMessage,
    ) -> Result<T, StoreError> {
        let value = self.send(message).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl RuleStore for RuntimeChannel {
    async fn create_rule(&self, draft: RuleDraft) -> Result<Rule, StoreError> {
        self.request(BackgroundMessage::SaveRule { rule: draft }).await
    }

    async fn enabled_rules(&self, domain: &str) -> Result<Vec<Rule>, StoreError> {
        let mut rules: Vec<Rule> = self
            .request(BackgroundMessage::GetRules {
                domain: domain.to_owned(),
            })
            .await?;
        rules.retain(|rule| rule.is_enabled);
        Ok(rules)
    }

    async fn settings(&self) -> Result<Settings, StoreError> {
        self.request(BackgroundMessage::GetSettings).await
    }
}

/// Answer requests with `service` until every [`RuntimeChannel`] is dropped.
pub async fn serve<S: Storage>(
    service: Arc<RuleService<S>>,
    mut requests: mpsc::Receiver<Request>,
) {
    while let Some(Request { message, reply }) = requests.recv().await {
        let response = handle_message(&service, message).await;
        deliver(reply, response);
    }
    tracing::debug!("runtime channel closed");
}
