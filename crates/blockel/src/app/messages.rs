//! Message protocol between pages, the popup, and the background coordinator.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::app::rules::RuleService;
use crate::app::storage::Storage;
use crate::domain::errors::StoreError;
use crate::domain::model::{Rule, RuleDraft, Settings};

/// Requests handled by the background coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum BackgroundMessage {
    GetSettings,
    SaveSettings { settings: Settings },
    GetRules { domain: String },
    GetAllRules,
    SaveRule { rule: RuleDraft },
    DeleteRule { rule_id: String, domain: String },
    ToggleRule { rule_id: String, domain: String, is_enabled: bool },
    ImportRules { rules: Vec<Rule> },
    GetStatistics,
    AddToWhitelist { domain: String },
    RemoveFromWhitelist { domain: String },
}

/// Commands delivered to the page-embedded core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ContentMessage {
    ActivatePicker,
    DeactivatePicker,
}

pub fn success() -> Value {
    json!({ "success": true })
}

pub fn error_response(message: impl std::fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

/// Dispatch one request against `service`. Failures become `{"error": ...}` responses.
pub async fn handle_message<S: Storage>(
    service: &RuleService<S>,
    message: BackgroundMessage,
) -> Value {
    match dispatch(service, message).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "message handler error");
            error_response(err)
        }
    }
}

/// Like [`handle_message`], for requests that have not been decoded yet.
pub async fn handle_raw_message<S: Storage>(service: &RuleService<S>, raw: Value) -> Value {
    match serde_json::from_value::<BackgroundMessage>(raw) {
        Ok(message) => handle_message(service, message).await,
        Err(err) => {
            tracing::warn!(error = %err, "unrecognized message");
            error_response("Unknown action")
        }
    }
}

async fn dispatch<S: Storage>(
    service: &RuleService<S>,
    message: BackgroundMessage,
) -> Result<Value, StoreError> {
    let response = match message {
        BackgroundMessage::GetSettings => serde_json::to_value(service.get_settings().await?)?,
        BackgroundMessage::SaveSettings { settings } => {
            service.save_settings(settings).await?;
            success()
        }
        BackgroundMessage::GetRules { domain } => {
            serde_json::to_value(service.rules(&domain).await?)?
        }
        BackgroundMessage::GetAllRules => serde_json::to_value(service.all_rules().await?)?,
        BackgroundMessage::SaveRule { rule } => {
            serde_json::to_value(service.save_rule(rule).await?)?
        }
        BackgroundMessage::DeleteRule { rule_id, domain } => {
            service.delete_rule(&rule_id, &domain).await?;
            success()
        }
        BackgroundMessage::ToggleRule {
            rule_id,
            domain,
            is_enabled,
        } => {
            service.toggle_rule(&rule_id, &domain, is_enabled).await?;
            success()
        }
        BackgroundMessage::ImportRules { rules } => {
            service.import_rules(rules).await?;
            Value::Bool(true)
        }
        BackgroundMessage::GetStatistics => serde_json::to_value(service.statistics().await?)?,
        BackgroundMessage::AddToWhitelist { domain } => {
            service.add_to_whitelist(&domain).await?;
            success()
        }
        BackgroundMessage::RemoveFromWhitelist { domain } => {
            service.remove_from_whitelist(&domain).await?;
            success()
        }
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::storage::{MemoryStorage, StoreSnapshot};

    #[test]
    fn messages_use_kebab_case_action_tags() {
        let message: BackgroundMessage = serde_json::from_value(json!({
            "action": "toggle-rule",
            "rule_id": "r1",
            "domain": "example.com",
            "is_enabled": false
        }))
        .unwrap();
        assert_eq!(
            message,
            BackgroundMessage::ToggleRule {
                rule_id: "r1".into(),
                domain: "example.com".into(),
                is_enabled: false
            }
        );

        let activate = serde_json::to_value(ContentMessage::ActivatePicker).unwrap();
        assert_eq!(activate, json!({ "action": "activate-picker" }));
    }

    #[tokio::test]
    async fn save_then_get_rules_round_trips_through_messages() {
        let service = RuleService::new(MemoryStorage::new());
        let saved = handle_raw_message(
            &service,
            json!({
                "action": "save-rule",
                "rule": {
                    "selector": "div.ad-banner",
                    "domain": "example.com",
                    "is_enabled": true,
                    "label": "div.ad-banner"
                }
            }),
        )
        .await;
        assert_eq!(saved["selector"], "div.ad-banner");
        assert!(saved["id"].as_str().is_some_and(|id| !id.is_empty()));

        let rules = handle_message(
            &service,
            BackgroundMessage::GetRules {
                domain: "example.com".into(),
            },
        )
        .await;
        assert_eq!(rules.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn unknown_action_is_reported() {
        let service = RuleService::new(MemoryStorage::new());
        let response = handle_raw_message(&service, json!({ "action": "explode" })).await;
        assert_eq!(response, json!({ "error": "Unknown action" }));
    }

    #[tokio::test]
    async fn storage_failures_become_error_responses() {
        let service = RuleService::new(MemoryStorage::read_only(StoreSnapshot::default()));
        let response = handle_message(
            &service,
            BackgroundMessage::AddToWhitelist {
                domain: "example.com".into(),
            },
        )
        .await;
        assert!(response["error"].as_str().is_some_and(|msg| msg.contains("read-only")));
    }
}
