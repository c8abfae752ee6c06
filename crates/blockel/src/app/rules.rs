//! Rule store contract and the service implementing it.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::app::storage::{Storage, StoreSnapshot};
use crate::domain::errors::StoreError;
use crate::domain::model::{Rule, RuleDraft, Settings, Statistics, Theme};

/// The request/response surface the page-embedded core needs from the rule store.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Persist `draft`, returning the rule with its assigned id and timestamp.
    async fn create_rule(&self, draft: RuleDraft) -> Result<Rule, StoreError>;

    /// Enabled rules for `domain`, in insertion order.
    async fn enabled_rules(&self, domain: &str) -> Result<Vec<Rule>, StoreError>;

    async fn settings(&self) -> Result<Settings, StoreError>;

    async fn theme_preference(&self) -> Result<Theme, StoreError> {
        Ok(self.settings().await?.theme)
    }
}

/// Rule, settings, whitelist, and statistics management over a [`Storage`] backend.
///
/// Every mutation is a locked load-modify-save of the whole snapshot.
#[derive(Debug)]
pub struct RuleService<S> {
    storage: Mutex<S>,
}

impl<S: Storage> RuleService<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage: Mutex::new(storage),
        }
    }

    async fn read(&self) -> Result<StoreSnapshot, StoreError> {
        self.storage.lock().await.load()
    }

    async fn update<T>(
        &self,
        apply: impl FnOnce(&mut StoreSnapshot) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut storage = self.storage.lock().await;
        let mut snapshot = storage.load()?;
        let outcome = apply(&mut snapshot)?;
        storage.save(&snapshot)?;
        Ok(outcome)
    }

    /// Write the snapshot back so absent keys are persisted with their defaults.
    ///
    /// Settings, rules, and statistics already stored are left as they are.
    pub async fn install_defaults(&self) -> Result<(), StoreError> {
        self.update(|_| Ok(())).await?;
        tracing::info!("persisted default settings");
        Ok(())
    }

    pub async fn get_settings(&self) -> Result<Settings, StoreError> {
        Ok(self.read().await?.settings)
    }

    pub async fn save_settings(&self, settings: Settings) -> Result<(), StoreError> {
        self.update(|snapshot| {
            snapshot.settings = settings;
            Ok(())
        })
        .await
    }

    /// All rules stored for `domain`, enabled or not.
    pub async fn rules(&self, domain: &str) -> Result<Vec<Rule>, StoreError> {
        Ok(self.read().await?.rules.remove(domain).unwrap_or_default())
    }

    pub async fn all_rules(&self) -> Result<BTreeMap<String, Vec<Rule>>, StoreError> {
        Ok(self.read().await?.rules)
    }

    /// Every rule flattened in domain order, suitable for export files.
    pub async fn export_rules(&self) -> Result<Vec<Rule>, StoreError> {
        Ok(self.all_rules().await?.into_values().flatten().collect())
    }

    pub async fn save_rule(&self, draft: RuleDraft) -> Result<Rule, StoreError> {
        let created_at = now_rfc3339()?;
        let rule = self
            .update(|snapshot| {
                let rule = Rule {
                    id: Uuid::new_v4().to_string(),
                    selector: draft.selector,
                    domain: draft.domain,
                    is_enabled: draft.is_enabled,
                    created_at,
                    label: draft.label,
                };
                snapshot
                    .rules
                    .entry(rule.domain.clone())
                    .or_default()
                    .push(rule.clone());
                snapshot.statistics = compute_statistics(&snapshot.rules);
                Ok(rule)
            })
            .await?;
        tracing::info!(domain = %rule.domain, selector = %rule.selector, "saved rule");
        Ok(rule)
    }

    /// Remove a rule. Domains left without rules are dropped. Returns whether a rule was removed.
    pub async fn delete_rule(&self, rule_id: &str, domain: &str) -> Result<bool, StoreError> {
        self.update(|snapshot| {
            let Some(rules) = snapshot.rules.get_mut(domain) else {
                return Ok(false);
            };
            let before = rules.len();
            rules.retain(|rule| rule.id != rule_id);
            let removed = rules.len() != before;
            if rules.is_empty() {
                snapshot.rules.remove(domain);
            }
            snapshot.statistics = compute_statistics(&snapshot.rules);
            Ok(removed)
        })
        .await
    }

    pub async fn toggle_rule(
        &self,
        rule_id: &str,
        domain: &str,
        is_enabled: bool,
    ) -> Result<bool, StoreError> {
        self.update(|snapshot| {
            let rule = snapshot
                .rules
                .get_mut(domain)
                .and_then(|rules| rules.iter_mut().find(|rule| rule.id == rule_id));
            Ok(match rule {
                Some(rule) => {
                    rule.is_enabled = is_enabled;
                    true
                }
                None => false,
            })
        })
        .await
    }

    /// Merge `rules` into the store, skipping selectors the domain already has.
    ///
    /// Missing ids and timestamps are assigned. Returns the number of rules added.
    pub async fn import_rules(&self, rules: Vec<Rule>) -> Result<usize, StoreError> {
        let now = now_rfc3339()?;
        let imported = self
            .update(|snapshot| {
                let mut imported = 0;
                for mut rule in rules {
                    let existing = snapshot.rules.entry(rule.domain.clone()).or_default();
                    if existing.iter().any(|known| known.selector == rule.selector) {
                        continue;
                    }
                    if rule.id.is_empty() {
                        rule.id = Uuid::new_v4().to_string();
                    }
                    if rule.created_at.is_empty() {
                        rule.created_at = now.clone();
                    }
                    existing.push(rule);
                    imported += 1;
                }
                snapshot.rules.retain(|_, rules| !rules.is_empty());
                snapshot.statistics = compute_statistics(&snapshot.rules);
                Ok(imported)
            })
            .await?;
        tracing::info!(imported, "imported rules");
        Ok(imported)
    }

    pub async fn statistics(&self) -> Result<Statistics, StoreError> {
        Ok(self.read().await?.statistics)
    }

    pub async fn add_to_whitelist(&self, domain: &str) -> Result<(), StoreError> {
        self.update(|snapshot| {
            let whitelist = &mut snapshot.settings.whitelist_domains;
            if !whitelist.iter().any(|entry| entry == domain) {
                whitelist.push(domain.to_owned());
            }
            Ok(())
        })
        .await
    }

    pub async fn remove_from_whitelist(&self, domain: &str) -> Result<(), StoreError> {
        self.update(|snapshot| {
            snapshot
                .settings
                .whitelist_domains
                .retain(|entry| entry != domain);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl<S: Storage> RuleStore for RuleService<S> {
    async fn create_rule(&self, draft: RuleDraft) -> Result<Rule, StoreError> {
        self.save_rule(draft).await
    }

    async fn enabled_rules(&self, domain: &str) -> Result<Vec<Rule>, StoreError> {
        let mut rules = self.rules(domain).await?;
        rules.retain(|rule| rule.is_enabled);
        Ok(rules)
    }

    async fn settings(&self) -> Result<Settings, StoreError> {
        self.get_settings().await
    }
}

fn now_rfc3339() -> Result<String, StoreError> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}

fn compute_statistics(rules: &BTreeMap<String, Vec<Rule>>) -> Statistics {
    let last_rule_created = rules
        .values()
        .flatten()
        .map(|rule| rule.created_at.as_str())
        .max_by(|a, b| compare_timestamps(a, b))
        .map(str::to_owned);
    Statistics {
        total_blocked: rules.values().map(Vec::len).sum(),
        domains_with_rules: rules.len(),
        last_rule_created,
    }
}

fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (
        OffsetDateTime::parse(a, &Rfc3339),
        OffsetDateTime::parse(b, &Rfc3339),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::storage::MemoryStorage;

    fn service() -> RuleService<MemoryStorage> {
        RuleService::new(MemoryStorage::new())
    }

    fn imported(selector: &str, domain: &str, created_at: &str) -> Rule {
        Rule {
            id: String::new(),
            selector: selector.into(),
            domain: domain.into(),
            is_enabled: true,
            created_at: created_at.into(),
            label: None,
        }
    }

    #[tokio::test]
    async fn save_assigns_identity_and_updates_statistics() {
        let service = service();
        let rule = service
            .save_rule(RuleDraft::for_selector("div.ad", "example.com"))
            .await
            .unwrap();

        assert!(Uuid::parse_str(&rule.id).is_ok());
        assert!(OffsetDateTime::parse(&rule.created_at, &Rfc3339).is_ok());
        assert_eq!(rule.label.as_deref(), Some("div.ad"));

        let stats = service.statistics().await.unwrap();
        assert_eq!(stats.total_blocked, 1);
        assert_eq!(stats.domains_with_rules, 1);
        assert_eq!(stats.last_rule_created, Some(rule.created_at));
    }

    #[tokio::test]
    async fn enabled_rules_skip_disabled_ones_in_order() {
        let service = service();
        let first = service
            .save_rule(RuleDraft::for_selector("#a", "example.com"))
            .await
            .unwrap();
        let second = service
            .save_rule(RuleDraft::for_selector("#b", "example.com"))
            .await
            .unwrap();
        service
            .save_rule(RuleDraft::for_selector("#c", "other.org"))
            .await
            .unwrap();

        assert!(service.toggle_rule(&first.id, "example.com", false).await.unwrap());

        let enabled = service.enabled_rules("example.com").await.unwrap();
        assert_eq!(enabled, vec![second]);
        assert_eq!(service.rules("example.com").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deleting_last_rule_drops_domain() {
        let service = service();
        let rule = service
            .save_rule(RuleDraft::for_selector("#a", "example.com"))
            .await
            .unwrap();

        assert!(service.delete_rule(&rule.id, "example.com").await.unwrap());
        assert!(!service.delete_rule(&rule.id, "example.com").await.unwrap());
        assert!(service.all_rules().await.unwrap().is_empty());
        assert_eq!(service.statistics().await.unwrap(), Statistics::default());
    }

    #[tokio::test]
    async fn import_skips_duplicate_selectors_and_fills_identity() {
        let service = service();
        service
            .save_rule(RuleDraft::for_selector("#a", "example.com"))
            .await
            .unwrap();

        let count = service
            .import_rules(vec![
                imported("#a", "example.com", ""),
                imported("#b", "example.com", "2024-05-01T10:00:00Z"),
                imported("#b", "example.com", ""),
                imported(".c", "other.org", ""),
            ])
            .await
            .unwrap();

        assert_eq!(count, 2);
        let rules = service.all_rules().await.unwrap();
        assert_eq!(rules["example.com"].len(), 2);
        assert_eq!(rules["example.com"][1].created_at, "2024-05-01T10:00:00Z");
        assert!(!rules["other.org"][0].id.is_empty());
        assert_eq!(service.statistics().await.unwrap().domains_with_rules, 2);
    }

    #[tokio::test]
    async fn whitelist_has_no_duplicates() {
        let service = service();
        service.add_to_whitelist("example.com").await.unwrap();
        service.add_to_whitelist("example.com").await.unwrap();
        assert_eq!(
            service.get_settings().await.unwrap().whitelist_domains,
            vec!["example.com".to_string()]
        );

        service.remove_from_whitelist("example.com").await.unwrap();
        assert!(service.get_settings().await.unwrap().whitelist_domains.is_empty());
    }

    #[tokio::test]
    async fn theme_preference_reads_settings() {
        let service = service();
        let mut settings = Settings::default();
        settings.theme = Theme::Dark;
        service.save_settings(settings).await.unwrap();
        assert_eq!(service.theme_preference().await.unwrap(), Theme::Dark);
    }

    #[tokio::test]
    async fn install_defaults_seeds_an_empty_store_once() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("rules.json");
        let service = RuleService::new(crate::app::storage::JsonFileStorage::new(&path));

        service.install_defaults().await.unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["be_settings"]["enabled"], serde_json::json!(true));
        assert_eq!(written["be_settings"]["theme"], serde_json::json!("system"));

        service.add_to_whitelist("example.com").await.unwrap();
        service
            .save_rule(RuleDraft::for_selector("#a", "example.com"))
            .await
            .unwrap();
        service.install_defaults().await.unwrap();

        let settings = service.get_settings().await.unwrap();
        assert_eq!(settings.whitelist_domains, vec!["example.com".to_string()]);
        assert_eq!(service.statistics().await.unwrap().total_blocked, 1);
    }

    #[tokio::test]
    async fn rejected_write_surfaces_error() {
        let service = RuleService::new(MemoryStorage::read_only(StoreSnapshot::default()));
        let err = service
            .create_rule(RuleDraft::for_selector("#a", "example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }

    #[test]
    fn latest_timestamp_compares_parsed_instants() {
        let mut rules = BTreeMap::new();
        rules.insert(
            "example.com".to_string(),
            vec![
                imported("#a", "example.com", "2024-05-01T10:00:00Z"),
                imported("#b", "example.com", "2024-05-01T10:00:00.5Z"),
            ],
        );
        let stats = compute_statistics(&rules);
        assert_eq!(stats.last_rule_created.as_deref(), Some("2024-05-01T10:00:00.5Z"));
    }
}
