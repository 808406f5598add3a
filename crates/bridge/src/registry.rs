//! Configuration registry
//!
//! Holds the active set of [`AlertConfig`]s as an immutable snapshot. Readers
//! clone the snapshot `Arc` and drop the lock immediately, so no request ever
//! holds the lock across network I/O. Reloads build a fresh snapshot and swap
//! it in.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::AlertConfig;

#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    configs: BTreeMap<String, AlertConfig>,
    channel_ids: HashMap<String, String>,
}

impl RegistrySnapshot {
    /// Build a snapshot, dropping configs that fail validation or reuse a
    /// token already claimed by an earlier config (in ID order).
    pub fn build(configs: Vec<AlertConfig>, channel_ids: HashMap<String, String>) -> Self {
        let mut sorted: BTreeMap<String, AlertConfig> = BTreeMap::new();
        for config in configs {
            if let Err(e) = config.validate() {
                warn!("Skipping alert config: {}", e);
                continue;
            }
            sorted.insert(config.id.clone(), config);
        }

        let mut accepted: BTreeMap<String, AlertConfig> = BTreeMap::new();
        for (id, config) in sorted {
            let duplicate = accepted
                .values()
                .any(|other| tokens_match(&other.token, &config.token));
            if duplicate {
                warn!("Skipping alert config {}: token is already used by another config", id);
                continue;
            }
            accepted.insert(id, config);
        }

        let channel_ids = channel_ids
            .into_iter()
            .filter(|(id, _)| accepted.contains_key(id))
            .collect();

        Self {
            configs: accepted,
            channel_ids,
        }
    }

    pub fn resolve(&self, token: &str) -> Option<&AlertConfig> {
        if token.is_empty() {
            return None;
        }
        self.configs
            .values()
            .find(|config| tokens_match(token, &config.token))
    }

    pub fn get(&self, id: &str) -> Option<&AlertConfig> {
        self.configs.get(id)
    }

    pub fn configs(&self) -> impl Iterator<Item = &AlertConfig> {
        self.configs.values()
    }

    pub fn channel_id(&self, id: &str) -> Option<&str> {
        self.channel_ids.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

/// Constant-time token equality.
pub fn tokens_match(candidate: &str, expected: &str) -> bool {
    candidate.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[derive(Debug, Default)]
pub struct ConfigurationRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl ConfigurationRegistry {
    pub fn new(snapshot: RegistrySnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub async fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.read().await.clone()
    }

    /// Resolve an inbound token to a copy of its configuration.
    pub async fn resolve(&self, token: &str) -> Option<AlertConfig> {
        self.snapshot().await.resolve(token).cloned()
    }

    pub async fn get(&self, id: &str) -> Option<AlertConfig> {
        self.snapshot().await.get(id).cloned()
    }

    pub async fn configs(&self) -> Vec<AlertConfig> {
        self.snapshot().await.configs().cloned().collect()
    }

    pub async fn channel_id(&self, id: &str) -> Option<String> {
        self.snapshot().await.channel_id(id).map(str::to_string)
    }

    /// Replace the active snapshot.
    pub async fn publish(&self, snapshot: RegistrySnapshot) {
        info!("Publishing {} alert configs", snapshot.len());
        *self.current.write().await = Arc::new(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str, token: &str) -> AlertConfig {
        AlertConfig {
            id: id.to_string(),
            alertmanager_url: format!("http://am-{}:9093", id),
            channel: format!("{}-alerts", id),
            team: "infra".to_string(),
            token: token.to_string(),
        }
    }

    fn registry() -> ConfigurationRegistry {
        let mut channels = HashMap::new();
        channels.insert("c1".to_string(), "chan-1".to_string());
        ConfigurationRegistry::new(RegistrySnapshot::build(
            vec![config("c1", "T1"), config("c2", "T2")],
            channels,
        ))
    }

    #[test]
    fn token_comparison() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abd", "abc"));
        assert!(!tokens_match("ab", "abc"));
        assert!(!tokens_match("", "abc"));
    }

    #[tokio::test]
    async fn resolves_exactly_the_configured_token() {
        let registry = registry();
        assert_eq!(registry.resolve("T1").await.unwrap().id, "c1");
        assert_eq!(registry.resolve("T2").await.unwrap().id, "c2");
    }

    #[tokio::test]
    async fn near_misses_do_not_resolve() {
        let registry = registry();
        for token in ["", "T", "T12", "t1", "T1 ", "bad"] {
            assert!(registry.resolve(token).await.is_none(), "{token:?} resolved");
        }
    }

    #[tokio::test]
    async fn channel_index_is_kept_for_accepted_configs() {
        let registry = registry();
        assert_eq!(registry.channel_id("c1").await.as_deref(), Some("chan-1"));
        assert_eq!(registry.channel_id("c2").await, None);
    }

    #[test]
    fn invalid_configs_are_excluded_without_dropping_others() {
        let mut broken = config("broken", "T3");
        broken.team.clear();
        let snapshot =
            RegistrySnapshot::build(vec![config("c1", "T1"), broken], HashMap::new());
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("broken").is_none());
    }

    #[test]
    fn duplicate_tokens_keep_first_config_by_id() {
        let snapshot = RegistrySnapshot::build(
            vec![config("b", "same"), config("a", "same")],
            HashMap::new(),
        );
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.resolve("same").unwrap().id, "a");
    }

    #[tokio::test]
    async fn publish_swaps_snapshot_without_touching_readers() {
        let registry = registry();
        let before = registry.snapshot().await;

        registry
            .publish(RegistrySnapshot::build(vec![config("c3", "T3")], HashMap::new()))
            .await;

        assert!(before.resolve("T1").is_some());
        assert!(registry.resolve("T1").await.is_none());
        assert_eq!(registry.resolve("T3").await.unwrap().id, "c3");
    }
}
