//! Startup and reload provisioning: make sure every configured channel
//! exists and publish the resulting registry snapshot.

use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::{
    config::{load_alert_configs, AlertConfig},
    platform::MessagePlatform,
    registry::{ConfigurationRegistry, RegistrySnapshot},
    Result,
};

/// Ensure channels for the configs the registry will accept and build a
/// snapshot.
///
/// Invalid configs and duplicate-token losers are dropped before any channel
/// is touched. Channel failures are logged and do not prevent the other
/// configs from loading.
pub async fn build_snapshot(
    platform: &dyn MessagePlatform,
    configs: Vec<AlertConfig>,
) -> RegistrySnapshot {
    let accepted: Vec<AlertConfig> = RegistrySnapshot::build(configs, HashMap::new())
        .configs()
        .cloned()
        .collect();

    let mut channel_ids = HashMap::new();
    for config in &accepted {
        match platform.ensure_channel(&config.team, &config.channel).await {
            Ok(channel_id) => {
                info!(
                    "Alert config {} posts to {}/{} ({})",
                    config.id, config.team, config.channel, channel_id
                );
                channel_ids.insert(config.id.clone(), channel_id);
            }
            Err(e) => warn!("Failed to ensure alert channel for {}: {}", config.id, e),
        }
    }
    RegistrySnapshot::build(accepted, channel_ids)
}

/// Load the configuration file, provision it and publish it.
pub async fn reload(
    registry: &ConfigurationRegistry,
    platform: &dyn MessagePlatform,
    path: &Path,
) -> Result<usize> {
    let configs = load_alert_configs(path)?;
    info!("Loaded {} alert configs from {}", configs.len(), path.display());
    let snapshot = build_snapshot(platform, configs).await;
    let count = snapshot.len();
    registry.publish(snapshot).await;
    Ok(count)
}
