use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use alertmanager_bridge::{
    alertmanager::AlertmanagerClient,
    config::Config,
    metrics,
    platform::{MattermostClient, MessagePlatform},
    provision,
    registry::ConfigurationRegistry,
    server::{AppState, BridgeSettings, Server},
};

#[derive(Parser, Debug)]
#[command(name = "alertmanager-bridge")]
#[command(about = "Bridge Alertmanager notifications, silences and status into Mattermost")]
struct Args {
    /// Alertmanager configuration file (overrides ALERT_CONFIG_PATH)
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Listen address (overrides SERVER_ADDR)
    #[arg(short, long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(path) = args.config_file {
        config.alert_config_path = path;
    }
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    info!(
        "Starting with Mattermost at {} and alert configs from {}",
        config.mattermost.url,
        config.alert_config_path.display()
    );

    metrics::register_metrics().context("failed to register metrics")?;

    let platform: Arc<dyn MessagePlatform> =
        Arc::new(MattermostClient::new(&config.mattermost.url, &config.mattermost.token));
    let bot = platform
        .current_user()
        .await
        .context("failed to look up the bot account")?;
    info!("Posting as {} ({})", bot.username, bot.id);

    let registry = Arc::new(ConfigurationRegistry::default());
    let loaded = provision::reload(&registry, platform.as_ref(), &config.alert_config_path)
        .await
        .context("failed to load alert configs")?;
    if loaded == 0 {
        warn!("No usable alert configs loaded; every inbound token will be rejected");
    }

    spawn_reload_on_hangup(
        registry.clone(),
        platform.clone(),
        config.alert_config_path.clone(),
    );

    let state = AppState {
        registry,
        alertmanager: AlertmanagerClient::default(),
        platform,
        settings: BridgeSettings {
            bot_user_id: bot.id,
            public_url: config.server.public_url.clone(),
            command_token: config.server.command_token.clone(),
            reconcile: config.reconcile,
            post_username: config.mattermost.post_username.clone(),
            post_icon_url: config.mattermost.post_icon_url.clone(),
        },
    };

    info!("Starting server on {}", config.server.addr);
    Server::new(state).start(&config.server.addr).await?;

    Ok(())
}

#[cfg(unix)]
fn spawn_reload_on_hangup(
    registry: Arc<ConfigurationRegistry>,
    platform: Arc<dyn MessagePlatform>,
    path: PathBuf,
) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to install SIGHUP handler, reload disabled: {}", e);
                return;
            }
        };
        while hangups.recv().await.is_some() {
            info!("SIGHUP received, reloading {}", path.display());
            match provision::reload(&registry, platform.as_ref(), &path).await {
                Ok(count) => info!("Reloaded {} alert configs", count),
                Err(e) => error!("Reload failed, keeping previous configuration: {}", e),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(
    _registry: Arc<ConfigurationRegistry>,
    _platform: Arc<dyn MessagePlatform>,
    _path: PathBuf,
) {
    warn!("Configuration reload on SIGHUP is only supported on unix");
}
