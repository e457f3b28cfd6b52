use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lavavoice::adapters::{LavalinkHttpBackend, LavalinkNode, LavalinkVoice, LoopbackVoiceComponent};
use lavavoice::config::AppConfig;
use lavavoice::domain::{ChannelId, GuildId};
use lavavoice::ports::PlayerBackendPort;

#[derive(Parser, Debug)]
#[clap(version = env!("LAVAVOICE_VERSION"), author = env!("CARGO_PKG_AUTHORS"))]
pub struct Opts {
    /// Configuration file (defaults to the per-user config location)
    #[clap(long, short = 'c')]
    config: Option<PathBuf>,

    /// Guild to connect in
    #[clap(long, short = 'g')]
    guild: u64,

    /// Voice channel to join
    #[clap(long, short = 'C')]
    channel: u64,

    /// Log filter, overridden by RUST_LOG
    #[clap(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&opts.log_level)))
        .init();

    let config = AppConfig::load(opts.config.as_deref())?;
    info!("Using Lavalink node {}", config.lavalink.hostname);

    let node = Arc::new(LavalinkNode::new(&config.lavalink)?);
    let session_id = node.connect().await?;
    info!("Lavalink session {}", session_id);

    let backend: Arc<dyn PlayerBackendPort> = Arc::new(LavalinkHttpBackend::new(&config.lavalink, node.clone())?);
    let host = LoopbackVoiceComponent::new(
        config.gateway.voice_server(),
        config.lavalink.user_id,
        config.gateway.shard_count,
    );

    let connection = LavalinkVoice::connect(backend, host.as_ref(), GuildId(opts.guild), ChannelId(opts.channel)).await?;
    info!(
        "Connected to channel {} in guild {} (shard {})",
        connection.channel_id(),
        connection.guild_id(),
        connection.shard_id()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    host.disconnect_all().await?;
    connection.join().await?;
    node.close().await;

    Ok(())
}
