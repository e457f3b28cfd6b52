use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::{debug, info, trace};

use crate::domain::{
    ChannelId, ConnectionParams, ConnectionRecord, ExtraContext, GuildId, PlayerContext, Result, ShardId, VoiceError,
    VoiceEvent,
};
use crate::ports::{PlayerBackendPort, VoiceComponent, VoiceConnection, VoiceConnectionFactory};

/// Voice connection whose audio is handled by a Lavalink player.
///
/// The host keeps driving the voice gateway; this connection only asks the
/// backend for a player bound to the voice server the host negotiated.
pub struct LavalinkVoice {
    player: PlayerContext,
    backend: Arc<dyn PlayerBackendPort>,
    record: ConnectionRecord,
    is_alive: AtomicBool,
}

impl LavalinkVoice {
    pub fn new(player: PlayerContext, backend: Arc<dyn PlayerBackendPort>, record: ConnectionRecord, is_alive: bool) -> Self {
        Self {
            player,
            backend,
            record,
            is_alive: AtomicBool::new(is_alive),
        }
    }

    /// Ask `host` to join `channel_id`, building the connection as a `LavalinkVoice`.
    pub async fn connect(
        backend: Arc<dyn PlayerBackendPort>,
        host: &dyn VoiceComponent,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>> {
        let extra = ExtraContext::new().with(backend);

        host.connect_to(guild_id, channel_id, Arc::new(LavalinkVoiceFactory), extra, true)
            .await
    }

    /// Create the guild's player on the backend carried in `params.extra`.
    pub async fn initialize(params: ConnectionParams) -> Result<Arc<Self>> {
        let backend = params
            .extra
            .get::<Arc<dyn PlayerBackendPort>>()
            .cloned()
            .ok_or_else(|| VoiceError::MissingContext("playback backend".to_string()))?;

        let player = backend
            .create_player_context(params.guild_id, &params.endpoint, &params.token, &params.session_id)
            .await?;

        debug!(
            "Player created for guild {} on node session {}",
            player.guild_id, player.node_session_id
        );

        let (record, _extra) = params.into_record();

        Ok(Arc::new(Self::new(player, backend, record, true)))
    }

    pub fn player(&self) -> &PlayerContext {
        &self.player
    }

    pub fn backend(&self) -> &Arc<dyn PlayerBackendPort> {
        &self.backend
    }
}

impl fmt::Debug for LavalinkVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LavalinkVoice")
            .field("player", &self.player)
            .field("record", &self.record)
            .field("is_alive", &self.is_alive())
            .finish()
    }
}

#[async_trait]
impl VoiceConnection for LavalinkVoice {
    fn channel_id(&self) -> ChannelId {
        self.record.channel_id
    }

    fn guild_id(&self) -> GuildId {
        self.record.guild_id
    }

    fn is_alive(&self) -> bool {
        self.is_alive.load(Ordering::Acquire)
    }

    fn shard_id(&self) -> ShardId {
        self.record.shard_id
    }

    fn owner(&self) -> Weak<dyn VoiceComponent> {
        self.record.owner.clone()
    }

    async fn disconnect(self: Arc<Self>) -> Result<()> {
        if !self.is_alive.swap(false, Ordering::AcqRel) {
            debug!("Voice connection in guild {} already disconnected", self.record.guild_id);
            return Ok(());
        }

        info!(
            "Disconnecting from channel {} in guild {}",
            self.record.channel_id, self.record.guild_id
        );

        let on_close = self.record.on_close.clone();
        let this: Arc<dyn VoiceConnection> = self;
        on_close(this).await
    }

    async fn join(&self) -> Result<()> {
        Ok(())
    }

    async fn notify(&self, event: VoiceEvent) -> Result<()> {
        trace!("Ignoring voice event for guild {}: {:?}", self.record.guild_id, event);
        Ok(())
    }
}

/// Connection type handed to hosts so they build `LavalinkVoice` connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct LavalinkVoiceFactory;

#[async_trait]
impl VoiceConnectionFactory for LavalinkVoiceFactory {
    async fn initialize(&self, params: ConnectionParams) -> Result<Arc<dyn VoiceConnection>> {
        let voice: Arc<dyn VoiceConnection> = LavalinkVoice::initialize(params).await?;
        Ok(voice)
    }
}
