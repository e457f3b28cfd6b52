use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::domain::{ChannelId, ConnectionParams, ExtraContext, GuildId, Result, ShardId, VoiceEvent};

/// A bot's presence in one voice channel, as seen by the component managing it.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Voice channel this connection is in
    fn channel_id(&self) -> ChannelId;

    /// Guild this connection is in
    fn guild_id(&self) -> GuildId;

    /// `false` once the connection has been asked to shut down
    fn is_alive(&self) -> bool;

    /// Shard that requested the connection
    fn shard_id(&self) -> ShardId;

    /// Component managing this connection
    fn owner(&self) -> Weak<dyn VoiceComponent>;

    /// Signal the connection to shut down
    async fn disconnect(self: Arc<Self>) -> Result<()>;

    /// Wait for the connection to halt
    async fn join(&self) -> Result<()>;

    /// Submit a gateway voice event to the connection
    async fn notify(&self, event: VoiceEvent) -> Result<()>;
}

/// Builds connections of one concrete type once the host knows the voice server.
#[async_trait]
pub trait VoiceConnectionFactory: Send + Sync {
    async fn initialize(&self, params: ConnectionParams) -> Result<Arc<dyn VoiceConnection>>;
}

/// Host-side voice dispatch: owns the gateway and decides when connections get built.
#[async_trait]
pub trait VoiceComponent: Send + Sync {
    /// Join `channel_id` in `guild_id` and build the connection with `factory`.
    ///
    /// `extra` is passed through to the factory untouched.
    async fn connect_to(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        factory: Arc<dyn VoiceConnectionFactory>,
        extra: ExtraContext,
        deaf: bool,
    ) -> Result<Arc<dyn VoiceConnection>>;
}
