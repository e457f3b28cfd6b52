use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::{info, trace, warn};
use uuid::Uuid;

use crate::domain::{
    shard_for_guild, ChannelId, ConnectionInfo, ConnectionParams, ExtraContext, GuildId, OnClose, Result, UserId,
    VoiceError, VoiceEvent, VoiceServerInfo,
};
use crate::ports::{VoiceComponent, VoiceConnection, VoiceConnectionFactory};

struct TrackedConnection {
    id: Uuid,
    connection: Arc<dyn VoiceConnection>,
    deaf: bool,
    opened_at: Instant,
}

impl TrackedConnection {
    fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            guild_id: self.connection.guild_id(),
            channel_id: self.connection.channel_id(),
            shard_id: self.connection.shard_id(),
            deaf: self.deaf,
            is_alive: self.connection.is_alive(),
            opened_at: self.opened_at,
        }
    }
}

type Registry = Arc<RwLock<HashMap<GuildId, TrackedConnection>>>;

/// In-process voice component that takes its voice server from configuration
/// instead of negotiating it over a gateway.
///
/// One connection per guild; a connection leaves the registry when it disconnects.
pub struct LoopbackVoiceComponent {
    me: Weak<LoopbackVoiceComponent>,
    server: VoiceServerInfo,
    user_id: UserId,
    shard_count: u64,
    connections: Registry,
}

impl LoopbackVoiceComponent {
    pub fn new(server: VoiceServerInfo, user_id: UserId, shard_count: u64) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            server,
            user_id,
            shard_count,
            connections: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub async fn connection(&self, guild_id: GuildId) -> Option<Arc<dyn VoiceConnection>> {
        let conns = self.connections.read().await;
        conns.get(&guild_id).map(|c| c.connection.clone())
    }

    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let conns = self.connections.read().await;
        conns.values().map(TrackedConnection::info).collect()
    }

    /// Route a gateway voice event to the connection of its guild, if any.
    pub async fn dispatch(&self, event: VoiceEvent) -> Result<()> {
        match self.connection(event.guild_id()).await {
            Some(connection) => connection.notify(event).await,
            None => {
                trace!("No voice connection for guild {}, dropping event", event.guild_id());
                Ok(())
            }
        }
    }

    /// Disconnect every tracked connection, returning the first failure.
    pub async fn disconnect_all(&self) -> Result<()> {
        let connections: Vec<Arc<dyn VoiceConnection>> = {
            let conns = self.connections.read().await;
            conns.values().map(|c| c.connection.clone()).collect()
        };

        let mut first_error = None;
        for connection in connections {
            let guild_id = connection.guild_id();
            if let Err(e) = connection.disconnect().await {
                warn!("Failed to disconnect from guild {}: {}", guild_id, e);
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn on_close(&self) -> OnClose {
        let connections = self.connections.clone();

        Arc::new(move |closed: Arc<dyn VoiceConnection>| -> BoxFuture<'static, Result<()>> {
            let connections = connections.clone();
            Box::pin(async move {
                let guild_id = closed.guild_id();
                let mut conns = connections.write().await;

                let is_tracked = conns
                    .get(&guild_id)
                    .map_or(false, |c| Arc::ptr_eq(&c.connection, &closed));
                if is_tracked {
                    conns.remove(&guild_id);
                    info!("Voice connection in guild {} closed", guild_id);
                }

                Ok(())
            })
        })
    }
}

#[async_trait]
impl VoiceComponent for LoopbackVoiceComponent {
    async fn connect_to(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        factory: Arc<dyn VoiceConnectionFactory>,
        extra: ExtraContext,
        deaf: bool,
    ) -> Result<Arc<dyn VoiceConnection>> {
        if self.connections.read().await.contains_key(&guild_id) {
            return Err(VoiceError::AlreadyConnected(guild_id));
        }

        let shard_id = shard_for_guild(guild_id, self.shard_count);
        info!(
            "Joining channel {} in guild {} (shard {}, deaf: {})",
            channel_id, guild_id, shard_id, deaf
        );

        let owner: Weak<dyn VoiceComponent> = self.me.clone();
        let connection = factory
            .initialize(ConnectionParams {
                channel_id,
                endpoint: self.server.endpoint.clone(),
                guild_id,
                on_close: self.on_close(),
                owner,
                session_id: self.server.session_id.clone(),
                shard_id,
                token: self.server.token.clone(),
                user_id: self.user_id,
                extra,
            })
            .await?;

        let mut conns = self.connections.write().await;
        if conns.contains_key(&guild_id) {
            drop(conns);
            warn!("Guild {} got connected concurrently, dropping new connection", guild_id);
            if let Err(e) = connection.disconnect().await {
                warn!("Failed to drop duplicate connection in guild {}: {}", guild_id, e);
            }
            return Err(VoiceError::AlreadyConnected(guild_id));
        }

        conns.insert(
            guild_id,
            TrackedConnection {
                id: Uuid::new_v4(),
                connection: connection.clone(),
                deaf,
                opened_at: Instant::now(),
            },
        );

        Ok(connection)
    }
}
