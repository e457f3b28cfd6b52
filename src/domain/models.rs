use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::Result;
use crate::ports::{VoiceComponent, VoiceConnection};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                $name(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(
    /// Platform identifier of a guild (server).
    GuildId
);
snowflake!(
    /// Platform identifier of a voice channel.
    ChannelId
);
snowflake!(
    /// Platform identifier of a user, usually the bot itself.
    UserId
);
snowflake!(
    /// Gateway shard responsible for a guild.
    ShardId
);

/// Shard that receives gateway events for `guild_id` when the bot runs
/// `shard_count` shards.
pub fn shard_for_guild(guild_id: GuildId, shard_count: u64) -> ShardId {
    ShardId((guild_id.0 >> 22) % shard_count.max(1))
}

/// Teardown callback handed to a connection by its owner.
pub type OnClose = Arc<dyn Fn(Arc<dyn VoiceConnection>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Credentials of the voice server a connection should attach to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceServerInfo {
    pub endpoint: String,
    pub token: String,
    pub session_id: String,
}

impl VoiceServerInfo {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            session_id: session_id.into(),
        }
    }
}

/// Backend-side playback session for a guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerContext {
    pub guild_id: GuildId,
    pub node_session_id: String,
    pub voice: VoiceServerInfo,
    pub volume: u16,
    pub paused: bool,
}

/// Identifiers of a live connection. Immutable once built.
#[derive(Clone)]
pub struct ConnectionRecord {
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub shard_id: ShardId,
    pub owner: Weak<dyn VoiceComponent>,
    pub on_close: OnClose,
}

impl fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("channel_id", &self.channel_id)
            .field("guild_id", &self.guild_id)
            .field("shard_id", &self.shard_id)
            .finish()
    }
}

/// Everything a host passes to a connection type when it is time to build one.
pub struct ConnectionParams {
    pub channel_id: ChannelId,
    pub endpoint: String,
    pub guild_id: GuildId,
    pub on_close: OnClose,
    pub owner: Weak<dyn VoiceComponent>,
    pub session_id: String,
    pub shard_id: ShardId,
    pub token: String,
    pub user_id: UserId,
    pub extra: ExtraContext,
}

impl ConnectionParams {
    pub fn into_record(self) -> (ConnectionRecord, ExtraContext) {
        let record = ConnectionRecord {
            channel_id: self.channel_id,
            guild_id: self.guild_id,
            shard_id: self.shard_id,
            owner: self.owner,
            on_close: self.on_close,
        };
        (record, self.extra)
    }
}

/// Extra construction context carried through a host untouched, keyed by type.
#[derive(Default)]
pub struct ExtraContext {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ExtraContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Stores `value`, returning the previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values.get(&TypeId::of::<T>()).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ExtraContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtraContext").field("len", &self.values.len()).finish()
    }
}

/// Snapshot of a connection tracked by a host.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: uuid::Uuid,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub shard_id: ShardId,
    pub deaf: bool,
    pub is_alive: bool,
    pub opened_at: std::time::Instant,
}

/// Voice-related gateway events a host forwards to connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceEvent {
    StateUpdate {
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        user_id: UserId,
        session_id: String,
    },
    ServerUpdate {
        guild_id: GuildId,
        endpoint: Option<String>,
        token: String,
    },
}

impl VoiceEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            VoiceEvent::StateUpdate { guild_id, .. } => *guild_id,
            VoiceEvent::ServerUpdate { guild_id, .. } => *guild_id,
        }
    }
}
