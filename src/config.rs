use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Result, UserId, VoiceError, VoiceServerInfo};

pub const APP_NAME: &str = "lavavoice";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub lavalink: LavalinkConfig,
    pub gateway: GatewayConfig,
}

/// Connection settings of the Lavalink node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LavalinkConfig {
    /// Example: "localhost:2333"
    pub hostname: String,
    pub is_ssl: bool,
    pub password: String,
    /// The bot user the node plays for.
    pub user_id: UserId,
    /// Session to resume when the websocket connects; empty starts a new one.
    pub session_id: String,
}

impl Default for LavalinkConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost:2333".to_string(),
            is_ssl: false,
            password: "youshallnotpass".to_string(),
            user_id: UserId::default(),
            session_id: String::new(),
        }
    }
}

/// Voice server the loopback host hands to every connection it builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub endpoint: String,
    pub token: String,
    pub session_id: String,
    pub shard_count: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: String::new(),
            session_id: String::new(),
            shard_count: 1,
        }
    }
}

impl GatewayConfig {
    pub fn voice_server(&self) -> VoiceServerInfo {
        VoiceServerInfo::new(self.endpoint.clone(), self.token.clone(), self.session_id.clone())
    }
}

impl AppConfig {
    /// Load from `path`, or from the per-user config location when none is given.
    ///
    /// A missing file is created with default values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let loaded = match path {
            Some(path) => confy::load_path(path),
            None => confy::load(APP_NAME, None),
        };

        loaded.map_err(|e| VoiceError::InvalidConfig(e.to_string()))
    }
}
