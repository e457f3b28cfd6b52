use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::{LavalinkNode, CLIENT_NAME};
use crate::config::LavalinkConfig;
use crate::domain::{GuildId, PlayerContext, Result, UserId, VoiceError, VoiceServerInfo};
use crate::ports::PlayerBackendPort;

/// Playback backend speaking the Lavalink v4 REST API.
///
/// Player calls are scoped to the session of `node`, so the node must be
/// connected before a player context can be created.
pub struct LavalinkHttpBackend {
    client: reqwest::Client,
    base_url: Url,
    password: String,
    user_id: UserId,
    node: Arc<LavalinkNode>,
}

#[derive(Debug, Serialize)]
struct UpdatePlayer {
    voice: VoiceState,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoiceState {
    token: String,
    endpoint: String,
    session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Player {
    guild_id: String,
    #[serde(default = "default_volume")]
    volume: u16,
    #[serde(default)]
    paused: bool,
    voice: VoiceState,
}

fn default_volume() -> u16 {
    100
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl LavalinkHttpBackend {
    pub fn new(config: &LavalinkConfig, node: Arc<LavalinkNode>) -> Result<Self> {
        let scheme = if config.is_ssl { "https" } else { "http" };
        let base_url = Url::parse(&format!("{}://{}/v4/", scheme, config.hostname))
            .map_err(|e| VoiceError::InvalidConfig(format!("Invalid Lavalink hostname {}: {}", config.hostname, e)))?;

        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| VoiceError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            password: config.password.clone(),
            user_id: config.user_id,
            node,
        })
    }

    fn player_url(&self, session_id: &str, guild_id: GuildId) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("sessions/{}/players/{}", session_id, guild_id))
            .map_err(|e| VoiceError::InvalidConfig(format!("Invalid player URL: {}", e)))?;

        url.query_pairs_mut().append_pair("noReplace", "true");
        Ok(url)
    }

    fn player_context(&self, body: &[u8], node_session_id: String) -> Result<PlayerContext> {
        let player: Player = serde_json::from_slice(body)
            .map_err(|e| VoiceError::InvalidResponse(format!("Malformed player: {}", e)))?;

        let guild_id = player
            .guild_id
            .parse::<u64>()
            .map_err(|e| VoiceError::InvalidResponse(format!("Invalid guild id {}: {}", player.guild_id, e)))?;

        Ok(PlayerContext {
            guild_id: GuildId(guild_id),
            node_session_id,
            voice: VoiceServerInfo::new(player.voice.endpoint, player.voice.token, player.voice.session_id),
            volume: player.volume,
            paused: player.paused,
        })
    }
}

fn rejection(status: u16, body: &[u8]) -> VoiceError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned());

    VoiceError::BackendRejected { status, message }
}

#[async_trait]
impl PlayerBackendPort for LavalinkHttpBackend {
    async fn create_player_context(
        &self,
        guild_id: GuildId,
        endpoint: &str,
        token: &str,
        session_id: &str,
    ) -> Result<PlayerContext> {
        let node_session_id = self.node.ready_session().await?;
        let url = self.player_url(&node_session_id, guild_id)?;
        let body = serde_json::to_vec(&UpdatePlayer {
            voice: VoiceState {
                token: token.to_string(),
                endpoint: endpoint.to_string(),
                session_id: session_id.to_string(),
            },
        })
        .map_err(|e| VoiceError::InvalidResponse(format!("Failed to encode player update: {}", e)))?;

        debug!("PATCH {}", url);

        let response = self
            .client
            .patch(url)
            .header(reqwest::header::AUTHORIZATION, &self.password)
            .header("User-Id", self.user_id.to_string())
            .header("Client-Name", CLIENT_NAME)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| VoiceError::BackendUnavailable(format!("Player update failed: {}", e)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| VoiceError::BackendUnavailable(format!("Failed to read player update response: {}", e)))?;

        if !status.is_success() {
            return Err(rejection(status.as_u16(), &bytes));
        }

        let player = self.player_context(&bytes, node_session_id)?;
        info!("Player ready for guild {} on {}", player.guild_id, player.voice.endpoint);

        Ok(player)
    }
}
