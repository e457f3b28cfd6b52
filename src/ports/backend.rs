use crate::domain::{GuildId, PlayerContext, Result};
use async_trait::async_trait;

/// Port for the audio playback backend
#[async_trait]
pub trait PlayerBackendPort: Send + Sync {
    /// Create (or attach to) the playback session of a guild on the given voice server
    async fn create_player_context(
        &self,
        guild_id: GuildId,
        endpoint: &str,
        token: &str,
        session_id: &str,
    ) -> Result<PlayerContext>;
}
