use std::fmt;

use super::GuildId;

#[derive(Debug, Clone)]
pub enum VoiceError {
    MissingContext(String),
    AlreadyConnected(GuildId),
    NotConnected(GuildId),
    BackendUnavailable(String),
    NodeNotReady(String),
    BackendRejected { status: u16, message: String },
    InvalidResponse(String),
    InvalidConfig(String),
}

impl fmt::Display for VoiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceError::MissingContext(key) => write!(f, "Missing connection context: {}", key),
            VoiceError::AlreadyConnected(guild) => write!(f, "Already connected to a voice channel in guild {}", guild),
            VoiceError::NotConnected(guild) => write!(f, "No voice connection for guild {}", guild),
            VoiceError::BackendUnavailable(msg) => write!(f, "Playback backend unavailable: {}", msg),
            VoiceError::NodeNotReady(node) => write!(f, "Lavalink node {} has no live session", node),
            VoiceError::BackendRejected { status, message } => {
                write!(f, "Playback backend rejected request ({}): {}", status, message)
            }
            VoiceError::InvalidResponse(msg) => write!(f, "Invalid backend response: {}", msg),
            VoiceError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for VoiceError {}

pub type Result<T> = std::result::Result<T, VoiceError>;
