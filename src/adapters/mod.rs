pub mod lavalink_http;
pub mod lavalink_node;
pub mod lavalink_voice;
pub mod loopback_host;

pub use lavalink_http::LavalinkHttpBackend;
pub use lavalink_node::LavalinkNode;
pub use lavalink_voice::{LavalinkVoice, LavalinkVoiceFactory};
pub use loopback_host::LoopbackVoiceComponent;

/// Sent as `Client-Name` to Lavalink nodes.
pub(crate) const CLIENT_NAME: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("LAVAVOICE_VERSION"));
