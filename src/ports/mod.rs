pub mod backend;
pub mod voice;

pub use backend::PlayerBackendPort;
pub use voice::{VoiceComponent, VoiceConnection, VoiceConnectionFactory};
