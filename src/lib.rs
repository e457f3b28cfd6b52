//! Voice connections for chat-platform bots whose audio is played by a Lavalink node.
//!
//! The host framework keeps ownership of the voice gateway; [`adapters::LavalinkVoice`]
//! plugs into it through the [`ports::VoiceConnection`] interface and asks the
//! playback backend for a per-guild player.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
