#![cfg(test)]
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fake_lavalink;

pub use fake_lavalink::{FakeLavalink, NodeScript, RecordedRequest, Reply};
