use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use url::Url;

use super::CLIENT_NAME;
use crate::config::LavalinkConfig;
use crate::domain::{Result, UserId, VoiceError};

const READY_TIMEOUT: Duration = Duration::from_secs(15);

type NodeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Messages a Lavalink node pushes over its websocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "op")]
enum NodeMessage {
    #[serde(rename = "ready")]
    Ready {
        #[serde(default)]
        resumed: bool,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    #[serde(rename = "stats")]
    Stats {
        players: u32,
        #[serde(rename = "playingPlayers")]
        playing_players: u32,
    },
    #[serde(rename = "event")]
    Event {
        #[serde(rename = "type")]
        event_type: String,
        #[serde(rename = "guildId")]
        guild_id: String,
    },
    #[serde(other)]
    Other,
}

/// Websocket session with a Lavalink node.
///
/// The node hands out the session id every REST player call is scoped to;
/// the session lives as long as this websocket does.
pub struct LavalinkNode {
    websocket_url: Url,
    password: String,
    user_id: UserId,
    resume_session: Option<String>,
    session_id: RwLock<Option<String>>,
    is_running: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl LavalinkNode {
    pub fn new(config: &LavalinkConfig) -> Result<Self> {
        let scheme = if config.is_ssl { "wss" } else { "ws" };
        let websocket_url = Url::parse(&format!("{}://{}/v4/websocket", scheme, config.hostname))
            .map_err(|e| VoiceError::InvalidConfig(format!("Invalid Lavalink hostname {}: {}", config.hostname, e)))?;

        Ok(Self {
            websocket_url,
            password: config.password.clone(),
            user_id: config.user_id,
            resume_session: Some(config.session_id.clone()).filter(|s| !s.is_empty()),
            session_id: RwLock::new(None),
            is_running: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        })
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Session id of the live websocket, if the node is connected.
    pub async fn session_id(&self) -> Option<String> {
        if !self.is_running() {
            return None;
        }
        self.session_id.read().await.clone()
    }

    /// Session id to scope REST calls to, failing while the node is down.
    pub async fn ready_session(&self) -> Result<String> {
        self.session_id()
            .await
            .ok_or_else(|| VoiceError::NodeNotReady(self.websocket_url.to_string()))
    }

    /// Open the websocket and wait for the node's `ready` message.
    ///
    /// Returns the session id; later messages are consumed in the background.
    pub async fn connect(&self) -> Result<String> {
        let request = self.handshake_request()?;

        let (mut stream, _) = tokio::time::timeout(READY_TIMEOUT, tokio_tungstenite::connect_async(request))
            .await
            .map_err(|_| VoiceError::BackendUnavailable(format!("Timed out connecting to {}", self.websocket_url)))?
            .map_err(|e| VoiceError::BackendUnavailable(format!("Websocket connection failed: {}", e)))?;

        info!("Connected to {}", self.websocket_url);

        let (session_id, resumed) = tokio::time::timeout(READY_TIMEOUT, wait_for_ready(&mut stream))
            .await
            .map_err(|_| VoiceError::BackendUnavailable(format!("No ready from {}", self.websocket_url)))??;

        self.on_ready(session_id.clone()).await;
        info!("Lavalink session {} ready (resumed: {})", session_id, resumed);

        let is_running = self.is_running.clone();
        let websocket_url = self.websocket_url.clone();
        let reader = tokio::spawn(async move {
            read_messages(stream).await;
            is_running.store(false, Ordering::Release);
            warn!("Connection to {} closed", websocket_url);
        });

        if let Some(previous) = self.reader.lock().await.replace(reader) {
            previous.abort();
        }

        Ok(session_id)
    }

    /// Drop the websocket. The node discards the session unless resuming is enabled on it.
    pub async fn close(&self) {
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        self.is_running.store(false, Ordering::Release);
    }

    pub(crate) async fn on_ready(&self, session_id: String) {
        *self.session_id.write().await = Some(session_id);
        self.is_running.store(true, Ordering::Release);
    }

    fn handshake_request(&self) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request> {
        let mut request = self
            .websocket_url
            .as_str()
            .into_client_request()
            .map_err(|e| VoiceError::InvalidConfig(format!("Invalid websocket URL: {}", e)))?;

        let headers = request.headers_mut();
        headers.insert("Authorization", header_value(&self.password)?);
        headers.insert("User-Id", header_value(&self.user_id.to_string())?);
        headers.insert("Client-Name", HeaderValue::from_static(CLIENT_NAME));
        if let Some(session_id) = &self.resume_session {
            headers.insert("Session-Id", header_value(session_id)?);
        }

        Ok(request)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| VoiceError::InvalidConfig(format!("Invalid header value: {}", e)))
}

fn parse_ready(text: &str) -> Result<Option<(String, bool)>> {
    match serde_json::from_str::<NodeMessage>(text) {
        Ok(NodeMessage::Ready { session_id, .. }) if session_id.is_empty() => {
            Err(VoiceError::InvalidResponse("Node sent an empty session id".to_string()))
        }
        Ok(NodeMessage::Ready { session_id, resumed }) => Ok(Some((session_id, resumed))),
        Ok(_) => Ok(None),
        Err(e) => {
            debug!("Unrecognized message from node: {}", e);
            Ok(None)
        }
    }
}

async fn wait_for_ready(stream: &mut NodeStream) -> Result<(String, bool)> {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Some(ready) = parse_ready(text.as_str())? {
                    return Ok(ready);
                }
            }
            Ok(Message::Close(frame)) => {
                return Err(VoiceError::BackendUnavailable(format!(
                    "Node closed the websocket before ready: {:?}",
                    frame
                )));
            }
            Ok(_) => {}
            Err(e) => return Err(VoiceError::BackendUnavailable(format!("Websocket error: {}", e))),
        }
    }

    Err(VoiceError::BackendUnavailable("Node closed the websocket before ready".to_string()))
}

async fn read_messages(mut stream: NodeStream) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<NodeMessage>(text.as_str()) {
                Ok(NodeMessage::Stats {
                    players,
                    playing_players,
                }) => trace!("Node stats: {} players, {} playing", players, playing_players),
                Ok(NodeMessage::Event { event_type, guild_id }) => {
                    debug!("{} for guild {}", event_type, guild_id)
                }
                Ok(_) => {}
                Err(e) => debug!("Unrecognized message from node: {}", e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Websocket error: {}", e);
                break;
            }
        }
    }
}
