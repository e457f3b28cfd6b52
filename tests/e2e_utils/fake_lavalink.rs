#![cfg(test)]
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer like Lavalink does: the updated player, voice state echoed back
    EchoPlayer,
    Fixed { status: u16, body: String },
}

/// How the fake node behaves on `/v4/websocket`
#[derive(Debug, Clone)]
pub enum NodeScript {
    /// Send `ready` (resuming when the client asks to) and keep the socket open
    Ready { session_id: String },
    /// Send `ready`, then close the socket
    ReadyThenClose { session_id: String },
    /// Close the socket without sending `ready`
    CloseBeforeReady,
}

type Handshakes = Arc<Mutex<Vec<HashMap<String, String>>>>;

/// Minimal HTTP/1.1 + websocket server standing in for a Lavalink node
pub struct FakeLavalink {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handshakes: Handshakes,
    _server_handle: JoinHandle<()>,
}

impl FakeLavalink {
    pub async fn start(reply: Reply) -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_with_node(
            reply,
            NodeScript::Ready {
                session_id: "la4u9j".to_string(),
            },
        )
        .await
    }

    pub async fn start_with_node(reply: Reply, node: NodeScript) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handshakes: Handshakes = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        let recorded_handshakes = handshakes.clone();
        let server_handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(Self::handle_connection(
                    socket,
                    reply.clone(),
                    node.clone(),
                    recorded.clone(),
                    recorded_handshakes.clone(),
                ));
            }
        });

        Ok(Self {
            addr,
            requests,
            handshakes,
            _server_handle: server_handle,
        })
    }

    pub fn hostname(&self) -> String {
        self.addr.to_string()
    }

    /// REST requests, websocket upgrades excluded
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Headers of every websocket handshake, names lowercased
    pub fn node_handshakes(&self) -> Vec<HashMap<String, String>> {
        self.handshakes.lock().unwrap().clone()
    }

    async fn handle_connection(
        mut socket: TcpStream,
        reply: Reply,
        node: NodeScript,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
        handshakes: Handshakes,
    ) {
        let mut prefix = [0u8; 4];
        let n = socket.peek(&mut prefix).await.unwrap_or(0);
        if prefix[..n].starts_with(b"GET ") {
            Self::handle_websocket(socket, node, handshakes).await;
            return;
        }

        let request = match Self::read_request(&mut socket).await {
            Some(request) => request,
            None => return,
        };
        eprintln!("[FakeLavalink] {} {}", request.method, request.path);

        let (status, body) = match reply {
            Reply::EchoPlayer => (200, Self::echo_player(&request)),
            Reply::Fixed { status, body } => (status, body),
        };
        requests.lock().unwrap().push(request);

        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            if status < 400 { "OK" } else { "Error" },
            body.len(),
            body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    }

    async fn handle_websocket(socket: TcpStream, node: NodeScript, handshakes: Handshakes) {
        let captured = handshakes.clone();
        let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let headers = request
                .headers()
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), value.to_str().unwrap_or_default().to_string()))
                .collect();
            captured.lock().unwrap().push(headers);
            Ok(response)
        };

        let mut ws = match tokio_tungstenite::accept_hdr_async(socket, callback).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("[FakeLavalink] websocket handshake failed: {}", e);
                return;
            }
        };
        eprintln!("[FakeLavalink] websocket open");

        let resume = handshakes
            .lock()
            .unwrap()
            .last()
            .and_then(|headers| headers.get("session-id").cloned());

        let session_id = match node {
            NodeScript::CloseBeforeReady => {
                let _ = ws.close(None).await;
                return;
            }
            NodeScript::Ready { ref session_id } | NodeScript::ReadyThenClose { ref session_id } => session_id.clone(),
        };

        let ready = serde_json::json!({
            "op": "ready",
            "resumed": resume.is_some(),
            "sessionId": resume.unwrap_or(session_id),
        });
        if ws.send(Message::Text(ready.to_string().into())).await.is_err() {
            return;
        }

        if let NodeScript::ReadyThenClose { .. } = node {
            let _ = ws.close(None).await;
            return;
        }

        let stats = serde_json::json!({"op": "stats", "players": 0, "playingPlayers": 0, "uptime": 1});
        let _ = ws.send(Message::Text(stats.to_string().into())).await;

        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    }

    async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buffer.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let mut lines = head.lines();
        let mut first_line = lines.next()?.split_whitespace();
        let method = first_line.next()?.to_string();
        let path = first_line.next()?.to_string();

        let headers: HashMap<String, String> = lines
            .filter_map(|line| {
                let mut parts = line.splitn(2, ": ");
                Some((parts.next()?.to_lowercase(), parts.next()?.to_string()))
            })
            .collect();

        let content_length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        while buffer.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
        }

        let body_end = buffer.len().min(header_end + content_length);
        let body = String::from_utf8_lossy(&buffer[header_end..body_end]).to_string();

        Some(RecordedRequest {
            method,
            path,
            headers,
            body,
        })
    }

    fn echo_player(request: &RecordedRequest) -> String {
        let guild_id = request
            .path
            .split('?')
            .next()
            .and_then(|p| p.rsplit('/').next())
            .unwrap_or_default()
            .to_string();
        let update: serde_json::Value = serde_json::from_str(&request.body).unwrap_or_default();

        serde_json::json!({
            "guildId": guild_id,
            "track": null,
            "volume": 100,
            "paused": false,
            "state": {"time": 0, "position": 0, "connected": false, "ping": -1},
            "voice": update["voice"],
            "filters": {}
        })
        .to_string()
    }
}
