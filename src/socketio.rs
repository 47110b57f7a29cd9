//! Minimal Socket.IO (v5 over Engine.IO v4) client for a single WebSocket.
//!
//! Only the text packets Uptime Kuma uses are supported: the Engine.IO open,
//! ping/pong and message packets, and the Socket.IO connect, disconnect,
//! event and ack packets on the default namespace. Binary attachments are
//! rejected.

use crate::api::ApiError;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

/// Malformed or unsupported packet text.
#[derive(Error, Debug, PartialEq)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(char),
    #[error("binary packets are not supported")]
    Binary,
    #[error("invalid JSON payload: {0}")]
    Json(String),
    #[error("event packet without an event name")]
    MissingEventName,
}

/// Engine.IO transport packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Value),
    Close,
    Ping(String),
    Pong(String),
    /// Payload for the Socket.IO layer.
    Message(String),
    Upgrade,
    Noop,
}

/// Socket.IO packet on the default namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event {
        ack: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        id: u64,
        args: Vec<Value>,
    },
    ConnectError(Value),
}

pub fn decode_engine(text: &str) -> Result<EnginePacket, PacketError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|e| PacketError::Json(e.to_string())),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(rest.to_string())),
        '3' => Ok(EnginePacket::Pong(rest.to_string())),
        '4' => Ok(EnginePacket::Message(rest.to_string())),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        'b' => Err(PacketError::Binary),
        other => Err(PacketError::UnknownType(other)),
    }
}

pub fn decode_socket(body: &str) -> Result<SocketPacket, PacketError> {
    let mut chars = body.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let mut rest = chars.as_str();

    // Non-default namespaces are prefixed as "/name,".
    if rest.starts_with('/') {
        rest = match rest.find(',') {
            Some(idx) => &rest[idx + 1..],
            None => "",
        };
    }

    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let (id_part, payload) = rest.split_at(digits);
    let id = id_part.parse::<u64>().ok();

    let parse = |text: &str| -> Result<Option<Value>, PacketError> {
        if text.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(text)
            .map(Some)
            .map_err(|e| PacketError::Json(e.to_string()))
    };

    match kind {
        '0' => Ok(SocketPacket::Connect(parse(rest)?)),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => {
            let mut args = into_args(parse(payload)?);
            if args.is_empty() {
                return Err(PacketError::MissingEventName);
            }
            let name = match args.remove(0) {
                Value::String(name) => name,
                _ => return Err(PacketError::MissingEventName),
            };
            Ok(SocketPacket::Event {
                ack: id,
                name,
                args,
            })
        }
        '3' => Ok(SocketPacket::Ack {
            id: id.unwrap_or_default(),
            args: into_args(parse(payload)?),
        }),
        '4' => Ok(SocketPacket::ConnectError(
            parse(rest)?.unwrap_or(Value::Null),
        )),
        '5' | '6' => Err(PacketError::Binary),
        other => Err(PacketError::UnknownType(other)),
    }
}

fn into_args(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
        None => Vec::new(),
    }
}

/// Encode an event as a full Engine.IO message frame: `42<ack>["name",...]`.
pub fn encode_event(ack: Option<u64>, name: &str, args: &[Value]) -> String {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(Value::String(name.to_string()));
    items.extend(args.iter().cloned());
    let id = ack.map(|id| id.to_string()).unwrap_or_default();
    format!("42{}{}", id, Value::Array(items))
}

/// WebSocket endpoint for a server base URL:
/// `http(s)://host[/base]` becomes `ws(s)://host[/base]/socket.io/?EIO=4&transport=websocket`.
pub fn endpoint_for(base: &Url) -> Result<Url, ApiError> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ApiError::Connection(format!(
                "unsupported URL scheme {other:?}"
            )))
        }
    };
    let mut endpoint = base.clone();
    endpoint
        .set_scheme(scheme)
        .map_err(|_| ApiError::Connection(format!("cannot use {base} as a WebSocket URL")))?;
    let path = format!("{}/socket.io/", base.path().trim_end_matches('/'));
    endpoint.set_path(&path);
    endpoint.set_query(Some("EIO=4&transport=websocket"));
    endpoint.set_fragment(None);
    Ok(endpoint)
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open Socket.IO session on the default namespace.
pub struct Connection {
    ws: Socket,
    next_ack: u64,
    /// Most recent arguments of every server-pushed event.
    events: HashMap<String, Vec<Value>>,
    timeout: Duration,
}

impl Connection {
    /// Connect, complete the Engine.IO handshake and join the default namespace.
    pub async fn open(endpoint: &Url, timeout: Duration) -> Result<Self, ApiError> {
        tracing::debug!(endpoint = %endpoint, "opening socket.io connection");
        let (ws, _response) =
            tokio::time::timeout(timeout, tokio_tungstenite::connect_async(endpoint.as_str()))
                .await
                .map_err(|_| ApiError::Timeout("connection".to_string()))?
                .map_err(|e| ApiError::Connection(e.to_string()))?;

        let mut conn = Self {
            ws,
            next_ack: 0,
            events: HashMap::new(),
            timeout,
        };

        tokio::time::timeout(timeout, conn.handshake())
            .await
            .map_err(|_| ApiError::Timeout("handshake".to_string()))??;
        Ok(conn)
    }

    async fn handshake(&mut self) -> Result<(), ApiError> {
        match self.next_engine_packet().await? {
            EnginePacket::Open(info) => {
                tracing::debug!(sid = %info["sid"], "engine.io session opened");
            }
            other => {
                return Err(ApiError::protocol(
                    "handshake",
                    format!("expected open packet, got {other:?}"),
                ))
            }
        }

        self.send_text("40".to_string()).await?;

        loop {
            match self.next_packet().await? {
                SocketPacket::Connect(_) => return Ok(()),
                SocketPacket::ConnectError(err) => {
                    return Err(ApiError::Connection(format!("namespace refused: {err}")))
                }
                SocketPacket::Event { name, args, .. } => self.stash(name, args),
                SocketPacket::Disconnect => {
                    return Err(ApiError::Connection(
                        "server closed the session during handshake".into(),
                    ))
                }
                other => tracing::debug!(packet = ?other, "ignoring packet during handshake"),
            }
        }
    }

    /// Emit `event` and wait for its acknowledgement, returning the first
    /// acknowledgement argument (or `null`).
    pub async fn call(&mut self, event: &str, args: Vec<Value>) -> Result<Value, ApiError> {
        let id = self.next_ack;
        self.next_ack += 1;
        self.send_text(encode_event(Some(id), event, &args)).await?;
        tracing::debug!(event, ack = id, "emitted");

        tokio::time::timeout(self.timeout, self.wait_for_ack(id))
            .await
            .map_err(|_| ApiError::Timeout(event.to_string()))?
    }

    async fn wait_for_ack(&mut self, id: u64) -> Result<Value, ApiError> {
        loop {
            match self.next_packet().await? {
                SocketPacket::Ack { id: got, args } if got == id => {
                    return Ok(args.into_iter().next().unwrap_or(Value::Null));
                }
                SocketPacket::Ack { id: got, .. } => {
                    tracing::debug!(expected = id, got, "ignoring stale ack");
                }
                SocketPacket::Event { name, args, .. } => self.stash(name, args),
                SocketPacket::Disconnect => {
                    return Err(ApiError::Connection("server closed the session".into()))
                }
                other => tracing::debug!(packet = ?other, "ignoring packet"),
            }
        }
    }

    /// Arguments of the most recent `event` push, waiting for one if none has
    /// arrived yet.
    pub async fn event(&mut self, event: &str) -> Result<Vec<Value>, ApiError> {
        if let Some(args) = self.events.get(event) {
            return Ok(args.clone());
        }
        tokio::time::timeout(self.timeout, self.wait_for_event(event.to_string()))
            .await
            .map_err(|_| ApiError::Timeout(event.to_string()))?
    }

    async fn wait_for_event(&mut self, wanted: String) -> Result<Vec<Value>, ApiError> {
        loop {
            match self.next_packet().await? {
                SocketPacket::Event { name, args, .. } => {
                    let found = name == wanted;
                    self.stash(name, args.clone());
                    if found {
                        return Ok(args);
                    }
                }
                SocketPacket::Disconnect => {
                    return Err(ApiError::Connection("server closed the session".into()))
                }
                other => tracing::debug!(packet = ?other, "ignoring packet"),
            }
        }
    }

    /// Already-received arguments of `event`, without waiting.
    pub fn last_event(&self, event: &str) -> Option<&[Value]> {
        self.events.get(event).map(Vec::as_slice)
    }

    /// Leave the namespace and close the WebSocket.
    pub async fn close(mut self) -> Result<(), ApiError> {
        self.send_text("41".to_string()).await?;
        self.ws
            .close(None)
            .await
            .map_err(|e| ApiError::Connection(e.to_string()))
    }

    fn stash(&mut self, name: String, args: Vec<Value>) {
        tracing::trace!(event = %name, "server event");
        self.events.insert(name, args);
    }

    async fn send_text(&mut self, text: String) -> Result<(), ApiError> {
        self.ws
            .send(Message::Text(text))
            .await
            .map_err(|e| ApiError::Connection(e.to_string()))
    }

    async fn next_packet(&mut self) -> Result<SocketPacket, ApiError> {
        loop {
            if let EnginePacket::Message(body) = self.next_engine_packet().await? {
                return decode_socket(&body)
                    .map_err(|e| ApiError::protocol("socket.io packet", e.to_string()));
            }
        }
    }

    /// Next Engine.IO packet that needs the caller's attention. Pings are
    /// answered here.
    async fn next_engine_packet(&mut self) -> Result<EnginePacket, ApiError> {
        loop {
            let frame = match self.ws.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(ApiError::Connection(e.to_string())),
                None => return Err(ApiError::Connection("connection closed by server".into())),
            };
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => {
                    return Err(ApiError::Connection("connection closed by server".into()))
                }
                _ => continue,
            };
            let packet = decode_engine(&text)
                .map_err(|e| ApiError::protocol("engine.io packet", e.to_string()))?;
            match packet {
                EnginePacket::Ping(data) => self.send_text(format!("3{data}")).await?,
                EnginePacket::Pong(_) | EnginePacket::Noop | EnginePacket::Upgrade => {}
                EnginePacket::Close => {
                    return Err(ApiError::Connection("server closed the transport".into()))
                }
                other => return Ok(other),
            }
        }
    }
}
