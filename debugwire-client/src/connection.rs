//! Transports to the remote process
//!
//! The address scheme picks the transport:
//!
//! - `ws://` / `wss://`: WebSocket, one JSON message per text frame
//! - `tcp://host:port`: length-prefixed JSON frames over TCP
//! - `unix:///path` or a bare absolute path: length-prefixed frames over a
//!   Unix socket
//!
//! Every transport is reduced to a sink and a stream of complete text
//! messages, so the session never sees partial frames.

use std::path::PathBuf;
use std::pin::Pin;

use futures::future::{self, BoxFuture};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::codec::Framed;
use tracing::debug;
use url::Url;

use debugwire_protocol::{CodecError, JsonFrameCodec};
use debugwire_utils::{DebugwireError, Result};

use crate::config::SessionConfig;

/// Lifecycle of a session's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not yet connected; the first send connects
    Disconnected,
    Connecting,
    Open,
    /// Dispose in progress
    Closing,
    /// Terminal
    Closed,
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = DebugwireError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A connected, message-oriented duplex channel
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Transport {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

/// Opens transports. The session calls this once, on first send.
pub trait Connector: Send + Sync {
    fn connect<'a>(
        &'a self,
        address: &'a str,
        config: &'a SessionConfig,
    ) -> BoxFuture<'a, Result<Transport>>;
}

/// Connects by address scheme
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnector;

impl Connector for DefaultConnector {
    fn connect<'a>(
        &'a self,
        address: &'a str,
        config: &'a SessionConfig,
    ) -> BoxFuture<'a, Result<Transport>> {
        Box::pin(connect_to_addr(address, config))
    }
}

/// Parsed transport address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    WebSocket(String),
    Tcp(String),
    Unix(PathBuf),
}

impl Address {
    pub fn parse(addr: &str) -> Result<Self> {
        if addr.starts_with("ws://") || addr.starts_with("wss://") {
            Url::parse(addr).map_err(|e| {
                DebugwireError::InvalidAddress(format!("Invalid WebSocket URL '{}': {}", addr, e))
            })?;
            return Ok(Address::WebSocket(addr.to_string()));
        }

        if addr.starts_with("tcp://") {
            let url = Url::parse(addr).map_err(|e| {
                DebugwireError::InvalidAddress(format!("Invalid TCP URL '{}': {}", addr, e))
            })?;
            let host = url.host_str().ok_or_else(|| {
                DebugwireError::InvalidAddress(format!("Missing host in TCP URL '{}'", addr))
            })?;
            let port = url.port().ok_or_else(|| {
                DebugwireError::InvalidAddress(format!("Missing port in TCP URL '{}'", addr))
            })?;
            return Ok(Address::Tcp(format!("{}:{}", host, port)));
        }

        if addr.starts_with("unix://") {
            let url = Url::parse(addr).map_err(|e| {
                DebugwireError::InvalidAddress(format!("Invalid Unix URL '{}': {}", addr, e))
            })?;
            return Ok(Address::Unix(PathBuf::from(url.path())));
        }

        if addr.starts_with('/') {
            return Ok(Address::Unix(PathBuf::from(addr)));
        }

        Err(DebugwireError::InvalidAddress(format!(
            "Unsupported address '{}' (expected ws://, wss://, tcp://, or unix://)",
            addr
        )))
    }
}

/// Open a transport for `addr`
pub async fn connect_to_addr(addr: &str, config: &SessionConfig) -> Result<Transport> {
    let max = config.max_message_size;
    match Address::parse(addr)? {
        Address::WebSocket(url) => connect_websocket(&url, max).await,
        Address::Tcp(tcp_addr) => {
            let stream = TcpStream::connect(&tcp_addr).await.map_err(|e| {
                DebugwireError::connection(format!("Failed to connect to {}: {}", tcp_addr, e))
            })?;
            stream.set_nodelay(true)?;
            debug!("Connected to tcp://{}", tcp_addr);
            Ok(framed(stream, max))
        }
        Address::Unix(path) => connect_unix(path, max).await,
    }
}

#[cfg(unix)]
async fn connect_unix(path: PathBuf, max: usize) -> Result<Transport> {
    let stream = tokio::net::UnixStream::connect(&path).await.map_err(|e| {
        DebugwireError::connection(format!("Failed to connect to {}: {}", path.display(), e))
    })?;
    debug!("Connected to unix://{}", path.display());
    Ok(framed(stream, max))
}

#[cfg(not(unix))]
async fn connect_unix(path: PathBuf, _max: usize) -> Result<Transport> {
    Err(DebugwireError::InvalidAddress(format!(
        "Unix sockets are not supported on this platform: {}",
        path.display()
    )))
}

async fn connect_websocket(url: &str, max: usize) -> Result<Transport> {
    let config = WebSocketConfig::default()
        .max_message_size(Some(max))
        .max_frame_size(Some(max));
    let (ws, _response) = tokio_tungstenite::connect_async_with_config(url, Some(config), true)
        .await
        .map_err(|e| {
            DebugwireError::connection(format!("WebSocket handshake with {} failed: {}", url, e))
        })?;
    debug!("Connected to {}", url);

    let (sink, stream) = ws.split();
    let sink = sink
        .sink_map_err(|e| DebugwireError::SendFailed(e.to_string()))
        .with(move |text: String| {
            future::ready(check_size(text, max).map(|text| Message::Text(text.into())))
        });

    // Ping/pong is answered by tungstenite; close ends the stream
    let stream = stream.filter_map(|msg| {
        future::ready(match msg {
            Ok(msg) => text_of(msg),
            Err(e) => Some(Err(websocket_error(e))),
        })
    });

    Ok(Transport::new(Box::pin(sink), Box::pin(stream)))
}

/// Payload of a data message; control frames yield `None`
fn text_of(msg: Message) -> Option<Result<String>> {
    match msg {
        Message::Text(text) => Some(Ok(text.as_str().to_owned())),
        Message::Binary(data) => Some(
            String::from_utf8(data.to_vec())
                .map_err(|e| DebugwireError::protocol(format!("Binary frame is not UTF-8: {}", e))),
        ),
        _ => None,
    }
}

fn websocket_error(err: WsError) -> DebugwireError {
    match err {
        WsError::Capacity(CapacityError::MessageTooLong { size, max_size }) => {
            DebugwireError::MessageTooLarge {
                size,
                max: max_size,
            }
        }
        other => DebugwireError::connection(other.to_string()),
    }
}

fn check_size(text: String, max: usize) -> Result<String> {
    if text.len() > max {
        return Err(DebugwireError::MessageTooLarge {
            size: text.len(),
            max,
        });
    }
    Ok(text)
}

/// Wrap a byte stream in the length-prefixed JSON codec
pub fn framed<S>(io: S, max_message_size: usize) -> Transport
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (sink, stream) = Framed::new(io, JsonFrameCodec::with_max_size(max_message_size)).split();
    Transport::new(
        Box::pin(sink.sink_map_err(codec_error)),
        Box::pin(stream.map(|frame| frame.map_err(codec_error))),
    )
}

fn codec_error(err: CodecError) -> DebugwireError {
    match err {
        CodecError::Io(e) => DebugwireError::Io(e),
        CodecError::Utf8(e) => DebugwireError::protocol(e.to_string()),
        CodecError::MessageTooLarge { size, max } => DebugwireError::MessageTooLarge { size, max },
    }
}
