//! Shared test helpers: hand-written bindings in the generator's shape, an
//! in-memory transport, and an observer that records what it sees.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use debugwire_protocol::{Command, Event, MethodTypeMap, ResponseFrame, Response};
use debugwire_utils::{DebugwireError, Result};

use crate::config::SessionConfig;
use crate::connection::{ConnectionState, Connector, Transport};
use crate::observer::SessionObserver;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FooBarRequest {
    pub x: i64,
    #[serde(rename = "frameId", default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FooBarResponse {
    pub y: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FooBazPayload {
    pub z: bool,
}

impl Command for FooBarRequest {
    const METHOD: &'static str = "Foo.bar";
    type Response = FooBarResponse;
}

impl Response for FooBarResponse {
    const METHOD: &'static str = "Foo.bar";
}

impl Event for FooBazPayload {
    const METHOD: &'static str = "Foo.baz";
}

pub fn foo_map() -> MethodTypeMap {
    MethodTypeMap::builder()
        .command::<FooBarRequest>()
        .event::<FooBazPayload>()
        .build()
}

pub fn bar(x: i64) -> FooBarRequest {
    FooBarRequest {
        x,
        ..FooBarRequest::default()
    }
}

/// Observer that keeps a line per callback
#[derive(Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<String>>,
    states: Mutex<Vec<ConnectionState>>,
}

impl RecordingObserver {
    pub fn records(&self) -> Vec<String> {
        self.records.lock().clone()
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.states.lock().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_state_change(&self, _from: ConnectionState, to: ConnectionState) {
        self.states.lock().push(to);
    }

    fn on_unrouted_response(&self, frame: &ResponseFrame) {
        self.records.lock().push(format!("unrouted {:?}", frame.id));
    }

    fn on_unrecognized_message(&self, text: &str) {
        self.records.lock().push(format!("unrecognized {}", text));
    }

    fn on_decode_failure(&self, method: &str, error: &DebugwireError) {
        self.records
            .lock()
            .push(format!("decode_failure {}: {}", method, error));
    }

    fn on_handler_failure(&self, method: &str, message: &str) {
        self.records
            .lock()
            .push(format!("handler_failure {}: {}", method, message));
    }

    fn on_transport_error(&self, error: &DebugwireError) {
        self.records.lock().push(format!("transport_error {}", error));
    }
}

/// The remote end of an in-memory transport
pub struct Peer {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<Result<String>>,
}

impl Peer {
    /// Next frame the session wrote, parsed
    pub async fn recv(&mut self) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(5), self.incoming.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("session closed its sink");
        serde_json::from_str(&text).expect("session wrote invalid JSON")
    }

    pub fn send(&self, frame: Value) {
        self.send_text(frame.to_string());
    }

    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.outgoing.unbounded_send(Ok(text.into()));
    }

    pub fn fail(&self, error: DebugwireError) {
        let _ = self.outgoing.unbounded_send(Err(error));
    }

    /// Stop accepting frames from the session
    pub fn close_incoming(&mut self) {
        self.incoming.close();
    }

    /// Whether the session's sink has gone away
    pub async fn is_disconnected(&mut self) -> bool {
        matches!(
            tokio::time::timeout(Duration::from_secs(5), self.incoming.next()).await,
            Ok(None)
        )
    }
}

pub fn memory_transport() -> (Transport, Peer) {
    let (client_tx, server_rx) = mpsc::unbounded::<String>();
    let (server_tx, client_rx) = mpsc::unbounded::<Result<String>>();

    let sink = client_tx.sink_map_err(|e| DebugwireError::SendFailed(e.to_string()));
    let transport = Transport::new(Box::pin(sink), Box::pin(client_rx));
    let peer = Peer {
        incoming: server_rx,
        outgoing: server_tx,
    };
    (transport, peer)
}

/// Hands out one prepared in-memory transport and counts connect calls
pub struct MemoryConnector {
    transport: Mutex<Option<Transport>>,
    delay: Duration,
    connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> (Arc<Self>, Peer) {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> (Arc<Self>, Peer) {
        let (transport, peer) = memory_transport();
        let connector = Arc::new(Self {
            transport: Mutex::new(Some(transport)),
            delay,
            connects: AtomicUsize::new(0),
        });
        (connector, peer)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    fn connect<'a>(
        &'a self,
        _address: &'a str,
        _config: &'a SessionConfig,
    ) -> BoxFuture<'a, Result<Transport>> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.transport
                .lock()
                .take()
                .ok_or_else(|| DebugwireError::connection("memory transport already used"))
        })
    }
}

/// Never finishes connecting
pub struct HangingConnector;

impl Connector for HangingConnector {
    fn connect<'a>(
        &'a self,
        _address: &'a str,
        _config: &'a SessionConfig,
    ) -> BoxFuture<'a, Result<Transport>> {
        Box::pin(futures::future::pending())
    }
}

/// Poll `check` until it holds or a second passes
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
