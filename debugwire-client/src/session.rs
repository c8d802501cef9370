//! A session with one remote process
//!
//! The session connects lazily on the first send. Once open it runs three
//! tasks: a writer that puts one frame on the wire at a time, a reader that
//! classifies inbound messages and completes pending requests, and a
//! delivery task that runs event handlers in receive order. Handlers run on
//! the blocking pool behind an unbounded queue, so the reader never waits on
//! them and a slow handler never holds up responses.
//!
//! Any transport failure is terminal: pending requests fail, and the session
//! moves to [`ConnectionState::Closed`].

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use debugwire_protocol::{
    classify, Command, Event, EventFrame, InboundMessage, MethodTypeMap, OutgoingCommand,
};
use debugwire_utils::{DebugwireError, Result};

use crate::commands::{CommandDispatcher, Routing};
use crate::config::SessionConfig;
use crate::connection::{ConnectionState, Connector, DefaultConnector, FrameSink, FrameStream};
use crate::events::{EventDispatcher, SubscriptionId};
use crate::observer::{SessionObserver, TracingObserver};

/// A serialized command queued for the writer
struct WriteRequest {
    id: i64,
    text: String,
}

/// State shared with the background tasks
struct Core {
    state: Mutex<ConnectionState>,
    methods: Arc<MethodTypeMap>,
    observer: Arc<dyn SessionObserver>,
    commands: Arc<CommandDispatcher>,
    events: EventDispatcher,
}

impl Core {
    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Move to `to` if the current state is one of `from`
    fn transition(&self, from: &[ConnectionState], to: ConnectionState) -> bool {
        let old = {
            let mut state = self.state.lock();
            if !from.contains(&*state) {
                return false;
            }
            std::mem::replace(&mut *state, to)
        };
        if old != to {
            self.observer.on_state_change(old, to);
        }
        true
    }

    /// The transport is gone; nothing more can be sent or received
    fn terminate(&self) {
        use ConnectionState::*;
        self.transition(&[Disconnected, Connecting, Open, Closing], Closed);
        let failed = self.commands.close_all(|| DebugwireError::ConnectionClosed);
        if failed > 0 {
            debug!("Failed {} pending requests after transport loss", failed);
        }
    }

    fn route(&self, text: String) -> Option<EventFrame> {
        match classify(&text) {
            InboundMessage::Response(frame) => {
                if let Routing::Unrouted(frame) = self.commands.complete(frame) {
                    self.observer.on_unrouted_response(&frame);
                }
                None
            }
            InboundMessage::Event(frame) => Some(frame),
            InboundMessage::Unrecognized(text) => {
                self.observer.on_unrecognized_message(&text);
                None
            }
        }
    }
}

/// A live transport and the tasks driving it
struct Link {
    outgoing: mpsc::Sender<WriteRequest>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Link {
    async fn close(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

struct Inner {
    address: String,
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    core: Arc<Core>,
    link: tokio::sync::Mutex<Option<Link>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Last handle gone without dispose: stop the tasks
        if let Some(link) = self.link.get_mut().take() {
            link.shutdown.cancel();
        }
        self.core.commands.close_all(|| DebugwireError::SessionClosed);
    }
}

/// Builds a [`Session`] with non-default parts
pub struct SessionBuilder {
    address: String,
    methods: Arc<MethodTypeMap>,
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    observer: Arc<dyn SessionObserver>,
}

impl SessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> Session {
        let address = self.config.resolve_address(&self.address).to_string();
        let core = Arc::new(Core {
            state: Mutex::new(ConnectionState::Disconnected),
            methods: self.methods,
            observer: self.observer,
            commands: Arc::new(CommandDispatcher::new()),
            events: EventDispatcher::new(),
        });
        Session {
            inner: Arc::new(Inner {
                address,
                config: self.config,
                connector: self.connector,
                core,
                link: tokio::sync::Mutex::new(None),
            }),
        }
    }
}

/// Handle to a session. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// A session for `address` that has not connected yet
    pub fn new(address: impl Into<String>, methods: Arc<MethodTypeMap>) -> Self {
        Self::builder(address, methods).build()
    }

    pub fn builder(address: impl Into<String>, methods: Arc<MethodTypeMap>) -> SessionBuilder {
        SessionBuilder {
            address: address.into(),
            methods,
            config: SessionConfig::default(),
            connector: Arc::new(DefaultConnector),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.core.state()
    }

    pub fn method_type_map(&self) -> &MethodTypeMap {
        &self.inner.core.methods
    }

    /// Requests sent but not yet answered
    pub fn pending_requests(&self) -> usize {
        self.inner.core.commands.pending_count()
    }

    /// Send a command and wait for its typed response
    pub async fn send<C: Command>(&self, command: &C) -> Result<C::Response> {
        let params = serde_json::to_value(command)
            .map_err(|e| DebugwireError::protocol(format!("Failed to encode {}: {}", C::METHOD, e)))?;
        let result = self.send_raw(C::METHOD, Some(params)).await?;
        serde_json::from_value(result).map_err(|e| DebugwireError::Decode {
            method: C::METHOD.to_string(),
            message: e.to_string(),
        })
    }

    /// Like [`send`](Self::send), but gives up with
    /// [`DebugwireError::Cancelled`] when `token` fires. The pending slot is
    /// released either way.
    pub async fn send_with_cancel<C: Command>(
        &self,
        command: &C,
        token: &CancellationToken,
    ) -> Result<C::Response> {
        tokio::select! {
            result = self.send(command) => result,
            _ = token.cancelled() => Err(DebugwireError::Cancelled),
        }
    }

    /// Send an arbitrary method and wait for its raw `result` object
    pub async fn send_raw(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let outgoing = self.ensure_connected().await?;

        let pending = self.inner.core.commands.register()?;
        let frame = OutgoingCommand::raw(pending.id(), method, params);
        let text = frame
            .to_json()
            .map_err(|e| DebugwireError::protocol(format!("Failed to encode {}: {}", method, e)))?;
        trace!("Sending {} (id {})", method, pending.id());

        outgoing
            .send(WriteRequest {
                id: pending.id(),
                text,
            })
            .await
            .map_err(|_| DebugwireError::SessionClosed)?;

        pending.wait().await
    }

    /// Call `handler` for every `E` event
    pub fn subscribe<E, F>(&self, handler: F) -> SubscriptionId
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.inner.core.events.subscribe::<E, F>(handler)
    }

    /// Call `handler` with the params of every `method` event, known or not
    pub fn subscribe_raw<F>(&self, method: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.core.events.subscribe_raw(method, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.core.events.unsubscribe(id)
    }

    /// Close the connection and fail every pending request with
    /// [`DebugwireError::SessionClosed`]. Safe to call more than once.
    pub async fn dispose(&self) {
        use ConnectionState::*;
        let core = &self.inner.core;
        let first = core.transition(&[Disconnected, Connecting, Open], Closing);

        let link = self.inner.link.lock().await.take();
        let failed = core.commands.close_all(|| DebugwireError::SessionClosed);
        if let Some(link) = link {
            link.close().await;
        }
        core.transition(&[Closing], Closed);

        if first {
            info!(
                "Session with {} disposed ({} pending requests failed)",
                self.inner.address, failed
            );
        }
    }

    async fn ensure_connected(&self) -> Result<mpsc::Sender<WriteRequest>> {
        use ConnectionState::*;
        let core = &self.inner.core;
        let mut link = self.inner.link.lock().await;

        if let Some(link) = link.as_ref() {
            if core.state() == Open {
                return Ok(link.outgoing.clone());
            }
        }
        if !core.transition(&[Disconnected], Connecting) {
            return Err(DebugwireError::SessionClosed);
        }

        let config = &self.inner.config;
        debug!("Connecting to {}", self.inner.address);
        let connect = self.inner.connector.connect(&self.inner.address, config);
        let transport = match tokio::time::timeout(config.connect_timeout(), connect).await {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => {
                core.transition(&[Connecting], Disconnected);
                return Err(e);
            }
            Err(_) => {
                core.transition(&[Connecting], Disconnected);
                return Err(DebugwireError::ConnectionTimeout {
                    seconds: config.connect_timeout().as_secs(),
                });
            }
        };

        let new_link = self.start(transport.sink, transport.stream);
        if !core.transition(&[Connecting], Open) {
            // Disposed while connecting
            new_link.close().await;
            return Err(DebugwireError::SessionClosed);
        }
        info!("Connected to {}", self.inner.address);

        let outgoing = new_link.outgoing.clone();
        *link = Some(new_link);
        Ok(outgoing)
    }

    fn start(&self, sink: FrameSink, stream: FrameStream) -> Link {
        let config = &self.inner.config;
        let (write_tx, write_rx) = mpsc::channel(config.outgoing_queue_capacity.max(1));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let core = &self.inner.core;

        let tasks = vec![
            tokio::spawn(write_loop(sink, write_rx, Arc::clone(core), shutdown.clone())),
            tokio::spawn(read_loop(stream, event_tx, Arc::clone(core), shutdown.clone())),
            tokio::spawn(deliver_loop(event_rx, Arc::clone(core), shutdown.clone())),
        ];

        Link {
            outgoing: write_tx,
            shutdown,
            tasks,
        }
    }
}

async fn write_loop(
    mut sink: FrameSink,
    mut requests: mpsc::Receiver<WriteRequest>,
    core: Arc<Core>,
    shutdown: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            _ = shutdown.cancelled() => break,
            request = requests.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        if let Err(e) = sink.send(request.text).await {
            warn!("Failed to write request {}: {}", request.id, e);
            core.observer.on_transport_error(&e);
            core.commands
                .fail(request.id, DebugwireError::SendFailed(e.to_string()));
            core.terminate();
            shutdown.cancel();
            return;
        }
    }

    let _ = sink.close().await;
    debug!("Writer stopped");
}

async fn read_loop(
    mut stream: FrameStream,
    events: mpsc::UnboundedSender<EventFrame>,
    core: Arc<Core>,
    shutdown: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => return,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(text)) => {
                if let Some(event) = core.route(text) {
                    // Delivery task gone means we are shutting down
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                if shutdown.is_cancelled() {
                    return;
                }
                core.observer.on_transport_error(&e);
                core.terminate();
                shutdown.cancel();
                return;
            }
            None => {
                if !shutdown.is_cancelled() {
                    info!("Connection closed by remote");
                    core.observer.on_transport_error(&DebugwireError::ConnectionClosed);
                    core.terminate();
                    shutdown.cancel();
                }
                return;
            }
        }
    }
}

async fn deliver_loop(
    mut events: mpsc::UnboundedReceiver<EventFrame>,
    core: Arc<Core>,
    shutdown: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            frame = events.recv() => match frame {
                Some(frame) => frame,
                None => return,
            },
        };
        trace!("Delivering {}", frame.method);

        // Handlers are synchronous and may block
        let delivery = {
            let core = Arc::clone(&core);
            tokio::task::spawn_blocking(move || {
                core.events
                    .dispatch(&core.methods, core.observer.as_ref(), frame)
            })
        };
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            result = delivery => {
                if let Err(e) = result {
                    warn!("Event delivery task failed: {}", e);
                }
            }
        }
    }
}
