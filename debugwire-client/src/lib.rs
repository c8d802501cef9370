//! Async client runtime for the remote debugging protocol
//!
//! ```no_run
//! # async fn demo(methods: debugwire_protocol::MethodTypeMap) -> debugwire_utils::Result<()> {
//! use std::sync::Arc;
//! use debugwire_client::Session;
//!
//! let session = Session::new("ws://127.0.0.1:9222/devtools/page/1", Arc::new(methods));
//! session.subscribe_raw("Page.loadEventFired", |params| println!("loaded: {}", params));
//! session.send_raw("Page.enable", None).await?;
//! session.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod connection;
pub mod events;
pub mod observer;
pub mod session;

#[cfg(test)]
mod test_support;

pub use commands::{CommandDispatcher, PendingRequest, Routing};
pub use config::SessionConfig;
pub use connection::{
    connect_to_addr, Address, ConnectionState, Connector, DefaultConnector, FrameSink,
    FrameStream, Transport,
};
pub use events::{EventDispatcher, SubscriptionId};
pub use observer::{SessionObserver, TracingObserver};
pub use session::{Session, SessionBuilder};

pub use tokio_util::sync::CancellationToken;
