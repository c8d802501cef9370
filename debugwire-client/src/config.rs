//! Session configuration
//!
//! Read from the `[session]` table of the shared config file:
//!
//! ```toml
//! [session]
//! connect_timeout_ms = 5000
//! outgoing_queue_capacity = 512
//!
//! [session.remotes]
//! chrome = "ws://127.0.0.1:9222/devtools/browser/abc"
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use debugwire_protocol::MAX_MESSAGE_SIZE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on establishing the transport
    pub connect_timeout_ms: u64,

    /// Largest inbound or outbound message accepted (bytes)
    pub max_message_size: usize,

    /// Commands buffered ahead of the writer
    pub outgoing_queue_capacity: usize,

    /// Named addresses, e.g. `chrome = "ws://..."`
    pub remotes: HashMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            max_message_size: MAX_MESSAGE_SIZE,
            outgoing_queue_capacity: 256,
            remotes: HashMap::new(),
        }
    }
}

impl SessionConfig {
    /// Load from the user's config file, falling back to defaults
    pub fn load() -> Self {
        debugwire_utils::config::load_or_default("session")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Map a remote alias to its address; anything else is returned as is
    pub fn resolve_address<'a>(&'a self, name: &'a str) -> &'a str {
        self.remotes.get(name).map(String::as_str).unwrap_or(name)
    }
}
