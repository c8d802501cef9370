//! Session diagnostics hooks
//!
//! Everything the session cannot hand back to a caller (responses nobody is
//! waiting for, messages that are neither responses nor events, handler
//! panics, transport failures) is reported here instead of being dropped
//! silently.

use tracing::{debug, error, trace, warn};

use debugwire_protocol::ResponseFrame;
use debugwire_utils::DebugwireError;

use crate::connection::ConnectionState;

/// Receives session diagnostics. All methods default to no-ops.
///
/// Called from the session's background tasks; implementations must not
/// block.
pub trait SessionObserver: Send + Sync {
    fn on_state_change(&self, _from: ConnectionState, _to: ConnectionState) {}

    /// A response with no matching pending request
    fn on_unrouted_response(&self, _frame: &ResponseFrame) {}

    /// A message that is neither a response nor a known event
    fn on_unrecognized_message(&self, _text: &str) {}

    /// An event's params did not match its registered payload type
    fn on_decode_failure(&self, _method: &str, _error: &DebugwireError) {}

    /// An event handler panicked
    fn on_handler_failure(&self, _method: &str, _message: &str) {}

    /// The transport failed; the session is closed after this
    fn on_transport_error(&self, _error: &DebugwireError) {}
}

/// Default observer: logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_state_change(&self, from: ConnectionState, to: ConnectionState) {
        debug!("Session state {:?} -> {:?}", from, to);
    }

    fn on_unrouted_response(&self, frame: &ResponseFrame) {
        warn!("Dropping response with no pending request (id {:?})", frame.id);
    }

    fn on_unrecognized_message(&self, text: &str) {
        trace!("Unrecognized message: {}", text);
    }

    fn on_decode_failure(&self, method: &str, error: &DebugwireError) {
        warn!("Failed to decode {} event: {}", method, error);
    }

    fn on_handler_failure(&self, method: &str, message: &str) {
        error!("Handler for {} panicked: {}", method, message);
    }

    fn on_transport_error(&self, error: &DebugwireError) {
        error!("Transport failed: {}", error);
    }
}
