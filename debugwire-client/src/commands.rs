//! Request/response correlation
//!
//! Each outgoing command gets a fresh id and a one-shot slot. The reader task
//! completes slots as responses arrive, in whatever order the remote sends
//! them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use debugwire_protocol::ResponseFrame;
use debugwire_utils::{DebugwireError, Result};

type Slot = oneshot::Sender<Result<Value>>;

#[derive(Default)]
struct PendingTable {
    slots: HashMap<i64, Slot>,
    closed: bool,
}

/// Outcome of routing a response frame
#[derive(Debug)]
pub enum Routing {
    Delivered(i64),
    /// No pending request matched; the frame is handed back
    Unrouted(ResponseFrame),
}

pub struct CommandDispatcher {
    next_id: AtomicI64,
    pending: Mutex<PendingTable>,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            pending: Mutex::new(PendingTable::default()),
        }
    }

    /// Allocate an id and a slot for its response
    pub fn register(self: &Arc<Self>) -> Result<PendingRequest> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        let mut table = self.pending.lock();
        if table.closed {
            return Err(DebugwireError::SessionClosed);
        }
        table.slots.insert(id, tx);

        Ok(PendingRequest {
            id,
            rx,
            dispatcher: Arc::clone(self),
        })
    }

    /// Route a response to its waiter.
    ///
    /// A response without an id goes to the only pending request if exactly
    /// one exists; otherwise it is unroutable.
    pub fn complete(&self, frame: ResponseFrame) -> Routing {
        let slot = {
            let mut table = self.pending.lock();
            match frame.id {
                Some(id) => table.slots.remove(&id).map(|slot| (id, slot)),
                None if table.slots.len() == 1 => {
                    let id = table.slots.keys().next().copied();
                    id.and_then(|id| table.slots.remove(&id).map(|slot| (id, slot)))
                }
                None => None,
            }
        };

        let Some((id, slot)) = slot else {
            return Routing::Unrouted(frame);
        };

        let result = frame.into_result().map_err(|e| DebugwireError::Remote {
            code: e.code,
            message: e.message,
            data: e.data,
        });
        // The waiter may have been cancelled in the meantime
        let _ = slot.send(result);
        Routing::Delivered(id)
    }

    /// Fail one request, e.g. when its frame could not be written
    pub fn fail(&self, id: i64, error: DebugwireError) -> bool {
        let slot = self.pending.lock().slots.remove(&id);
        match slot {
            Some(slot) => {
                let _ = slot.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Fail every pending request and refuse new ones. Returns how many
    /// were pending.
    pub fn close_all(&self, reason: impl Fn() -> DebugwireError) -> usize {
        let slots: Vec<Slot> = {
            let mut table = self.pending.lock();
            table.closed = true;
            table.slots.drain().map(|(_, slot)| slot).collect()
        };
        let count = slots.len();
        for slot in slots {
            let _ = slot.send(Err(reason()));
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().slots.len()
    }
}

/// A registered request awaiting its response. Dropping it (e.g. when the
/// caller's future is cancelled) releases the slot.
pub struct PendingRequest {
    id: i64,
    rx: oneshot::Receiver<Result<Value>>,
    dispatcher: Arc<CommandDispatcher>,
}

impl PendingRequest {
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Wait for the raw `result` object
    pub async fn wait(mut self) -> Result<Value> {
        match (&mut self.rx).await {
            Ok(result) => result,
            Err(_) => Err(DebugwireError::SessionClosed),
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.dispatcher.pending.lock().slots.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(id: Option<i64>, result: Value) -> ResponseFrame {
        ResponseFrame {
            id,
            method: None,
            result: Some(result),
            error: None,
        }
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_increasing() {
        let dispatcher = Arc::new(CommandDispatcher::new());
        let a = dispatcher.register().unwrap();
        let b = dispatcher.register().unwrap();
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(dispatcher.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_out_of_order_completion() {
        let dispatcher = Arc::new(CommandDispatcher::new());
        let first = dispatcher.register().unwrap();
        let second = dispatcher.register().unwrap();

        assert!(matches!(
            dispatcher.complete(response(Some(2), json!({"n": 2}))),
            Routing::Delivered(2)
        ));
        assert!(matches!(
            dispatcher.complete(response(Some(1), json!({"n": 1}))),
            Routing::Delivered(1)
        ));

        assert_eq!(second.wait().await.unwrap(), json!({"n": 2}));
        assert_eq!(first.wait().await.unwrap(), json!({"n": 1}));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_error() {
        let dispatcher = Arc::new(CommandDispatcher::new());
        let pending = dispatcher.register().unwrap();
        let frame = ResponseFrame {
            id: Some(pending.id()),
            method: None,
            result: None,
            error: Some(debugwire_protocol::RemoteError {
                code: -32601,
                message: "Method not found".into(),
                data: None,
            }),
        };
        dispatcher.complete(frame);

        let err = pending.wait().await.unwrap_err();
        assert!(matches!(
            err,
            DebugwireError::Remote { code: -32601, ref message, .. } if message == "Method not found"
        ));
    }

    #[tokio::test]
    async fn test_idless_response_with_single_pending() {
        let dispatcher = Arc::new(CommandDispatcher::new());
        let pending = dispatcher.register().unwrap();
        let id = pending.id();
        assert!(matches!(
            dispatcher.complete(response(None, json!({"ok": true}))),
            Routing::Delivered(delivered) if delivered == id
        ));
        assert_eq!(pending.wait().await.unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_idless_response_with_two_pending_is_unrouted() {
        let dispatcher = Arc::new(CommandDispatcher::new());
        let _a = dispatcher.register().unwrap();
        let _b = dispatcher.register().unwrap();
        assert!(matches!(
            dispatcher.complete(response(None, json!({}))),
            Routing::Unrouted(_)
        ));
        assert_eq!(dispatcher.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_id_is_unrouted() {
        let dispatcher = Arc::new(CommandDispatcher::new());
        assert!(matches!(
            dispatcher.complete(response(Some(42), json!({}))),
            Routing::Unrouted(frame) if frame.id == Some(42)
        ));
    }

    #[tokio::test]
    async fn test_dropped_request_releases_slot() {
        let dispatcher = Arc::new(CommandDispatcher::new());
        let pending = dispatcher.register().unwrap();
        let id = pending.id();
        drop(pending);
        assert_eq!(dispatcher.pending_count(), 0);

        // A late response for it is unrouted, not delivered
        assert!(matches!(
            dispatcher.complete(response(Some(id), json!({}))),
            Routing::Unrouted(_)
        ));
    }

    #[tokio::test]
    async fn test_fail_single_request() {
        let dispatcher = Arc::new(CommandDispatcher::new());
        let pending = dispatcher.register().unwrap();
        assert!(dispatcher.fail(pending.id(), DebugwireError::SendFailed("broken pipe".into())));
        assert!(!dispatcher.fail(999, DebugwireError::SendFailed("x".into())));
        assert!(matches!(
            pending.wait().await,
            Err(DebugwireError::SendFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_close_all() {
        let dispatcher = Arc::new(CommandDispatcher::new());
        let waiters: Vec<_> = (0..3).map(|_| dispatcher.register().unwrap()).collect();

        assert_eq!(dispatcher.close_all(|| DebugwireError::SessionClosed), 3);
        for waiter in waiters {
            assert!(matches!(waiter.wait().await, Err(DebugwireError::SessionClosed)));
        }

        assert!(matches!(
            dispatcher.register(),
            Err(DebugwireError::SessionClosed)
        ));
    }
}
