//! Event subscription and fan-out
//!
//! Handlers are keyed by wire method. Typed handlers receive the decoded
//! payload; raw handlers receive the params object and also see methods the
//! type map does not know. Handlers run one at a time in receive order, and
//! a panicking handler does not stop the others.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use debugwire_protocol::{Event, EventFrame, EventPayload, MethodTypeMap};
use debugwire_utils::DebugwireError;

use crate::observer::SessionObserver;

/// Handle returned by subscribe, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
enum Handler {
    Typed(Arc<dyn Fn(&EventPayload) + Send + Sync>),
    Raw(Arc<dyn Fn(&Value) + Send + Sync>),
}

#[derive(Default)]
pub struct EventDispatcher {
    next_id: AtomicU64,
    handlers: DashMap<String, Vec<(SubscriptionId, Handler)>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, method: &str, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .entry(method.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    /// Call `handler` with every decoded `E` event
    pub fn subscribe<E, F>(&self, handler: F) -> SubscriptionId
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let typed = move |payload: &EventPayload| {
            if let Some(event) = payload.downcast_ref::<E>() {
                handler(event);
            }
        };
        self.add(E::METHOD, Handler::Typed(Arc::new(typed)))
    }

    /// Call `handler` with the params of every `method` event
    pub fn subscribe_raw<F>(&self, method: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.add(method, Handler::Raw(Arc::new(handler)))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for mut entry in self.handlers.iter_mut() {
            let before = entry.len();
            entry.retain(|(sub, _)| *sub != id);
            removed |= entry.len() != before;
        }
        removed
    }

    pub fn subscriber_count(&self, method: &str) -> usize {
        self.handlers.get(method).map(|h| h.len()).unwrap_or(0)
    }

    /// Deliver one event to its subscribers. Returns how many handlers ran
    /// to completion.
    pub fn dispatch(
        &self,
        methods: &MethodTypeMap,
        observer: &dyn SessionObserver,
        frame: EventFrame,
    ) -> usize {
        let EventFrame { method, params } = frame;

        // Snapshot so handlers may subscribe or unsubscribe while running
        let handlers: Vec<Handler> = self
            .handlers
            .get(&method)
            .map(|h| h.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();

        let has_typed = handlers.iter().any(|h| matches!(h, Handler::Typed(_)));
        let payload = match methods.decode_event(&method, params.clone()) {
            None => {
                observer.on_unrecognized_message(&format!(
                    r#"{{"method":{:?},"params":{}}}"#,
                    method, params
                ));
                None
            }
            Some(Ok(payload)) => Some(payload),
            Some(Err(e)) => {
                let error = DebugwireError::Decode {
                    method: method.clone(),
                    message: e.to_string(),
                };
                observer.on_decode_failure(&method, &error);
                None
            }
        };

        if handlers.is_empty() {
            return 0;
        }
        if has_typed && payload.is_none() {
            tracing::debug!("Skipping typed handlers for {}: no payload", method);
        }

        let mut delivered = 0;
        for handler in handlers {
            let outcome = match &handler {
                Handler::Typed(f) => match &payload {
                    Some(payload) => catch_unwind(AssertUnwindSafe(|| f(payload))),
                    None => continue,
                },
                Handler::Raw(f) => catch_unwind(AssertUnwindSafe(|| f(&params))),
            };
            match outcome {
                Ok(()) => delivered += 1,
                Err(panic) => observer.on_handler_failure(&method, &panic_message(&*panic)),
            }
        }
        delivered
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{foo_map, FooBazPayload, RecordingObserver};
    use parking_lot::Mutex;
    use serde_json::json;

    fn baz(z: bool) -> EventFrame {
        EventFrame {
            method: "Foo.baz".into(),
            params: json!({ "z": z }),
        }
    }

    #[test]
    fn test_no_subscribers() {
        let events = EventDispatcher::new();
        let observer = RecordingObserver::default();
        assert_eq!(events.dispatch(&foo_map(), &observer, baz(true)), 0);
        assert!(observer.records().is_empty());
    }

    #[test]
    fn test_fan_out_in_subscription_order() {
        let events = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            events.subscribe::<FooBazPayload, _>(move |e| seen.lock().push((tag, e.z)));
        }
        let raw_seen = Arc::clone(&seen);
        events.subscribe_raw("Foo.baz", move |params| {
            raw_seen.lock().push(("raw", params["z"].as_bool().unwrap_or(false)))
        });

        let observer = RecordingObserver::default();
        assert_eq!(events.dispatch(&foo_map(), &observer, baz(true)), 3);
        assert_eq!(
            *seen.lock(),
            vec![("first", true), ("second", true), ("raw", true)]
        );
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let events = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(0));

        events.subscribe::<FooBazPayload, _>(|_| panic!("handler exploded"));
        let counter = Arc::clone(&seen);
        events.subscribe::<FooBazPayload, _>(move |_| *counter.lock() += 1);

        let observer = RecordingObserver::default();
        assert_eq!(events.dispatch(&foo_map(), &observer, baz(false)), 1);
        assert_eq!(*seen.lock(), 1);
        assert_eq!(
            observer.records(),
            vec!["handler_failure Foo.baz: handler exploded".to_string()]
        );
    }

    #[test]
    fn test_decode_failure_skips_typed_handlers() {
        let events = EventDispatcher::new();
        let typed = Arc::new(Mutex::new(0));
        let raw = Arc::new(Mutex::new(0));

        let t = Arc::clone(&typed);
        events.subscribe::<FooBazPayload, _>(move |_| *t.lock() += 1);
        let r = Arc::clone(&raw);
        events.subscribe_raw("Foo.baz", move |_| *r.lock() += 1);

        let observer = RecordingObserver::default();
        let frame = EventFrame {
            method: "Foo.baz".into(),
            params: json!({"z": "not a bool"}),
        };
        assert_eq!(events.dispatch(&foo_map(), &observer, frame), 1);
        assert_eq!(*typed.lock(), 0);
        assert_eq!(*raw.lock(), 1);
        assert_eq!(observer.records().len(), 1);
        assert!(observer.records()[0].starts_with("decode_failure Foo.baz"));
    }

    #[test]
    fn test_unknown_method_reaches_raw_subscribers() {
        let events = EventDispatcher::new();
        let raw = Arc::new(Mutex::new(Vec::new()));
        let r = Arc::clone(&raw);
        events.subscribe_raw("Other.thing", move |params| r.lock().push(params.clone()));

        let observer = RecordingObserver::default();
        let frame = EventFrame {
            method: "Other.thing".into(),
            params: json!({"a": 1}),
        };
        assert_eq!(events.dispatch(&foo_map(), &observer, frame), 1);
        assert_eq!(*raw.lock(), vec![json!({"a": 1})]);
        assert!(observer.records()[0].starts_with("unrecognized"));
    }

    #[test]
    fn test_unsubscribe() {
        let events = EventDispatcher::new();
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        let id = events.subscribe::<FooBazPayload, _>(move |_| *c.lock() += 1);
        assert_eq!(events.subscriber_count("Foo.baz"), 1);

        assert!(events.unsubscribe(id));
        assert!(!events.unsubscribe(id));
        assert_eq!(events.subscriber_count("Foo.baz"), 0);

        let observer = RecordingObserver::default();
        events.dispatch(&foo_map(), &observer, baz(true));
        assert_eq!(*count.lock(), 0);
    }
}
