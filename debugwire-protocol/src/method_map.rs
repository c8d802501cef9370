//! Registry from wire method names to the types that decode them
//!
//! Built once per protocol version (usually by the generated
//! `method_type_map()` function) and immutable afterwards. Lookups are exact
//! and case-sensitive.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::binding::{Command, Event};

/// A decoded event, type-erased so it can travel through the dispatcher.
/// Subscribers downcast it back to the concrete [`Event`] type.
pub type EventPayload = Arc<dyn Any + Send + Sync>;

type DecodeFn = fn(Value) -> Result<EventPayload, serde_json::Error>;

/// Whether a method names a command or an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Command,
    Event,
}

/// What the map knows about one method
#[derive(Clone)]
pub struct MethodEntry {
    kind: MethodKind,
    type_name: &'static str,
    decode: Option<DecodeFn>,
}

impl MethodEntry {
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Rust type name of the response (commands) or payload (events)
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry")
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .finish()
    }
}

fn decode_event<E: Event>(params: Value) -> Result<EventPayload, serde_json::Error> {
    let event: E = serde_json::from_value(params)?;
    Ok(Arc::new(event))
}

/// Immutable method name → type registry
#[derive(Debug, Clone, Default)]
pub struct MethodTypeMap {
    entries: HashMap<String, MethodEntry>,
}

impl MethodTypeMap {
    pub fn builder() -> MethodTypeMapBuilder {
        MethodTypeMapBuilder::default()
    }

    pub fn lookup(&self, method: &str) -> Option<&MethodEntry> {
        self.entries.get(method)
    }

    /// Decode event params into the registered payload type.
    ///
    /// Returns `None` when the method is not a known event; that is not an
    /// error, just an unrecognized message.
    pub fn decode_event(
        &self,
        method: &str,
        params: Value,
    ) -> Option<Result<EventPayload, serde_json::Error>> {
        let decode = self.lookup(method)?.decode?;
        Some(decode(params))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered method names, sorted
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }
}

/// Collects registrations; call [`build`](Self::build) to freeze.
#[derive(Debug, Default)]
pub struct MethodTypeMapBuilder {
    entries: HashMap<String, MethodEntry>,
}

impl MethodTypeMapBuilder {
    /// Register a command; maps its method to its response type
    pub fn command<C: Command>(mut self) -> Self {
        self.entries.insert(
            C::METHOD.to_string(),
            MethodEntry {
                kind: MethodKind::Command,
                type_name: std::any::type_name::<C::Response>(),
                decode: None,
            },
        );
        self
    }

    /// Register an event; maps its method to its payload decoder
    pub fn event<E: Event>(mut self) -> Self {
        self.entries.insert(
            E::METHOD.to_string(),
            MethodEntry {
                kind: MethodKind::Event,
                type_name: std::any::type_name::<E>(),
                decode: Some(decode_event::<E>),
            },
        );
        self
    }

    pub fn build(self) -> MethodTypeMap {
        MethodTypeMap {
            entries: self.entries,
        }
    }
}
