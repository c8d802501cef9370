//! Traits implemented by generated bindings
//!
//! Every generated request type implements [`Command`], its paired response
//! type implements [`Response`], and every event payload implements
//! [`Event`]. Each carries its wire method name ("Domain.name") as an
//! associated constant so the runtime never inspects types to route frames.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A command request. Serializes to the `params` object of the wire frame.
pub trait Command: Serialize + Send + Sync + 'static {
    /// Wire method name, e.g. `"Page.navigate"`
    const METHOD: &'static str;

    /// Type the `result` object decodes into
    type Response: Response;
}

/// The decoded `result` of a command.
pub trait Response: DeserializeOwned + Send + 'static {
    /// Wire method name of the command this answers
    const METHOD: &'static str;
}

/// An event payload. Deserializes from the `params` object of an event frame.
pub trait Event: DeserializeOwned + Send + Sync + 'static {
    /// Wire method name, e.g. `"Page.loadEventFired"`
    const METHOD: &'static str;
}
