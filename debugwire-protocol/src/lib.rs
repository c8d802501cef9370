//! debugwire-protocol: Wire definitions shared by generated bindings and the runtime
//!
//! This crate defines the contract that generated bindings implement
//! ([`Command`], [`Response`], [`Event`]), the [`MethodTypeMap`] used to decode
//! inbound events by method name, the JSON frame shapes exchanged with the
//! remote process, and a length-prefixed codec for stream transports.

pub mod binding;
pub mod codec;
pub mod messages;
pub mod method_map;

// Re-export main types at crate root
pub use binding::{Command, Event, Response};
pub use codec::{CodecError, JsonFrameCodec, MAX_MESSAGE_SIZE};
pub use messages::{classify, EventFrame, InboundMessage, OutgoingCommand, RemoteError, ResponseFrame};
pub use method_map::{EventPayload, MethodEntry, MethodKind, MethodTypeMap, MethodTypeMapBuilder};
