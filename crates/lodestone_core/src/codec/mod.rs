//! # Wire codec
//!
//! Framing of packets on a byte stream and the contract message types follow to
//! be decoded into commands and routed.
//!
//! - [`read_packet`] / [`write_packet`] frame packets as kind byte, varint
//!   length and payload.
//! - [`Message`] is implemented by each client message type; it names the kind
//!   byte and the topic the decoded message is published on.
//! - [`MessageRegistry`] is the lookup table from kind byte to decoder.
//! - [`FieldWriter`] / [`FieldReader`] encode the fields inside a payload.

mod fields;
mod message;
mod packet;
mod registry;
pub mod varint;

pub use fields::{FieldReader, FieldWriter};
pub use message::{Message, MessageConfig};
pub use packet::{read_packet, write_packet, Packet};
pub use registry::MessageRegistry;
