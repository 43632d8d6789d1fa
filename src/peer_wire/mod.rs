//! Peer-wire codec: handshake framing and length-prefixed message framing
//! (BEP-3). The mechanical, well-known half of the protocol — see
//! `crate::peer` for the state machine built on top of it.

pub mod bitfield;
pub mod handshake;
pub mod message;

pub use bitfield::Bitfield;
pub use handshake::{Handshake, HandshakeError};
pub use message::{read_message, Message, MessageId, WireMessage};
