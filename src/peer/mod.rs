//! Peer session: the core piece-exchange state machine.

pub mod address;
pub mod session;

pub use address::PeerAddress;
pub use session::{PeerSession, PeerSessionError};
