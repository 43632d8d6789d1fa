//! A peer's reachable address, as returned by the tracker. Only the
//! fields an outbound-only client needs — no incoming-peer bookkeeping,
//! since this client never accepts connections.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub ip: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(ip: String, port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_ip_colon_port() {
        let peer = PeerAddress::new("127.0.0.1".to_string(), 6881);
        assert_eq!(peer.to_string(), "127.0.0.1:6881");
    }
}
