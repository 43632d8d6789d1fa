//! Handshake frame: fixed 68 bytes, the first thing exchanged on a new
//! peer connection.

pub const HANDSHAKE_LEN: usize = 68;
const PSTR: &[u8] = b"BitTorrent protocol";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

#[derive(Debug)]
pub enum HandshakeError {
    WrongLength(usize),
    WrongPstrLen(u8),
    WrongPstr,
}

impl Handshake {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self { info_hash, peer_id }
    }

    pub fn serialize(&self) -> [u8; HANDSHAKE_LEN] {
        let mut bytes = [0u8; HANDSHAKE_LEN];
        bytes[0] = PSTR.len() as u8;
        bytes[1..20].copy_from_slice(PSTR);
        // bytes[20..28] reserved, already zero
        bytes[28..48].copy_from_slice(&self.info_hash);
        bytes[48..68].copy_from_slice(&self.peer_id);
        bytes
    }

    pub fn parse(buf: &[u8]) -> Result<Handshake, HandshakeError> {
        if buf.len() != HANDSHAKE_LEN {
            return Err(HandshakeError::WrongLength(buf.len()));
        }
        if buf[0] as usize != PSTR.len() {
            return Err(HandshakeError::WrongPstrLen(buf[0]));
        }
        if &buf[1..20] != PSTR {
            return Err(HandshakeError::WrongPstr);
        }
        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&buf[28..48]);
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&buf[48..68]);
        Ok(Handshake { info_hash, peer_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let h = Handshake::new([1u8; 20], [2u8; 20]);
        let bytes = h.serialize();
        assert_eq!(bytes.len(), HANDSHAKE_LEN);
        let parsed = Handshake::parse(&bytes).unwrap();
        assert_eq!(parsed, h);
    }

    #[test]
    fn serialize_layout() {
        let h = Handshake::new([0xAA; 20], [0xBB; 20]);
        let bytes = h.serialize();
        assert_eq!(bytes[0], 19);
        assert_eq!(&bytes[1..20], b"BitTorrent protocol");
        assert_eq!(&bytes[20..28], &[0u8; 8]);
        assert_eq!(&bytes[28..48], &[0xAA; 20]);
        assert_eq!(&bytes[48..68], &[0xBB; 20]);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(Handshake::parse(&[0u8; 10]), Err(HandshakeError::WrongLength(10))));
    }

    #[test]
    fn rejects_wrong_pstr() {
        let mut bytes = Handshake::new([0; 20], [0; 20]).serialize();
        bytes[1] = b'X';
        assert!(matches!(Handshake::parse(&bytes), Err(HandshakeError::WrongPstr)));
    }
}
