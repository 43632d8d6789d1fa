//! Peer-wire message frame: 4-byte big-endian length prefix, then an id
//! byte and payload (or nothing at all for a keep-alive).

use std::io::{self, Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
}

impl MessageId {
    fn from_byte(b: u8) -> Option<MessageId> {
        Some(match b {
            0 => MessageId::Choke,
            1 => MessageId::Unchoke,
            2 => MessageId::Interested,
            3 => MessageId::NotInterested,
            4 => MessageId::Have,
            5 => MessageId::Bitfield,
            6 => MessageId::Request,
            7 => MessageId::Piece,
            8 => MessageId::Cancel,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub payload: Vec<u8>,
}

/// A message as read off the wire: either a real message, or a keep-alive
/// (zero-length frame, no id byte).
#[derive(Debug)]
pub enum WireMessage {
    KeepAlive,
    Message(Message),
    /// A message with an id this client doesn't recognize; the frame is
    /// still fully consumed, the payload is simply dropped: unknown ids are
    /// ignored, not treated as a protocol error.
    Unknown(u8),
}

impl Message {
    pub fn new(id: MessageId, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    pub fn request(index: u32, begin: u32, length: u32) -> Self {
        let mut payload = Vec::with_capacity(12);
        payload.extend(index.to_be_bytes());
        payload.extend(begin.to_be_bytes());
        payload.extend(length.to_be_bytes());
        Message::new(MessageId::Request, payload)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let len = (self.payload.len() + 1) as u32;
        let mut bytes = Vec::with_capacity(4 + len as usize);
        bytes.extend(len.to_be_bytes());
        bytes.push(self.id as u8);
        bytes.extend(&self.payload);
        bytes
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.serialize())
    }

    pub fn keep_alive_bytes() -> [u8; 4] {
        [0u8; 4]
    }
}

/// Reads one frame from `reader`. Returns `Ok(None)` on clean EOF before any
/// bytes of a new frame were read (peer closed the connection between
/// messages); any other short read is `UnexpectedEof`.
pub fn read_message<R: Read>(reader: &mut R) -> io::Result<Option<WireMessage>> {
    let mut len_buf = [0u8; 4];
    if let Err(e) = reader.read_exact(&mut len_buf) {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            return Ok(None);
        }
        return Err(e);
    }
    let len = u32::from_be_bytes(len_buf);
    if len == 0 {
        return Ok(Some(WireMessage::KeepAlive));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;

    let id_byte = payload[0];
    let rest = payload.split_off(1);
    match MessageId::from_byte(id_byte) {
        Some(id) => Ok(Some(WireMessage::Message(Message::new(id, rest)))),
        None => Ok(Some(WireMessage::Unknown(id_byte))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn serialize_layout_matches_length_prefix_plus_id_plus_payload() {
        let msg = Message::new(MessageId::Have, vec![0, 0, 0, 5]);
        let bytes = msg.serialize();
        assert_eq!(&bytes[0..4], &5u32.to_be_bytes());
        assert_eq!(bytes[4], MessageId::Have as u8);
        assert_eq!(&bytes[5..], &[0, 0, 0, 5]);
    }

    #[test]
    fn keep_alive_is_four_zero_bytes() {
        assert_eq!(Message::keep_alive_bytes(), [0, 0, 0, 0]);
    }

    #[test]
    fn read_round_trips_a_message() {
        let msg = Message::new(MessageId::Bitfield, vec![0xFF, 0x00]);
        let bytes = msg.serialize();
        let mut cursor = Cursor::new(bytes);
        match read_message(&mut cursor).unwrap().unwrap() {
            WireMessage::Message(m) => {
                assert_eq!(m.id, MessageId::Bitfield);
                assert_eq!(m.payload, vec![0xFF, 0x00]);
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn read_keep_alive() {
        let mut cursor = Cursor::new(Message::keep_alive_bytes().to_vec());
        assert!(matches!(
            read_message(&mut cursor).unwrap().unwrap(),
            WireMessage::KeepAlive
        ));
    }

    #[test]
    fn read_clean_eof_before_frame_returns_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_message(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn read_short_frame_is_unexpected_eof() {
        let mut cursor = Cursor::new(vec![0, 0, 0, 5, 1, 2]); // says 5 bytes follow, only 2 given
        let err = read_message(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn read_unknown_id_is_reported_not_errored() {
        let mut bytes = Vec::new();
        bytes.extend(2u32.to_be_bytes());
        bytes.push(200);
        bytes.push(0);
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            read_message(&mut cursor).unwrap().unwrap(),
            WireMessage::Unknown(200)
        ));
    }

    #[test]
    fn request_message_payload_layout() {
        let msg = Message::request(1, 16384, 16384);
        assert_eq!(msg.id, MessageId::Request);
        assert_eq!(&msg.payload[0..4], &1u32.to_be_bytes());
        assert_eq!(&msg.payload[4..8], &16384u32.to_be_bytes());
        assert_eq!(&msg.payload[8..12], &16384u32.to_be_bytes());
    }
}
