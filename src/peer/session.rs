//! Per-peer session: connect, handshake, then loop requesting blocks until
//! the work queue drains, the peer disconnects, or a protocol error occurs.
//!
//! State progression: handshake -> interested -> wait for unchoke ->
//! request pipeline -> verify piece. Pieces are claimed from a shared
//! `WorkQueue` and written into a shared `PayloadBuffer`, so any number of
//! sessions can run concurrently against the same download.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sha1::{Digest, Sha1};

use crate::config::Cfg;
use crate::logger::LoggerSender;
use crate::payload_buffer::PayloadBuffer;
use crate::peer_wire::{read_message, Bitfield, Handshake, Message, MessageId, WireMessage};
use crate::work_queue::{PieceWork, Take, WorkQueue};

use super::address::PeerAddress;

const BLOCK_SIZE: u32 = 16384;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum PeerSessionError {
    Connect(io::Error),
    Handshake(io::Error),
    WrongInfoHash,
    HandshakeFrame(crate::peer_wire::HandshakeError),
    Io(io::Error),
    PeerClosedConnection,
}

impl From<io::Error> for PeerSessionError {
    fn from(e: io::Error) -> Self {
        PeerSessionError::Io(e)
    }
}

/// Tracks choke/interest state for the connection, outbound-leecher side
/// only (no upload-side status).
#[derive(Debug, Default)]
struct Status {
    choked: bool,
    interested: bool,
}

impl Status {
    fn new() -> Self {
        Self {
            choked: true,
            interested: false,
        }
    }
}

pub struct PeerSession {
    address: PeerAddress,
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    work_queue: WorkQueue,
    buffer: Arc<PayloadBuffer>,
    piece_offset: Box<dyn Fn(u32) -> u64 + Send>,
    cfg: Cfg,
    logger: LoggerSender,
    bitfield: Bitfield,
    status: Status,
    downloaded: Arc<AtomicU64>,
    total_size: u64,
}

impl PeerSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: PeerAddress,
        info_hash: [u8; 20],
        peer_id: [u8; 20],
        work_queue: WorkQueue,
        buffer: Arc<PayloadBuffer>,
        piece_offset: impl Fn(u32) -> u64 + Send + 'static,
        cfg: Cfg,
        logger: LoggerSender,
        downloaded: Arc<AtomicU64>,
        total_size: u64,
    ) -> Self {
        Self {
            address,
            info_hash,
            peer_id,
            work_queue,
            buffer,
            piece_offset: Box::new(piece_offset),
            cfg,
            logger,
            bitfield: Bitfield::default(),
            status: Status::new(),
            downloaded,
            total_size,
        }
    }

    /// Runs the session to completion: connects, handshakes, then loops
    /// claiming and downloading pieces until the queue is drained or a
    /// fatal error ends the connection.
    pub fn run(mut self) -> Result<(), PeerSessionError> {
        let mut stream = self.connect()?;
        self.handshake(&mut stream)?;
        self.logger
            .info(&format!("handshake ok peer={}", self.address));
        println!("peer connected peer={}", self.address);

        self.send(&mut stream, Message::new(MessageId::Interested, vec![]))?;
        self.status.interested = true;

        loop {
            // The work queue's producer side is held open by every live
            // session (and by the coordinator until it joins them all), so
            // `Take::Closed` never fires while the swarm is still running —
            // detect a finished download directly from the shared byte
            // counter instead of waiting on a channel close that can't
            // happen yet.
            if self.total_size > 0 && self.downloaded.load(Ordering::SeqCst) >= self.total_size {
                return Ok(());
            }

            // Claim the next piece right away if one is sitting in the
            // queue, rather than waiting for an unrelated incoming message
            // to prompt the check: a peer that unchokes once and then goes
            // quiet must not stall this session while work remains.
            if !self.status.choked {
                if let Some(work) = self.work_queue.try_take() {
                    if let Err(e) = self.download_piece(&mut stream, &work) {
                        self.work_queue.put(work);
                        return Err(e);
                    }
                    continue;
                }
            }

            match read_message(&mut stream)? {
                None => return Err(PeerSessionError::PeerClosedConnection),
                Some(WireMessage::KeepAlive) => continue,
                Some(WireMessage::Unknown(_)) => continue,
                Some(WireMessage::Message(msg)) => match msg.id {
                    MessageId::Choke => self.status.choked = true,
                    MessageId::Unchoke => self.status.choked = false,
                    MessageId::Bitfield => self.bitfield = Bitfield::new(msg.payload),
                    _ => {}
                },
            }

            if !self.status.choked {
                match self.work_queue.take() {
                    Take::Closed => return Ok(()),
                    Take::Work(work) => {
                        if let Err(e) = self.download_piece(&mut stream, &work) {
                            self.work_queue.put(work);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    fn connect(&self) -> Result<TcpStream, PeerSessionError> {
        let socket_addr = format!("{}:{}", self.address.ip, self.address.port)
            .parse()
            .map_err(|_| {
                PeerSessionError::Connect(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "bad peer address",
                ))
            })?;
        let stream = TcpStream::connect_timeout(&socket_addr, CONNECT_TIMEOUT)
            .map_err(PeerSessionError::Connect)?;
        stream
            .set_read_timeout(Some(Duration::from_secs(self.cfg.read_write_timeout_secs)))
            .map_err(PeerSessionError::Connect)?;
        stream
            .set_write_timeout(Some(Duration::from_secs(self.cfg.read_write_timeout_secs)))
            .map_err(PeerSessionError::Connect)?;
        Ok(stream)
    }

    fn handshake(&mut self, stream: &mut TcpStream) -> Result<(), PeerSessionError> {
        let handshake = Handshake::new(self.info_hash, self.peer_id);
        stream
            .write_all(&handshake.serialize())
            .map_err(PeerSessionError::Handshake)?;

        let mut buf = [0u8; crate::peer_wire::handshake::HANDSHAKE_LEN];
        stream
            .read_exact(&mut buf)
            .map_err(PeerSessionError::Handshake)?;
        let reply = Handshake::parse(&buf).map_err(PeerSessionError::HandshakeFrame)?;
        if reply.info_hash != self.info_hash {
            return Err(PeerSessionError::WrongInfoHash);
        }
        Ok(())
    }

    fn send(&self, stream: &mut TcpStream, msg: Message) -> Result<(), PeerSessionError> {
        msg.write_to(stream).map_err(PeerSessionError::Io)
    }

    /// Requests every block of `work` in order, pipelined `cfg.pipelining_size`
    /// requests deep, then verifies the assembled piece's digest.
    fn download_piece(
        &mut self,
        stream: &mut TcpStream,
        work: &PieceWork,
    ) -> Result<(), PeerSessionError> {
        let mut piece = Vec::with_capacity(work.length as usize);
        let mut requested = 0u32;
        let mut received = 0u32;

        let started = Instant::now();

        while received < work.length {
            // Suppressed, not stopped, while choked: outstanding requests
            // already sent are left in flight, but no new ones go out
            // until an Unchoke arrives on this same connection.
            if !self.status.choked {
                while requested < work.length
                    && requested - received < self.cfg.pipelining_size * BLOCK_SIZE
                {
                    let begin = requested;
                    let length = BLOCK_SIZE.min(work.length - begin);
                    self.send(stream, Message::request(work.index, begin, length))?;
                    requested += length;
                }
            }

            match read_message(stream)? {
                None => return Err(PeerSessionError::PeerClosedConnection),
                Some(WireMessage::KeepAlive) | Some(WireMessage::Unknown(_)) => continue,
                Some(WireMessage::Message(msg)) => match msg.id {
                    MessageId::Choke => self.status.choked = true,
                    MessageId::Unchoke => self.status.choked = false,
                    MessageId::Bitfield => self.bitfield = Bitfield::new(msg.payload),
                    MessageId::Piece => {
                        // A peer can send a payload shorter than the 8-byte
                        // index+begin header; drop it instead of panicking
                        // on the slice below.
                        if msg.payload.len() < 8 {
                            continue;
                        }
                        let block = &msg.payload[8..];
                        piece.extend_from_slice(block);
                        received += block.len() as u32;
                    }
                    _ => {}
                },
            }
        }

        if Sha1::digest(&piece).as_slice() != work.hash {
            self.logger
                .warn(&format!("digest mismatch piece={} peer={}", work.index, self.address));
            return Err(PeerSessionError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "piece hash mismatch",
            )));
        }

        let offset = (self.piece_offset)(work.index);
        self.buffer.write_at(offset, &piece);

        let elapsed = started.elapsed().as_secs_f64().max(0.001);
        self.logger.info(&format!(
            "piece downloaded index={} bytes={} kbps={:.1} peer={}",
            work.index,
            piece.len(),
            (piece.len() as f64 * 8.0 / 1024.0) / elapsed,
            self.address
        ));

        let downloaded_total = self.downloaded.fetch_add(piece.len() as u64, Ordering::SeqCst)
            + piece.len() as u64;
        println!(
            "piece complete index={} downloaded={}/{}",
            work.index, downloaded_total, self.total_size
        );

        // download_piece only returns Err via the `?`s above, so reaching
        // here means the piece verified; the work item is done and should
        // NOT be returned to the caller for requeueing.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;

    fn logger() -> LoggerSender {
        crate::logger::Logger::stderr().sender()
    }

    #[test]
    fn handshake_rejects_mismatched_info_hash() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; crate::peer_wire::handshake::HANDSHAKE_LEN];
            stream.read_exact(&mut buf).unwrap();
            let reply = Handshake::new([9u8; 20], [1u8; 20]);
            stream.write_all(&reply.serialize()).unwrap();
        });

        let session = PeerSession::new(
            PeerAddress::new(addr.ip().to_string(), addr.port()),
            [1u8; 20],
            [2u8; 20],
            WorkQueue::seeded(vec![]),
            Arc::new(PayloadBuffer::new(0)),
            |_| 0,
            Cfg::default(),
            logger(),
            Arc::new(AtomicU64::new(0)),
            0,
        );

        let err = session.run().unwrap_err();
        assert!(matches!(err, PeerSessionError::WrongInfoHash));
        server.join().unwrap();
    }

    #[test]
    fn downloads_and_verifies_a_single_block_piece() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let info_hash = [7u8; 20];
        let data = b"hello bittorrent".to_vec();
        let hash: [u8; 20] = Sha1::digest(&data).into();

        let server_data = data.clone();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let mut buf = [0u8; crate::peer_wire::handshake::HANDSHAKE_LEN];
            stream.read_exact(&mut buf).unwrap();
            let reply = Handshake::new([7u8; 20], [9u8; 20]);
            stream.write_all(&reply.serialize()).unwrap();

            // interested
            match read_message(&mut stream).unwrap().unwrap() {
                WireMessage::Message(m) => assert_eq!(m.id, MessageId::Interested),
                _ => panic!("expected interested"),
            }

            Message::new(MessageId::Unchoke, vec![])
                .write_to(&mut stream)
                .unwrap();

            // request
            match read_message(&mut stream).unwrap().unwrap() {
                WireMessage::Message(m) => assert_eq!(m.id, MessageId::Request),
                _ => panic!("expected request"),
            }

            let mut payload = Vec::new();
            payload.extend(0u32.to_be_bytes());
            payload.extend(0u32.to_be_bytes());
            payload.extend(&server_data);
            Message::new(MessageId::Piece, payload)
                .write_to(&mut stream)
                .unwrap();

            // keep the socket open briefly so the client's next read times
            // out on an idle, already-drained work queue rather than racing
            // a premature close.
            thread::sleep(Duration::from_millis(50));
        });

        let work = PieceWork {
            index: 0,
            hash,
            length: data.len() as u32,
        };
        let buffer = Arc::new(PayloadBuffer::new(data.len() as u64));
        let session = PeerSession::new(
            PeerAddress::new(addr.ip().to_string(), addr.port()),
            info_hash,
            [9u8; 20],
            WorkQueue::seeded(vec![work]),
            buffer.clone(),
            |_| 0,
            Cfg {
                read_write_timeout_secs: 1,
                ..Cfg::default()
            },
            logger(),
            Arc::new(AtomicU64::new(0)),
            data.len() as u64,
        );

        // The session loops forever once the queue is drained (waiting on
        // further peer messages), so run it with a bounded read timeout and
        // accept either a clean drain or a timeout error after the piece
        // was already written.
        let _ = session.run();
        server.join().unwrap();

        assert_eq!(buffer.read_at(0, data.len() as u64), data);
    }
}
