//! Swarm coordinator: spawns one thread per peer, lets them race to drain
//! the work queue, and hands the assembled buffer back once every session
//! has stopped.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::thread;

use crate::config::Cfg;
use crate::logger::LoggerSender;
use crate::metainfo::Metainfo;
use crate::payload_buffer::PayloadBuffer;
use crate::peer::{PeerAddress, PeerSession};
use crate::work_queue::WorkQueue;

#[derive(Debug)]
pub enum SwarmError {
    NoPeersRemaining,
}

/// Downloads every piece of `metainfo` from `peers`, returning the
/// completed payload once the work queue is fully drained.
///
/// Spawns at most `cfg.max_peers` sessions at a time; if every spawned
/// session ends without draining the queue, returns
/// `SwarmError::NoPeersRemaining` instead of hanging forever waiting on a
/// swarm that can no longer make progress.
pub fn download(
    metainfo: &Metainfo,
    peers: Vec<PeerAddress>,
    peer_id: [u8; 20],
    cfg: Cfg,
    logger: LoggerSender,
) -> Result<Vec<u8>, SwarmError> {
    let total_size = metainfo.total_size();
    let piece_length = metainfo.info.piece_length as u64;
    let work_queue = WorkQueue::seeded(metainfo.work_items());
    let buffer = Arc::new(PayloadBuffer::new(total_size));
    let downloaded = Arc::new(AtomicU64::new(0));

    let peers: Vec<PeerAddress> = peers.into_iter().take(cfg.max_peers).collect();
    if peers.is_empty() {
        return Err(SwarmError::NoPeersRemaining);
    }

    let mut handles = Vec::with_capacity(peers.len());
    for peer in peers {
        let work_queue = work_queue.clone();
        let buffer = buffer.clone();
        let downloaded = downloaded.clone();
        let cfg = cfg.clone();
        let logger = logger.clone();
        let info_hash = metainfo.info_hash;
        let peer_display = peer.to_string();

        logger.info(&format!("connecting peer={peer_display}"));

        let handle = thread::Builder::new()
            .name(format!("peer-{peer_display}"))
            .spawn(move || {
                let session = PeerSession::new(
                    peer,
                    info_hash,
                    peer_id,
                    work_queue,
                    buffer,
                    move |index| index as u64 * piece_length,
                    cfg,
                    logger.clone(),
                    downloaded,
                    total_size,
                );
                let result = session.run();
                match &result {
                    Ok(()) => println!("peer session ended peer={peer_display}"),
                    Err(e) => {
                        logger.warn(&format!("peer={peer_display} ended: {e:?}"));
                        println!("peer session ended peer={peer_display} error={e:?}");
                    }
                }
                result
            })
            .expect("spawning a peer session thread");
        handles.push(handle);
    }

    for handle in handles {
        let _ = handle.join().expect("peer session thread panicked");
    }

    // Every session has stopped (each dropped its own `WorkQueue` clone on
    // exit); a piece still sitting in the queue at this point means the
    // swarm ran out of peers before finishing — not a benign "we happened
    // to finish" condition.
    if work_queue.try_take().is_some() {
        return Err(SwarmError::NoPeersRemaining);
    }
    drop(work_queue);

    Ok(Arc::try_unwrap(buffer)
        .unwrap_or_else(|_| panic!("buffer still shared after every session joined"))
        .into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer_wire::{read_message, Handshake, Message, MessageId, WireMessage};
    use sha1::{Digest, Sha1};
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn logger() -> LoggerSender {
        crate::logger::Logger::stderr().sender()
    }

    fn spawn_simple_peer(info_hash: [u8; 20], data: Vec<u8>) -> PeerAddress {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; crate::peer_wire::handshake::HANDSHAKE_LEN];
            stream.read_exact(&mut buf).unwrap();
            stream
                .write_all(&Handshake::new(info_hash, [9u8; 20]).serialize())
                .unwrap();

            match read_message(&mut stream).unwrap().unwrap() {
                WireMessage::Message(m) => assert_eq!(m.id, MessageId::Interested),
                _ => panic!("expected interested"),
            }
            Message::new(MessageId::Unchoke, vec![])
                .write_to(&mut stream)
                .unwrap();

            match read_message(&mut stream).unwrap().unwrap() {
                WireMessage::Message(m) => assert_eq!(m.id, MessageId::Request),
                _ => panic!("expected request"),
            }
            let mut payload = Vec::new();
            payload.extend(0u32.to_be_bytes());
            payload.extend(0u32.to_be_bytes());
            payload.extend(&data);
            Message::new(MessageId::Piece, payload)
                .write_to(&mut stream)
                .unwrap();

            std::thread::sleep(std::time::Duration::from_millis(100));
        });

        PeerAddress::new(addr.ip().to_string(), addr.port())
    }

    #[test]
    fn empty_peer_list_is_no_peers_remaining() {
        let info = crate::metainfo::Info {
            name: "f".to_string(),
            piece_length: 16384,
            pieces: vec![0u8; 20],
            length: Some(16384),
            files: vec![],
        };
        let metainfo = crate::metainfo::Metainfo {
            announce: "http://t".to_string(),
            announce_list: vec![],
            info,
            info_hash: [0u8; 20],
            comment: None,
            created_by: None,
            creation_date: None,
            encoding: None,
        };
        let err = download(&metainfo, vec![], [1u8; 20], Cfg::default(), logger()).unwrap_err();
        assert!(matches!(err, SwarmError::NoPeersRemaining));
    }

    #[test]
    fn downloads_a_single_piece_torrent_from_one_simulated_peer() {
        let data = b"a single piece of data".to_vec();
        let hash: [u8; 20] = Sha1::digest(&data).into();
        let info_hash = [5u8; 20];

        let peer = spawn_simple_peer(info_hash, data.clone());

        let info = crate::metainfo::Info {
            name: "f".to_string(),
            piece_length: data.len() as u32,
            pieces: hash.to_vec(),
            length: Some(data.len() as u64),
            files: vec![],
        };
        let metainfo = crate::metainfo::Metainfo {
            announce: "http://t".to_string(),
            announce_list: vec![],
            info,
            info_hash,
            comment: None,
            created_by: None,
            creation_date: None,
            encoding: None,
        };

        let result = download(&metainfo, vec![peer], [9u8; 20], Cfg::default(), logger()).unwrap();
        assert_eq!(result, data);
    }
}
