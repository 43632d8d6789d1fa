//! Work-distribution queue: hands out `PieceWork` items to many peer
//! sessions concurrently.
//!
//! One `mpsc::Sender` feeds an `Arc<Mutex<mpsc::Receiver<_>>>` shared by
//! every consumer. `mpsc::Receiver` isn't `Sync`, so the mutex is what
//! makes "many workers pull from one channel" possible; `recv()` still
//! blocks the calling thread until an item is available or the sender
//! side is fully dropped.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// One outstanding piece. Immutable once created; owned by exactly one
/// session at a time, enforced entirely by the queue's single-claim
/// take/put protocol rather than any lock on the value itself.
#[derive(Debug, Clone)]
pub struct PieceWork {
    pub index: u32,
    pub hash: [u8; 20],
    pub length: u32,
}

/// Result of a blocking `take`: either a piece to work on, or a signal
/// that the queue has been drained and closed.
pub enum Take {
    Work(PieceWork),
    Closed,
}

/// The producer handle. Cloned freely; the queue stays open as long as at
/// least one `WorkQueue` (producer or consumer-facing) clone is alive —
/// see `close()`.
#[derive(Clone)]
pub struct WorkQueue {
    sender: Sender<PieceWork>,
    receiver: Arc<Mutex<Receiver<PieceWork>>>,
}

impl WorkQueue {
    /// Builds a queue already seeded with every piece. Capacity is
    /// unbounded in practice but never holds more than `items.len()`
    /// entries at once, so `put` never blocks.
    pub fn seeded(items: Vec<PieceWork>) -> WorkQueue {
        let (sender, receiver) = mpsc::channel();
        for item in items {
            // Never fails: the receiver we just created is still alive.
            sender.send(item).expect("receiver outlives this loop");
        }
        WorkQueue {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Non-blocking; returns a piece to the queue for another session to
    /// attempt (digest mismatch, I/O error, or session termination with
    /// work still claimed).
    pub fn put(&self, item: PieceWork) {
        // Only fails if every receiver has been dropped, which only
        // happens after the coordinator has already given up on the
        // queue entirely.
        let _ = self.sender.send(item);
    }

    /// Blocking receive. One consumer at a time: the mutex around the
    /// shared `Receiver` serializes concurrent `take` calls, and the
    /// scheduler's wakeup order decides which waiter gets the next item —
    /// round-robin fairness across sessions is not guaranteed, only FIFO
    /// queue contents.
    pub fn take(&self) -> Take {
        let receiver = self.receiver.lock().expect("work queue mutex poisoned");
        match receiver.recv() {
            Ok(item) => Take::Work(item),
            Err(_) => Take::Closed,
        }
    }

    /// Non-blocking receive; used by the coordinator after every session
    /// has stopped, to tell "queue fully drained" apart from "pieces are
    /// still unclaimed and no peer is left to claim them".
    pub fn try_take(&self) -> Option<PieceWork> {
        let receiver = self.receiver.lock().expect("work queue mutex poisoned");
        receiver.try_recv().ok()
    }

    /// Drops this handle's sender half. Once every producer-side clone is
    /// dropped, all blocked and future `take` calls observe `Closed`.
    pub fn close(self) {
        drop(self.sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn work(index: u32) -> PieceWork {
        PieceWork {
            index,
            hash: [0u8; 20],
            length: 16384,
        }
    }

    #[test]
    fn take_returns_seeded_items() {
        let queue = WorkQueue::seeded(vec![work(0), work(1)]);
        let mut seen = Vec::new();
        for _ in 0..2 {
            match queue.take() {
                Take::Work(w) => seen.push(w.index),
                Take::Closed => panic!("queue closed early"),
            }
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn put_reoffers_a_piece() {
        let queue = WorkQueue::seeded(vec![]);
        queue.put(work(5));
        match queue.take() {
            Take::Work(w) => assert_eq!(w.index, 5),
            Take::Closed => panic!("expected work"),
        }
    }

    #[test]
    fn closing_after_drain_signals_every_waiter() {
        let queue = WorkQueue::seeded(vec![work(0)]);
        assert!(matches!(queue.take(), Take::Work(_)));

        let other = queue.clone();
        let waiter = thread::spawn(move || matches!(other.take(), Take::Closed));

        queue.close();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn many_consumers_drain_every_item_exactly_once() {
        let queue = WorkQueue::seeded((0..20).map(work).collect());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || {
                    let mut claimed = Vec::new();
                    loop {
                        match queue.take() {
                            Take::Work(w) => claimed.push(w.index),
                            Take::Closed => break,
                        }
                        if claimed.len() == 5 {
                            break;
                        }
                    }
                    claimed
                })
            })
            .collect();

        let mut all: Vec<u32> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }
}
