//! Bounded queues between the rover tasks.
//!
//! Telemetry queues never block their producer: when a queue is full the
//! item being pushed is discarded and counted.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

/// Outcome of [`DropSender::push`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pushed {
    Queued,
    /// Queue full, item discarded
    Dropped,
    /// Receiver gone, item discarded
    Closed,
}

/// Producer half of a drop-on-full queue
#[derive(Debug)]
pub struct DropSender<T> {
    name: &'static str,
    tx: mpsc::Sender<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> Clone for DropSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }
}

/// Create a queue holding at most `capacity` items
pub fn drop_on_full<T>(name: &'static str, capacity: usize) -> (DropSender<T>, mpsc::Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        DropSender {
            name,
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        rx,
    )
}

impl<T> DropSender<T> {
    pub fn push(&self, item: T) -> Pushed {
        match self.tx.try_send(item) {
            Ok(()) => Pushed::Queued,
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(queue = self.name, dropped = total, "queue full, dropping newest");
                Pushed::Dropped
            },
            Err(TrySendError::Closed(_)) => Pushed::Closed,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Items discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Items currently waiting
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Discard everything currently waiting in `rx`, returning how many items went
pub fn flush<T>(rx: &mut mpsc::Receiver<T>) -> usize {
    let mut flushed = 0;
    while rx.try_recv().is_ok() {
        flushed += 1;
    }
    flushed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_queue_drops_newest() {
        let (tx, mut rx) = drop_on_full("test", 2);
        assert_eq!(tx.push(1), Pushed::Queued);
        assert_eq!(tx.push(2), Pushed::Queued);
        assert_eq!(tx.push(3), Pushed::Dropped);
        assert_eq!(tx.len(), 2);
        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_queue() {
        let (tx, rx) = drop_on_full("test", 1);
        drop(rx);
        assert_eq!(tx.push(()), Pushed::Closed);
        assert_eq!(tx.dropped(), 0);
    }

    #[test]
    fn flush_empties() {
        let (tx, mut rx) = drop_on_full("test", 4);
        for i in 0..3 {
            tx.push(i);
        }
        assert_eq!(flush(&mut rx), 3);
        assert_eq!(flush(&mut rx), 0);
        assert!(tx.is_empty());
    }
}
