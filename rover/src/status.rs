use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

/// Whether correction data is currently flowing to the receiver.
///
/// The only state of the relay other tasks may look at. The lock is held for
/// a single read or write and never across an await point.
#[derive(Debug, Clone, Default)]
pub struct StatusFlag(Arc<Mutex<bool>>);

impl StatusFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> bool {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, value: bool) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

/// External enable input of the correction relay. While set, the relay stays
/// idle or leaves the session it is streaming.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep in steps of `poll` until the signal is cleared
    pub async fn wait_resumed(&self, poll: Duration) {
        while self.is_stopped() {
            tokio::time::sleep(poll).await;
        }
    }
}
