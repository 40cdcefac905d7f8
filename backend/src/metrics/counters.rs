use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub counters_started: Arc<AtomicU64>,
    pub counters_resumed: Arc<AtomicU64>,
    pub ticks: Arc<AtomicU64>,

    // terminal transitions
    pub completed: Arc<AtomicU64>,
    pub canceled: Arc<AtomicU64>,
    pub failed: Arc<AtomicU64>,

    // ticker observed its task deleted
    pub vanished: Arc<AtomicU64>,
}

impl Counters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
