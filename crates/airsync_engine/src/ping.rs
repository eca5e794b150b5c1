//! Long-poll freshness tracking.
//!
//! Every Ping request takes a [`PingTicket`] for its device. Starting a
//! newer long poll for the same device advances the device marker, and
//! the older request notices on its next cycle that its ticket is
//! superseded and yields. Nothing is locked while waiting.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Shared freshness markers, one per device.
#[derive(Debug, Default)]
pub struct PingTracker {
    markers: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl PingTracker {
    /// Creates a tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new long poll for a device, superseding earlier ones.
    pub fn begin(&self, device: &str) -> PingTicket {
        let existing = self.markers.read().get(device).cloned();
        let marker = match existing {
            Some(marker) => marker,
            None => self
                .markers
                .write()
                .entry(device.to_string())
                .or_default()
                .clone(),
        };
        let generation = marker.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(device, generation, "long poll registered");
        PingTicket { marker, generation }
    }
}

/// The claim of one long poll on its device marker.
#[derive(Debug, Clone)]
pub struct PingTicket {
    marker: Arc<AtomicU64>,
    generation: u64,
}

impl PingTicket {
    /// Returns true once a newer long poll started for the same device.
    pub fn is_superseded(&self) -> bool {
        self.marker.load(Ordering::Acquire) != self.generation
    }

    /// Generation of this ticket.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Waits between long-poll cycles.
pub trait Sleeper: Send + Sync {
    /// Blocks for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_poll_supersedes_older() {
        let tracker = PingTracker::new();
        let first = tracker.begin("dev");
        assert!(!first.is_superseded());

        let second = tracker.begin("dev");
        assert!(first.is_superseded());
        assert!(!second.is_superseded());
        assert_eq!(second.generation(), first.generation() + 1);
    }

    #[test]
    fn devices_are_independent() {
        let tracker = PingTracker::new();
        let a = tracker.begin("a");
        let _b = tracker.begin("b");
        assert!(!a.is_superseded());
    }

    #[test]
    fn supersede_from_another_thread() {
        let tracker = Arc::new(PingTracker::new());
        let ticket = tracker.begin("dev");
        let other = Arc::clone(&tracker);
        std::thread::spawn(move || {
            other.begin("dev");
        })
        .join()
        .unwrap();
        assert!(ticket.is_superseded());
    }
}
