use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use adcsio_link::{ByteQueue, ByteSource};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::{AdcsError, Result};

/// Snapshot of how often the bus token changed hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusStats {
    pub acquisitions: u64,
    pub releases: u64,
    /// Received bytes lost to a full queue while the bus was held.
    pub overflowed: u64,
}

impl BusStats {
    /// True while some transaction or download session holds the bus.
    pub fn is_held(&self) -> bool {
        self.acquisitions != self.releases
    }
}

/// Mutual-exclusion token serializing every exchange on one UART.
#[derive(Debug, Default)]
pub(crate) struct BusToken {
    lock: Mutex<()>,
    acquisitions: AtomicU64,
    releases: AtomicU64,
    overflowed: AtomicU64,
}

impl BusToken {
    /// Take the token, waiting at most `timeout`.
    ///
    /// The queue is drained on acquisition and again when the guard drops, so
    /// a transaction only ever sees bytes that arrived while it held the bus.
    pub(crate) fn acquire<'a>(
        &'a self,
        queue: &'a ByteQueue,
        timeout: Duration,
        purpose: &'static str,
    ) -> Result<BusGuard<'a>> {
        let Some(lock) = self.lock.try_lock_for(timeout) else {
            debug!(purpose, ?timeout, "bus busy");
            return Err(AdcsError::BusBusy(timeout));
        };
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        let stale = queue.drain();
        if stale > 0 {
            warn!(purpose, stale, "discarded bytes queued before transaction");
        }
        debug!(purpose, "bus acquired");
        Ok(BusGuard {
            _lock: lock,
            token: self,
            queue,
            purpose,
            overflow_mark: queue.overflow_count(),
        })
    }

    pub(crate) fn stats(&self) -> BusStats {
        BusStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            overflowed: self.overflowed.load(Ordering::Relaxed),
        }
    }
}

/// Held bus token. Dropping it drains the receive queue, then releases the bus.
pub(crate) struct BusGuard<'a> {
    _lock: MutexGuard<'a, ()>,
    token: &'a BusToken,
    queue: &'a ByteQueue,
    purpose: &'static str,
    overflow_mark: u64,
}

impl BusGuard<'_> {
    pub(crate) fn purpose(&self) -> &'static str {
        self.purpose
    }

    /// Bytes the queue dropped since this guard was taken.
    pub(crate) fn overflowed(&self) -> u64 {
        self.queue.overflow_count().saturating_sub(self.overflow_mark)
    }
}

impl Drop for BusGuard<'_> {
    fn drop(&mut self) {
        let dropped = self.overflowed();
        if dropped > 0 {
            warn!(purpose = self.purpose, dropped, "receive queue overflowed during transaction");
            self.token.overflowed.fetch_add(dropped, Ordering::Relaxed);
        }
        let stale = self.queue.drain();
        if stale > 0 {
            warn!(purpose = self.purpose, stale, "drained trailing bytes");
        }
        self.token.releases.fetch_add(1, Ordering::Relaxed);
        debug!(purpose = self.purpose, "bus released");
    }
}
