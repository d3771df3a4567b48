use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::traits::ByteSource;

/// Default receive queue depth in bytes.
pub const DEFAULT_QUEUE_CAPACITY: usize = 512;

/// Bounded FIFO of raw received bytes.
///
/// The receive interrupt is the only producer and never blocks: a byte pushed
/// into a full queue is dropped and counted. The transport is the only consumer.
#[derive(Debug)]
pub struct ByteQueue {
    bytes: Mutex<VecDeque<u8>>,
    ready: Condvar,
    capacity: usize,
    overflowed: AtomicU64,
}

impl ByteQueue {
    /// Create an empty queue holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Condvar::new(),
            capacity,
            overflowed: AtomicU64::new(0),
        }
    }

    /// Enqueue one byte. Returns `false` if the queue was full and the byte was dropped.
    pub fn push(&self, byte: u8) -> bool {
        let mut bytes = self.bytes.lock();
        if bytes.len() >= self.capacity {
            self.overflowed.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        bytes.push_back(byte);
        drop(bytes);
        self.ready.notify_one();
        true
    }

    /// Pop the oldest byte, waiting up to `timeout` for one to arrive.
    pub fn pop(&self, timeout: Duration) -> Option<u8> {
        let mut bytes = self.bytes.lock();
        if let Some(byte) = bytes.pop_front() {
            return Some(byte);
        }
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(&mut bytes, deadline),
            None => loop {
                self.ready.wait(&mut bytes);
                if let Some(byte) = bytes.pop_front() {
                    return Some(byte);
                }
            },
        }
    }

    fn wait_until(&self, bytes: &mut MutexGuard<'_, VecDeque<u8>>, deadline: Instant) -> Option<u8> {
        loop {
            let timed_out = self.ready.wait_until(bytes, deadline).timed_out();
            if let Some(byte) = bytes.pop_front() {
                return Some(byte);
            }
            if timed_out {
                return None;
            }
        }
    }

    /// Empty the queue. Returns how many bytes were discarded.
    pub fn reset(&self) -> usize {
        let mut bytes = self.bytes.lock();
        let dropped = bytes.len();
        bytes.clear();
        dropped
    }

    /// Bytes currently waiting.
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes dropped because the queue was full, since creation.
    pub fn overflow_count(&self) -> u64 {
        self.overflowed.load(Ordering::Relaxed)
    }
}

impl Default for ByteQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ByteSource for ByteQueue {
    fn pop(&self, timeout: Duration) -> Option<u8> {
        ByteQueue::pop(self, timeout)
    }

    fn drain(&self) -> usize {
        self.reset()
    }
}

/// Single-slot transmit-complete signal (a binary semaphore).
///
/// Giving an already-given signal is a no-op; each `take` consumes one give.
#[derive(Debug, Default)]
pub struct TxSignal {
    given: Mutex<bool>,
    cond: Condvar,
}

impl TxSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the transmit as complete and wake the waiter.
    pub fn give(&self) {
        *self.given.lock() = true;
        self.cond.notify_one();
    }

    /// Wait up to `timeout` for the signal and consume it.
    pub fn take(&self, timeout: Duration) -> bool {
        let mut given = self.given.lock();
        if !*given {
            let Some(deadline) = Instant::now().checked_add(timeout) else {
                while !*given {
                    self.cond.wait(&mut given);
                }
                *given = false;
                return true;
            };
            while !*given {
                if self.cond.wait_until(&mut given, deadline).timed_out() {
                    break;
                }
            }
        }
        std::mem::replace(&mut *given, false)
    }

    /// Discard a completion left over from an earlier transmit.
    pub fn clear(&self) -> bool {
        std::mem::replace(&mut *self.given.lock(), false)
    }
}

/// One UART's receive queue and transmit signal.
///
/// The link is shared between the transport (consumer) and the interrupt side,
/// which reaches it only through a [`LinkNotifier`].
#[derive(Debug, Clone)]
pub struct Link {
    queue: Arc<ByteQueue>,
    tx_done: Arc<TxSignal>,
}

impl Link {
    /// Create a link whose receive queue holds `queue_capacity` bytes.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue: Arc::new(ByteQueue::new(queue_capacity)),
            tx_done: Arc::new(TxSignal::new()),
        }
    }

    /// Handle for the interrupt handler (or a simulator standing in for it).
    pub fn notifier(&self) -> LinkNotifier {
        LinkNotifier {
            queue: Arc::clone(&self.queue),
            tx_done: Arc::clone(&self.tx_done),
        }
    }

    pub fn queue(&self) -> &ByteQueue {
        &self.queue
    }

    pub fn tx_signal(&self) -> &TxSignal {
        &self.tx_done
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Interrupt-side view of a [`Link`].
#[derive(Debug, Clone)]
pub struct LinkNotifier {
    queue: Arc<ByteQueue>,
    tx_done: Arc<TxSignal>,
}

impl LinkNotifier {
    /// RX interrupt: one byte arrived. Returns `false` if the queue overflowed.
    pub fn on_rx_byte(&self, byte: u8) -> bool {
        self.queue.push(byte)
    }

    /// TX interrupt: the last `send` finished shifting out.
    pub fn on_tx_complete(&self) {
        self.tx_done.give();
    }

    /// Free slots in the receive queue.
    pub fn rx_headroom(&self) -> usize {
        self.queue.capacity().saturating_sub(self.queue.len())
    }
}
