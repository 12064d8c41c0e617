//! Runtime statistics for a message bus.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters updated by the bus
#[derive(Debug, Default)]
pub(crate) struct BusCounters {
    /// Messages accepted by `send_message`
    pub messages_sent: AtomicU64,
    /// Messages taken off the queue and dispatched (including unhandled ones)
    pub messages_dispatched: AtomicU64,
    /// Dispatched messages with no matching receiver
    pub messages_unhandled: AtomicU64,
    /// Individual handler invocations started
    pub handler_invocations: AtomicU64,
    /// Handler invocations that returned an error or panicked
    pub handler_failures: AtomicU64,
    /// Manual `process_messages` calls
    pub drains: AtomicU64,
    /// Background loops started
    pub activations: AtomicU64,
}

impl BusCounters {
    pub(crate) fn increment(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BusStats {
        BusStats {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            messages_unhandled: self.messages_unhandled.load(Ordering::Relaxed),
            handler_invocations: self.handler_invocations.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            drains: self.drains.load(Ordering::Relaxed),
            activations: self.activations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the bus counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    pub messages_sent: u64,
    pub messages_dispatched: u64,
    pub messages_unhandled: u64,
    pub handler_invocations: u64,
    pub handler_failures: u64,
    pub drains: u64,
    pub activations: u64,
}
