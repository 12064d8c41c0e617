//! Background dispatch loop and its cancellation token.
//!
//! Each activation gets a fresh [`ActivationToken`]. Deactivation cancels the
//! token; the loop finishes the message it is dispatching (if any) and exits
//! before touching the queue again. A later activation starts a new loop with a
//! new token, so a stale loop can never be revived.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use super::message_bus::BusInner;
use super::queue::Dequeue;

#[derive(Debug)]
pub(crate) struct ActivationToken {
    id: Uuid,
    cancelled: AtomicBool,
    wake: Notify,
}

impl ActivationToken {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancelled: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled.
    pub(crate) async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        // notify_one stores a permit, so a cancel racing this call is not lost
        self.wake.notified().await;
    }
}

/// Drain the queue until `token` is cancelled or the bus is dropped.
///
/// Only a weak reference is held between iterations so dropping the last
/// `MessageBus` handle tears the loop down.
pub(crate) async fn run_dispatch_loop(
    bus: Weak<BusInner>,
    token: Arc<ActivationToken>,
    runtime: Handle,
) {
    debug!(activation_id = %token.id(), "Dispatch loop started");

    loop {
        let Some(inner) = bus.upgrade() else {
            break;
        };

        match inner.queue.pop_while_active(&token) {
            Dequeue::Cancelled => break,
            Dequeue::Message(message) => {
                inner
                    .dispatch_in_background(&runtime, message, token.id())
                    .await;
            }
            Dequeue::Empty => {
                tokio::select! {
                    _ = inner.queue.message_arrived() => {}
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(inner.config.idle_poll_interval()) => {}
                }
            }
        }
    }

    debug!(activation_id = %token.id(), "Dispatch loop stopped");
}
