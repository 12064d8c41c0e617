//! Pending message queue.
//!
//! Unbounded FIFO shared by producers, manual drains and the background loop.
//! Every message is handed to exactly one consumer. A message counts as
//! in flight from the moment it is dequeued until its consumer calls
//! [`PendingQueue::complete`]; the call that leaves the queue empty with
//! nothing in flight wakes everyone waiting in [`PendingQueue::idle`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::activation::ActivationToken;
use crate::message::Message;

/// Outcome of a dequeue attempt made on behalf of an activation
#[derive(Debug)]
pub(crate) enum Dequeue {
    Message(Arc<dyn Message>),
    Empty,
    Cancelled,
}

#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<Arc<dyn Message>>,
    in_flight: usize,
}

#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    state: Mutex<QueueState>,
    arrivals: Notify,
    drained: Notify,
}

impl PendingQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, message: Arc<dyn Message>) {
        self.state.lock().messages.push_back(message);
        self.arrivals.notify_one();
    }

    /// Dequeue for a manual drain.
    pub(crate) fn pop(&self) -> Option<Arc<dyn Message>> {
        let mut state = self.state.lock();
        let message = state.messages.pop_front()?;
        state.in_flight += 1;
        Some(message)
    }

    /// Dequeue for the background loop; refuses once `token` is cancelled.
    pub(crate) fn pop_while_active(&self, token: &ActivationToken) -> Dequeue {
        let mut state = self.state.lock();
        if token.is_cancelled() {
            return Dequeue::Cancelled;
        }

        match state.messages.pop_front() {
            Some(message) => {
                state.in_flight += 1;
                Dequeue::Message(message)
            }
            None => Dequeue::Empty,
        }
    }

    /// Cancel `token` under the queue lock: once this returns, the owning
    /// loop cannot start another dequeue.
    pub(crate) fn cancel(&self, token: &ActivationToken) {
        let _state = self.state.lock();
        token.cancel();
    }

    /// Mark `count` dequeued messages as fully dispatched.
    pub(crate) fn complete(&self, count: usize) {
        let now_idle = {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(count);
            state.messages.is_empty() && state.in_flight == 0
        };
        if now_idle {
            self.drained.notify_waiters();
        }
    }

    /// Resolves once the queue is empty and nothing is in flight.
    pub(crate) async fn idle(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a completion in between is not missed
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub(crate) async fn message_arrived(&self) {
        self.arrivals.notified().await;
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Message>> {
        self.state.lock().messages.iter().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub(crate) fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.messages.is_empty() && state.in_flight == 0
    }
}
