//! # Message Bus
//!
//! Owns the receiver registry and the pending queue, and drains the queue
//! either on demand ([`MessageBus::process_messages`]) or continuously from a
//! background task between [`MessageBus::activate`] and
//! [`MessageBus::deactivate`].
//!
//! ## Dispatch
//!
//! Every receiver whose bound type equals the message's runtime type is run in
//! its own tokio task, so fan-out is parallel and a panicking callback cannot
//! take the bus down. A manual drain joins every invocation it started once
//! the queue is empty; the background loop joins each message's invocations
//! before it dequeues the next one.
//!
//! Each invocation task records its own failure (counter, log, failure
//! channel) and a message stays in flight until the last task dispatching it
//! ends. Dropping a drain future part way therefore loses nothing: its tasks
//! keep running and report as usual.
//!
//! No lock is held while callback code runs: the registry is read into a list
//! of `Arc`s and released before any task is spawned.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use super::activation::{run_dispatch_loop, ActivationToken};
use super::queue::PendingQueue;
use super::stats::{BusCounters, BusStats};
use crate::config::MessageBusConfig;
use crate::error::{BusError, BusResult, DispatchFailure};
use crate::logging::{log_callback_failure, log_lifecycle_operation};
use crate::message::{Message, MessageArg};
use crate::registry::{CallbackArg, Handler, HandlerFactory, ReceiverRegistry};

type PendingDispatch = (&'static str, JoinHandle<Option<DispatchFailure>>);

/// Keeps a dequeued message counted as in flight until dropped by the last
/// task dispatching it.
struct InFlight {
    bus: Arc<BusInner>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.bus.queue.complete(1);
    }
}

/// Shared state behind every [`MessageBus`] handle
#[derive(Debug)]
pub(crate) struct BusInner {
    pub(crate) id: Uuid,
    pub(crate) config: MessageBusConfig,
    pub(crate) queue: PendingQueue,
    registry: ReceiverRegistry,
    activation: Mutex<Option<Arc<ActivationToken>>>,
    disposed: AtomicBool,
    counters: BusCounters,
    failures: broadcast::Sender<DispatchFailure>,
}

impl BusInner {
    /// Spawn one task per matching receiver. `message` must already be
    /// counted as in flight by the queue.
    fn start_dispatch(
        self: &Arc<Self>,
        runtime: &Handle,
        message: Arc<dyn Message>,
        activation_id: Option<Uuid>,
    ) -> Vec<PendingDispatch> {
        let in_flight = Arc::new(InFlight {
            bus: Arc::clone(self),
        });
        BusCounters::increment(&self.counters.messages_dispatched);

        let message_type = message.as_ref().message_type_name();
        let handlers = self.registry.matching(message.as_ref());

        if handlers.is_empty() {
            BusCounters::increment(&self.counters.messages_unhandled);
            if self.config.log_dispatch {
                debug!(
                    bus_id = %self.id,
                    message_type = message_type,
                    "No receivers for message, discarding"
                );
            }
            return Vec::new();
        }

        if self.config.log_dispatch {
            debug!(
                bus_id = %self.id,
                message_type = message_type,
                handlers = handlers.len(),
                "Dispatching message"
            );
        }
        BusCounters::add(&self.counters.handler_invocations, handlers.len() as u64);

        handlers
            .into_iter()
            .map(|handler| {
                let bus = Arc::clone(self);
                let message = Arc::clone(&message);
                let in_flight = Arc::clone(&in_flight);
                let task = runtime.spawn(async move {
                    let failure = bus.invoke(handler, message, activation_id).await;
                    drop(in_flight);
                    failure
                });
                (message_type, task)
            })
            .collect()
    }

    /// Run one receiver, containing panics, and record its failure if any.
    async fn invoke(
        &self,
        handler: Arc<dyn Handler>,
        message: Arc<dyn Message>,
        activation_id: Option<Uuid>,
    ) -> Option<DispatchFailure> {
        let message_type = handler.message_type_name();
        let result = match AssertUnwindSafe(handler.handle(Some(message)))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_panic) => Err(BusError::CallbackPanicked { message_type }),
        };

        let error = result.err()?;
        let failure = DispatchFailure::from_error(message_type, &error);
        self.record_failure(&failure, activation_id);
        Some(failure)
    }

    /// Wait for every started invocation and collect the ones that failed.
    /// Failures have already been recorded by the tasks themselves.
    async fn join_dispatches(
        &self,
        pending: Vec<PendingDispatch>,
        activation_id: Option<Uuid>,
    ) -> Vec<DispatchFailure> {
        let outcomes = join_all(
            pending
                .into_iter()
                .map(|(message_type, task)| async move { (message_type, task.await) }),
        )
        .await;

        let mut failures = Vec::new();
        for (message_type, outcome) in outcomes {
            match outcome {
                Ok(Some(failure)) => failures.push(failure),
                Ok(None) => {}
                // Task aborted before it could report, e.g. runtime shutdown
                Err(join_error) => {
                    let error = BusError::CallbackFailed {
                        message_type,
                        reason: join_error.to_string(),
                    };
                    let failure = DispatchFailure::from_error(message_type, &error);
                    self.record_failure(&failure, activation_id);
                    failures.push(failure);
                }
            }
        }
        failures
    }

    fn record_failure(&self, failure: &DispatchFailure, activation_id: Option<Uuid>) {
        BusCounters::increment(&self.counters.handler_failures);
        log_callback_failure(self.id, failure.message_type, &failure.reason, activation_id);
        // No subscribers is fine; the failure has been logged
        let _ = self.failures.send(failure.clone());
    }

    /// Dispatch one message for the background loop; failures are logged and
    /// broadcast, never returned.
    pub(crate) async fn dispatch_in_background(
        self: &Arc<Self>,
        runtime: &Handle,
        message: Arc<dyn Message>,
        activation_id: Uuid,
    ) {
        let pending = self.start_dispatch(runtime, message, Some(activation_id));
        self.join_dispatches(pending, Some(activation_id)).await;
    }

    /// Cancel the running loop, if any, and return its activation id.
    fn stop_loop(&self) -> Option<Uuid> {
        let token = self.activation.lock().take()?;
        self.queue.cancel(&token);
        Some(token.id())
    }
}

impl Drop for BusInner {
    fn drop(&mut self) {
        if let Some(token) = self.activation.get_mut().take() {
            token.cancel();
        }
    }
}

/// In-process typed publish/subscribe bus.
///
/// Cloning is cheap and every clone refers to the same bus; construct one and
/// hand clones to the components that need it.
#[derive(Debug, Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// Inactive bus with an empty registry and queue and default configuration.
    pub fn new() -> Self {
        Self::build(MessageBusConfig::default())
    }

    /// Inactive bus using `config`, which is validated first.
    pub fn with_config(config: MessageBusConfig) -> BusResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MessageBusConfig) -> Self {
        let (failures, _) = broadcast::channel(config.failure_channel_capacity);
        let id = Uuid::new_v4();
        debug!(bus_id = %id, config = ?config, "Message bus created");

        Self {
            inner: Arc::new(BusInner {
                id,
                config,
                queue: PendingQueue::new(),
                registry: ReceiverRegistry::new(HandlerFactory::new()),
                activation: Mutex::new(None),
                disposed: AtomicBool::new(false),
                counters: BusCounters::default(),
                failures,
            }),
        }
    }

    /// Register `callback` for its message type.
    ///
    /// Fails with [`BusError::Registration`] if this exact callback is
    /// already registered.
    pub fn register_receiver<C: CallbackArg>(&self, callback: C) -> BusResult<()> {
        self.ensure_not_disposed()?;
        self.inner.registry.register(callback)
    }

    /// Remove the first registration made with `callback`.
    pub fn unregister_receiver<C: CallbackArg>(&self, callback: C) -> BusResult<()> {
        self.ensure_not_disposed()?;
        self.inner.registry.unregister(callback)
    }

    /// Enqueue a message. Never dispatches inline, whatever the active state.
    pub fn send_message<M: MessageArg>(&self, message: M) -> BusResult<()> {
        self.ensure_not_disposed()?;
        let message = message
            .into_message()
            .ok_or_else(|| BusError::invalid_argument("message"))?;

        self.inner.queue.push(Arc::new(message));
        BusCounters::increment(&self.inner.counters.messages_sent);
        Ok(())
    }

    /// Drain the queue and wait for every invocation started by this drain.
    ///
    /// Callback failures do not stop the drain; they are collected and
    /// returned together as [`BusError::DispatchFailed`]. If this future is
    /// dropped early the invocations it started still run to completion and
    /// their failures are still counted, logged and broadcast. Messages sent while
    /// the drain is running are picked up by it until the queue is observed
    /// empty. Must be polled inside a tokio runtime.
    pub async fn process_messages(&self) -> BusResult<()> {
        self.ensure_not_disposed()?;
        let runtime = Handle::try_current().map_err(|_| BusError::NoRuntime)?;
        BusCounters::increment(&self.inner.counters.drains);

        let mut pending = Vec::new();
        let mut drained = 0usize;
        while let Some(message) = self.inner.queue.pop() {
            drained += 1;
            pending.extend(self.inner.start_dispatch(&runtime, message, None));
        }

        let invocations = pending.len();
        let failures = self.inner.join_dispatches(pending, None).await;

        debug!(
            bus_id = %self.inner.id,
            messages = drained,
            invocations = invocations,
            failures = failures.len(),
            "Manual drain completed"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BusError::DispatchFailed { failures })
        }
    }

    /// Start the background dispatch loop and return immediately.
    ///
    /// Calling this while already active is a no-op. Must be called from
    /// within a tokio runtime.
    pub fn activate(&self) -> BusResult<()> {
        self.ensure_not_disposed()?;
        let runtime = Handle::try_current().map_err(|_| BusError::NoRuntime)?;

        let mut activation = self.inner.activation.lock();
        if let Some(token) = activation.as_ref() {
            debug!(
                bus_id = %self.inner.id,
                activation_id = %token.id(),
                "Message bus already active"
            );
            return Ok(());
        }
        // dispose() may have won the race for the lock
        self.ensure_not_disposed()?;

        let token = Arc::new(ActivationToken::new());
        runtime.spawn(run_dispatch_loop(
            Arc::downgrade(&self.inner),
            Arc::clone(&token),
            runtime.clone(),
        ));
        BusCounters::increment(&self.inner.counters.activations);
        log_lifecycle_operation(self.inner.id, "activate", Some(token.id()), None);
        *activation = Some(token);
        Ok(())
    }

    /// Ask the background loop to stop taking messages.
    ///
    /// Does not wait: dispatches already started run to completion. Once this
    /// returns the loop will not dequeue again, so later sends accumulate
    /// until the next drain or activation.
    pub fn deactivate(&self) -> BusResult<()> {
        self.ensure_not_disposed()?;
        match self.inner.stop_loop() {
            Some(activation_id) => {
                log_lifecycle_operation(self.inner.id, "deactivate", Some(activation_id), None);
            }
            None => {
                debug!(bus_id = %self.inner.id, "Message bus already inactive");
            }
        }
        Ok(())
    }

    /// Stop any running loop and make the bus unusable. Idempotent.
    ///
    /// Pending messages are left unprocessed.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let activation_id = self.inner.stop_loop();
        let details = format!("pending_messages={}", self.inner.queue.len());
        log_lifecycle_operation(self.inner.id, "dispose", activation_id, Some(details.as_str()));
    }

    /// Registered receivers in registration order.
    pub fn receivers(&self) -> Vec<Arc<dyn Handler>> {
        self.inner.registry.snapshot()
    }

    /// Snapshot of the messages waiting in the queue, oldest first.
    pub fn active_messages(&self) -> Vec<Arc<dyn Message>> {
        self.inner.queue.snapshot()
    }

    pub fn is_active(&self) -> bool {
        self.inner.activation.lock().is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &MessageBusConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> BusStats {
        self.inner.counters.snapshot()
    }

    /// Receive every failed handler invocation from this point on.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<DispatchFailure> {
        self.inner.failures.subscribe()
    }

    /// Wait until the queue is empty and no dispatch is in flight.
    ///
    /// Returns `false` if that does not happen within `timeout`. An inactive
    /// bus with pending messages never becomes idle on its own.
    pub async fn wait_for_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.inner.queue.idle())
            .await
            .is_ok()
    }

    fn ensure_not_disposed(&self) -> BusResult<()> {
        if self.is_disposed() {
            return Err(BusError::Disposed);
        }
        Ok(())
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
