//! # Receiver Registry
//!
//! Ordered list of registered handlers. Insertion order is kept so lookup and
//! removal are deterministic (first match wins); dispatch does not depend on it.
//!
//! Mutations hold the write lock for the whole check-then-modify sequence, so a
//! duplicate check can never race with another registration. Lookups used by
//! dispatch clone the matching `Arc`s and release the lock before any callback
//! runs.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::handler::{Callback, CallbackArg, Handler, MessageHandler};
use super::handler_factory::HandlerFactory;
use crate::error::{BusError, BusResult};
use crate::message::Message;

/// Lock-protected, insertion-ordered handler registry
#[derive(Debug, Default)]
pub struct ReceiverRegistry {
    factory: HandlerFactory,
    handlers: RwLock<Vec<Arc<dyn Handler>>>,
}

impl ReceiverRegistry {
    pub fn new(factory: HandlerFactory) -> Self {
        Self {
            factory,
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register a callback, rejecting a second registration of the same
    /// (type, callback identity) pair.
    pub fn register<C: CallbackArg>(&self, callback: C) -> BusResult<()> {
        let callback = callback
            .into_callback()
            .ok_or_else(|| BusError::invalid_argument("callback"))?;

        let mut handlers = self.handlers.write();
        if Self::position_of(&handlers, &callback).is_some() {
            return Err(BusError::Registration(format!(
                "Handler with callback for '{}' is already registered",
                std::any::type_name::<C::Message>()
            )));
        }

        handlers.push(self.factory.create(callback)?);
        info!(
            message_type = std::any::type_name::<C::Message>(),
            receivers = handlers.len(),
            "Registered receiver"
        );
        Ok(())
    }

    /// Remove the first handler registered with this callback.
    pub fn unregister<C: CallbackArg>(&self, callback: C) -> BusResult<()> {
        let callback = callback
            .into_callback()
            .ok_or_else(|| BusError::invalid_argument("callback"))?;

        let mut handlers = self.handlers.write();
        let index = Self::position_of(&handlers, &callback).ok_or_else(|| {
            BusError::Registration(format!(
                "There is no handler with callback for '{}' registered",
                std::any::type_name::<C::Message>()
            ))
        })?;

        handlers.remove(index);
        info!(
            message_type = std::any::type_name::<C::Message>(),
            receivers = handlers.len(),
            "Unregistered receiver"
        );
        Ok(())
    }

    /// Handlers whose bound type is exactly the message's runtime type.
    pub fn matching(&self, message: &dyn Message) -> Vec<Arc<dyn Handler>> {
        self.handlers
            .read()
            .iter()
            .filter(|handler| handler.can_handle(Some(message)))
            .cloned()
            .collect()
    }

    /// Ordered snapshot of the registry contents.
    pub fn snapshot(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers.read().clone()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    pub fn clear(&self) {
        self.handlers.write().clear();
    }

    fn position_of<T: Message>(handlers: &[Arc<dyn Handler>], callback: &Callback<T>) -> Option<usize> {
        handlers.iter().position(|handler| {
            handler
                .as_any()
                .downcast_ref::<MessageHandler<T>>()
                .is_some_and(|typed| typed.has_callback(callback))
        })
    }
}
