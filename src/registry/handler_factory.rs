//! # Handler Factory
//!
//! Central place where receiver callbacks are validated and turned into
//! registry entries. The bus never constructs a [`MessageHandler`] directly.

use std::sync::Arc;

use tracing::debug;

use super::handler::{CallbackArg, Handler, MessageHandler};
use crate::error::{BusError, BusResult};

/// Factory for creating type-bound message handlers
#[derive(Debug, Default, Clone, Copy)]
pub struct HandlerFactory;

impl HandlerFactory {
    pub fn new() -> Self {
        Self
    }

    /// Create a handler bound to the callback's message type.
    ///
    /// Fails with [`BusError::InvalidArgument`] when the callback is absent.
    pub fn create<C: CallbackArg>(&self, callback: C) -> BusResult<Arc<dyn Handler>> {
        let callback = callback
            .into_callback()
            .ok_or_else(|| BusError::invalid_argument("callback"))?;

        let handler = MessageHandler::new(callback);
        debug!(
            message_type = std::any::type_name::<C::Message>(),
            "Created message handler"
        );

        Ok(Arc::new(handler))
    }
}
