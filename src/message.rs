//! # Message capability
//!
//! Any concrete type that implements [`Message`] can travel through the bus.
//! The bus treats payloads as opaque and only inspects their exact runtime
//! type, which is read through the blanket [`AsAnyMessage`] helper.
//!
//! ```rust
//! use message_system::Message;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct OrderPlaced {
//!     order_id: u64,
//! }
//!
//! impl Message for OrderPlaced {}
//!
//! let message: &dyn Message = &OrderPlaced { order_id: 7 };
//! assert!(message.is::<OrderPlaced>());
//! assert_eq!(message.downcast_ref::<OrderPlaced>().unwrap().order_id, 7);
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Marker capability for values that can be sent through the bus.
pub trait Message: AsAnyMessage + Send + Sync + fmt::Debug + 'static {}

/// Type-erasure helpers, implemented for every sized `'static` type.
///
/// Call these through `&dyn Message`, never through `Arc<dyn Message>` directly,
/// so the concrete payload type is the one reported.
pub trait AsAnyMessage {
    fn as_any_message(&self) -> &dyn Any;

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn message_type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAnyMessage for T {
    fn as_any_message(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn message_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl dyn Message {
    /// Exact runtime type of the payload.
    pub fn message_type(&self) -> TypeId {
        self.as_any_message().type_id()
    }

    pub fn is<T: Message>(&self) -> bool {
        self.message_type() == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any_message().downcast_ref::<T>()
    }
}

/// Recovers the concrete `Arc<T>` from an erased message, or hands the erased
/// message back when the exact type differs.
pub(crate) fn downcast_arc<T: Message>(
    message: Arc<dyn Message>,
) -> Result<Arc<T>, Arc<dyn Message>> {
    if message.as_ref().is::<T>() {
        Arc::clone(&message)
            .into_any_arc()
            .downcast::<T>()
            .map_err(|_| message)
    } else {
        Err(message)
    }
}

/// Argument accepted where a message is required: either a message or an
/// `Option` of one, `None` standing for an absent message.
pub trait MessageArg {
    type Message: Message;

    fn into_message(self) -> Option<Self::Message>;
}

impl<T: Message> MessageArg for T {
    type Message = T;

    fn into_message(self) -> Option<T> {
        Some(self)
    }
}

impl<T: Message> MessageArg for Option<T> {
    type Message = T;

    fn into_message(self) -> Option<T> {
        self
    }
}
