//! # Message Handlers
//!
//! A [`MessageHandler<T>`] binds one exact message type to one callback. The
//! bus stores handlers type-erased behind the [`Handler`] trait and asks each
//! one whether it can take a message before dispatching to it.
//!
//! ## Matching
//!
//! Matching compares the handler's bound `TypeId` with the runtime type of the
//! message. There is no covariance: a handler bound to a wrapper or a
//! "base" payload never receives a different concrete type, and vice versa.
//!
//! ## Callback identity
//!
//! [`Callback`] equality is identity of the shared allocation. Clones of one
//! callback are the same registration; two callbacks built separately are
//! different registrations even when they wrap the same function.

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::{BusError, BusResult};
use crate::message::{downcast_arc, Message};

type CallbackFn<T> = dyn Fn(Arc<T>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Receiver callback for messages of type `T`.
pub struct Callback<T: Message> {
    inner: Arc<CallbackFn<T>>,
}

impl<T: Message> Callback<T> {
    /// Wraps an async function or closure as a callback.
    ///
    /// ```rust
    /// use message_system::{Callback, Message};
    /// use std::sync::Arc;
    ///
    /// #[derive(Debug)]
    /// struct Tick;
    /// impl Message for Tick {}
    ///
    /// let callback = Callback::new(|_tick: Arc<Tick>| async move { Ok(()) });
    /// assert!(callback.same_as(&callback.clone()));
    /// ```
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |message: Arc<T>| f(message).boxed()),
        }
    }

    /// Identity comparison; captured state is never inspected.
    pub fn same_as(&self, other: &Callback<T>) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.inner) as *const (),
            Arc::as_ptr(&other.inner) as *const (),
        )
    }

    pub(crate) fn invoke(&self, message: Arc<T>) -> BoxFuture<'static, anyhow::Result<()>> {
        (self.inner)(message)
    }
}

impl<T: Message> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Message> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("message_type", &std::any::type_name::<T>())
            .field("ptr", &(Arc::as_ptr(&self.inner) as *const ()))
            .finish()
    }
}

/// Argument accepted where a callback is required: a callback, a reference to
/// one, or an `Option`, `None` standing for an absent callback.
pub trait CallbackArg {
    type Message: Message;

    fn into_callback(self) -> Option<Callback<Self::Message>>;
}

impl<T: Message> CallbackArg for Callback<T> {
    type Message = T;

    fn into_callback(self) -> Option<Callback<T>> {
        Some(self)
    }
}

impl<T: Message> CallbackArg for &Callback<T> {
    type Message = T;

    fn into_callback(self) -> Option<Callback<T>> {
        Some(self.clone())
    }
}

impl<T: Message> CallbackArg for Option<Callback<T>> {
    type Message = T;

    fn into_callback(self) -> Option<Callback<T>> {
        self
    }
}

/// Type-erased dispatch unit stored in the bus registry.
#[async_trait]
pub trait Handler: Send + Sync + fmt::Debug {
    /// Bound message type, fixed at construction.
    fn message_type(&self) -> TypeId;

    fn message_type_name(&self) -> &'static str;

    /// `false` for an absent message, otherwise exact runtime type equality.
    fn can_handle(&self, message: Option<&dyn Message>) -> bool;

    /// Delivers the message to the bound callback and resolves when the
    /// callback's work completes. Callback errors are returned, not swallowed.
    async fn handle(&self, message: Option<Arc<dyn Message>>) -> BusResult<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Handler bound to exactly one message type `T`.
///
/// Built only through [`HandlerFactory`](super::HandlerFactory), which
/// validates the callback first:
///
/// ```compile_fail
/// use message_system::{Callback, Message, MessageHandler};
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct Tick;
/// impl Message for Tick {}
///
/// let callback = Callback::new(|_tick: Arc<Tick>| async move { Ok(()) });
/// let _handler = MessageHandler::new(callback);
/// ```
pub struct MessageHandler<T: Message> {
    callback: Callback<T>,
}

impl<T: Message> MessageHandler<T> {
    pub(crate) fn new(callback: Callback<T>) -> Self {
        Self { callback }
    }

    /// Whether this handler was built from `candidate` (identity comparison).
    pub fn has_callback(&self, candidate: &Callback<T>) -> bool {
        self.callback.same_as(candidate)
    }
}

impl<T: Message> fmt::Debug for MessageHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHandler")
            .field("message_type", &std::any::type_name::<T>())
            .field("callback", &self.callback)
            .finish()
    }
}

#[async_trait]
impl<T: Message> Handler for MessageHandler<T> {
    fn message_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn message_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn can_handle(&self, message: Option<&dyn Message>) -> bool {
        match message {
            Some(message) => message.is::<T>(),
            None => false,
        }
    }

    async fn handle(&self, message: Option<Arc<dyn Message>>) -> BusResult<()> {
        let message = message.ok_or_else(|| BusError::invalid_argument("message"))?;

        let typed = downcast_arc::<T>(message).map_err(|other| BusError::MessageTypeMismatch {
            expected: std::any::type_name::<T>(),
            actual: other.as_ref().message_type_name(),
        })?;

        self.callback
            .invoke(typed)
            .await
            .map_err(|e| BusError::CallbackFailed {
                message_type: std::any::type_name::<T>(),
                reason: format!("{e:#}"),
            })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
