//! # Registry Infrastructure
//!
//! Handler construction and the ordered receiver registry owned by the bus.
//!
//! ## Architecture
//!
//! ```text
//! Registry Infrastructure
//! ├── Handler / MessageHandler<T>  (exact-type dispatch unit)
//! ├── HandlerFactory               (callback validation & handler creation)
//! └── ReceiverRegistry             (ordered, lock-protected handler list)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use message_system::registry::{HandlerFactory, ReceiverRegistry};
//! use message_system::{Callback, Message};
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct Heartbeat;
//! impl Message for Heartbeat {}
//!
//! let registry = ReceiverRegistry::new(HandlerFactory::new());
//! let callback = Callback::new(|_beat: Arc<Heartbeat>| async move { Ok(()) });
//!
//! registry.register(&callback).unwrap();
//! assert!(registry.register(&callback).is_err());
//! assert_eq!(registry.len(), 1);
//! ```

pub mod handler;
pub mod handler_factory;
pub mod receiver_registry;

pub use handler::{Callback, CallbackArg, Handler, MessageHandler};
pub use handler_factory::HandlerFactory;
pub use receiver_registry::ReceiverRegistry;
