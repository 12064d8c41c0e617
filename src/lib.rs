#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Message System
//!
//! In-process, typed publish/subscribe message bus.
//!
//! ## Overview
//!
//! Producers enqueue typed messages; consumers register async callbacks keyed
//! by the exact message type. A dispatch engine drains the queue and fans each
//! message out, in parallel, to every callback bound to that type. Draining
//! happens either on demand or continuously from a background task between
//! `activate` and `deactivate`.
//!
//! ## Module Organization
//!
//! - [`message`] - The `Message` capability and argument helpers
//! - [`registry`] - Handlers, the handler factory and the receiver registry
//! - [`bus`] - The dispatch engine and its lifecycle
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and helpers
//!
//! ## Quick Start
//!
//! ```rust
//! use message_system::{Callback, Message, MessageBus};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct UserSignedUp {
//!     email: String,
//! }
//! impl Message for UserSignedUp {}
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! message_system::logging::init_structured_logging();
//!
//! let bus = MessageBus::new();
//! bus.register_receiver(Callback::new(|event: Arc<UserSignedUp>| async move {
//!     tracing::info!(email = %event.email, "sending welcome mail");
//!     Ok(())
//! }))?;
//!
//! bus.activate()?;
//! bus.send_message(UserSignedUp { email: "ada@example.com".to_string() })?;
//! assert!(bus.wait_for_idle(Duration::from_secs(1)).await);
//!
//! bus.dispose();
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib                       # Unit tests
//! cargo test                             # All tests
//! cargo bench --features benchmarks      # Criterion benchmarks
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod registry;

pub use bus::{BusStats, MessageBus};
pub use config::{ConfigLoader, MessageBusConfig};
pub use error::{BusError, BusResult, DispatchFailure};
pub use message::{Message, MessageArg};
pub use registry::{Callback, CallbackArg, Handler, HandlerFactory, MessageHandler};
