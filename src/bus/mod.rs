//! # Dispatch Engine
//!
//! [`MessageBus`] ties the receiver registry to a FIFO queue and runs the
//! dispatch modes:
//!
//! - **Manual**: [`MessageBus::process_messages`] drains everything pending
//!   and resolves once every invocation it started has finished.
//! - **Active**: [`MessageBus::activate`] spawns a background loop that
//!   dispatches one message at a time until [`MessageBus::deactivate`].
//!
//! ```rust
//! use message_system::{Callback, Message, MessageBus};
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct OrderPlaced {
//!     id: u64,
//! }
//! impl Message for OrderPlaced {}
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = MessageBus::new();
//! bus.register_receiver(Callback::new(|order: Arc<OrderPlaced>| async move {
//!     println!("order {} placed", order.id);
//!     Ok(())
//! }))?;
//!
//! bus.send_message(OrderPlaced { id: 42 })?;
//! bus.process_messages().await?;
//! assert!(bus.active_messages().is_empty());
//! # Ok(())
//! # }
//! ```

mod activation;
pub mod message_bus;
mod queue;
pub mod stats;

pub use message_bus::MessageBus;
pub use stats::BusStats;
