#![allow(dead_code)]

pub mod strategies;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use message_system::{Callback, Message};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlaced {
    pub id: u64,
}
impl Message for OrderPlaced {}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderShipped {
    pub id: u64,
}
impl Message for OrderShipped {}

/// Wraps an `OrderPlaced`; receivers of one must never see the other
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityOrderPlaced(pub OrderPlaced);
impl Message for PriorityOrderPlaced {}

pub fn counting_callback<T: Message>(counter: &Arc<AtomicUsize>) -> Callback<T> {
    let counter = Arc::clone(counter);
    Callback::new(move |_message: Arc<T>| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// Records the id of every `OrderPlaced` received, in delivery order
pub fn recording_callback(log: &Arc<Mutex<Vec<u64>>>) -> Callback<OrderPlaced> {
    let log = Arc::clone(log);
    Callback::new(move |order: Arc<OrderPlaced>| {
        let log = Arc::clone(&log);
        async move {
            log.lock().push(order.id);
            Ok(())
        }
    })
}

pub fn failing_callback<T: Message>(reason: &'static str) -> Callback<T> {
    Callback::new(move |_message: Arc<T>| async move { Err(anyhow::anyhow!("{reason}")) })
}

pub fn panicking_callback<T: Message>() -> Callback<T> {
    Callback::new(|_message: Arc<T>| async move {
        if std::hint::black_box(true) {
            panic!("receiver panicked");
        }
        Ok(())
    })
}

/// Sleeps for `delay` before counting the message
pub fn slow_callback<T: Message>(delay: Duration, counter: &Arc<AtomicUsize>) -> Callback<T> {
    let counter = Arc::clone(counter);
    Callback::new(move |_message: Arc<T>| {
        let counter = Arc::clone(&counter);
        async move {
            tokio::time::sleep(delay).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

/// Run `future` to completion with a generous upper bound.
pub async fn within_deadline<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("operation did not complete within 5s")
}

pub fn init_test_logging() {
    message_system::logging::init_structured_logging();
}
