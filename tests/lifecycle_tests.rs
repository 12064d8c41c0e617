//! Activation, deactivation and disposal of the background dispatch loop.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use message_system::{BusError, Callback, MessageBus, MessageBusConfig};
use parking_lot::Mutex;
use tokio_test::assert_ok;

const SETTLE: Duration = Duration::from_millis(150);
const DEADLINE: Duration = Duration::from_secs(2);

fn fast_bus() -> MessageBus {
    MessageBus::with_config(MessageBusConfig {
        idle_poll_interval_ms: 10,
        ..Default::default()
    })
    .expect("valid configuration")
}

#[tokio::test]
async fn test_inactive_send_then_activate_then_deactivate() {
    init_test_logging();
    let bus = fast_bus();
    let counter = Arc::new(AtomicUsize::new(0));
    bus.register_receiver(counting_callback::<OrderPlaced>(&counter))
        .unwrap();

    bus.send_message(OrderPlaced { id: 1 }).unwrap();
    let pending = bus.active_messages();
    assert_eq!(pending.len(), 1);
    assert_eq!(
        pending[0].as_ref().downcast_ref::<OrderPlaced>(),
        Some(&OrderPlaced { id: 1 })
    );
    tokio::time::sleep(SETTLE).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    assert_ok!(bus.activate());
    assert!(bus.is_active());
    assert!(wait_until(DEADLINE, || counter.load(Ordering::SeqCst) >= 1).await);
    assert!(bus.wait_for_idle(DEADLINE).await);
    assert!(bus.active_messages().is_empty());

    assert_ok!(bus.deactivate());
    assert!(!bus.is_active());
    bus.send_message(OrderPlaced { id: 2 }).unwrap();
    bus.send_message(OrderPlaced { id: 3 }).unwrap();
    tokio::time::sleep(SETTLE).await;

    assert_eq!(bus.active_messages().len(), 2);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_message_sent_while_active_is_dispatched_promptly() {
    // The loop must dispatch while it is running, not only once
    // cancellation has been requested.
    let bus = MessageBus::new();
    let counter = Arc::new(AtomicUsize::new(0));
    bus.register_receiver(counting_callback::<OrderPlaced>(&counter))
        .unwrap();
    bus.activate().unwrap();

    bus.send_message(OrderPlaced { id: 1 }).unwrap();

    assert!(wait_until(DEADLINE, || counter.load(Ordering::SeqCst) == 1).await);
    assert!(bus.is_active());
    assert!(!bus.is_disposed());

    bus.deactivate().unwrap();
}

#[tokio::test]
async fn test_background_loop_preserves_send_order() {
    let bus = fast_bus();
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.register_receiver(recording_callback(&log)).unwrap();

    for id in 0..20 {
        bus.send_message(OrderPlaced { id }).unwrap();
    }
    bus.activate().unwrap();

    assert!(bus.wait_for_idle(DEADLINE).await);
    assert_eq!(*log.lock(), (0..20).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_reactivation_drains_accumulated_messages() {
    let bus = fast_bus();
    let counter = Arc::new(AtomicUsize::new(0));
    bus.register_receiver(counting_callback::<OrderPlaced>(&counter))
        .unwrap();

    bus.activate().unwrap();
    bus.deactivate().unwrap();
    for id in 0..3 {
        bus.send_message(OrderPlaced { id }).unwrap();
    }
    tokio::time::sleep(SETTLE).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    bus.activate().unwrap();

    assert!(bus.wait_for_idle(DEADLINE).await);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_eq!(bus.stats().activations, 2);
}

#[tokio::test]
async fn test_callback_failure_is_published_and_loop_survives() {
    let bus = fast_bus();
    let mut failures = bus.subscribe_failures();
    let counter = Arc::new(AtomicUsize::new(0));
    bus.register_receiver(failing_callback::<OrderPlaced>("inventory unavailable"))
        .unwrap();
    bus.register_receiver(counting_callback::<OrderShipped>(&counter))
        .unwrap();
    bus.activate().unwrap();

    bus.send_message(OrderPlaced { id: 1 }).unwrap();
    let failure = tokio::time::timeout(DEADLINE, failures.recv())
        .await
        .expect("failure should be published")
        .expect("channel open");
    assert_eq!(failure.label, "callback_failed");
    assert!(failure.reason.contains("inventory unavailable"));

    bus.send_message(OrderShipped { id: 1 }).unwrap();
    assert!(wait_until(DEADLINE, || counter.load(Ordering::SeqCst) == 1).await);
    assert!(bus.is_active());
    assert_eq!(bus.stats().handler_failures, 1);
}

#[tokio::test]
async fn test_panic_does_not_kill_background_loop() {
    let bus = fast_bus();
    let mut failures = bus.subscribe_failures();
    let counter = Arc::new(AtomicUsize::new(0));
    bus.register_receiver(panicking_callback::<OrderShipped>())
        .unwrap();
    bus.register_receiver(counting_callback::<OrderPlaced>(&counter))
        .unwrap();
    bus.activate().unwrap();

    bus.send_message(OrderShipped { id: 1 }).unwrap();
    bus.send_message(OrderPlaced { id: 2 }).unwrap();

    let failure = tokio::time::timeout(DEADLINE, failures.recv())
        .await
        .expect("panic should be reported")
        .expect("channel open");
    assert_eq!(failure.label, "callback_panicked");
    assert!(wait_until(DEADLINE, || counter.load(Ordering::SeqCst) == 1).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deactivate_lets_in_flight_dispatch_finish() {
    let bus = fast_bus();
    let started = Arc::new(tokio::sync::Notify::new());
    let finished = Arc::new(AtomicUsize::new(0));
    {
        let started = Arc::clone(&started);
        let finished = Arc::clone(&finished);
        bus.register_receiver(Callback::new(move |_order: Arc<OrderPlaced>| {
            let started = Arc::clone(&started);
            let finished = Arc::clone(&finished);
            async move {
                started.notify_one();
                tokio::time::sleep(Duration::from_millis(100)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
        .unwrap();
    }
    bus.send_message(OrderPlaced { id: 1 }).unwrap();
    bus.send_message(OrderPlaced { id: 2 }).unwrap();
    bus.activate().unwrap();

    tokio::time::timeout(DEADLINE, started.notified())
        .await
        .expect("first dispatch should start");
    bus.deactivate().unwrap();

    // Returns without waiting for the running callback
    assert_eq!(finished.load(Ordering::SeqCst), 0);
    assert!(wait_until(DEADLINE, || finished.load(Ordering::SeqCst) == 1).await);

    tokio::time::sleep(SETTLE).await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(bus.active_messages().len(), 1);
}

#[tokio::test]
async fn test_dispose_stops_loop_and_rejects_operations() {
    let bus = fast_bus();
    let counter = Arc::new(AtomicUsize::new(0));
    let callback = counting_callback::<OrderPlaced>(&counter);
    bus.register_receiver(&callback).unwrap();
    bus.activate().unwrap();

    bus.dispose();
    bus.dispose();

    assert!(bus.is_disposed());
    assert!(!bus.is_active());
    assert_eq!(bus.send_message(OrderPlaced { id: 1 }), Err(BusError::Disposed));
    assert_eq!(bus.register_receiver(&callback), Err(BusError::Disposed));
    assert_eq!(bus.unregister_receiver(&callback), Err(BusError::Disposed));
    assert_eq!(bus.activate(), Err(BusError::Disposed));
    assert_eq!(bus.deactivate(), Err(BusError::Disposed));
}

#[test]
fn test_dispose_without_activation() {
    let bus = MessageBus::new();
    bus.dispose();
    assert!(bus.is_disposed());
}

#[tokio::test]
async fn test_processing_alongside_background_loop_delivers_once() {
    let bus = fast_bus();
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.register_receiver(recording_callback(&log)).unwrap();
    bus.activate().unwrap();

    for id in 0..50 {
        bus.send_message(OrderPlaced { id }).unwrap();
    }
    bus.process_messages().await.unwrap();
    assert!(bus.wait_for_idle(DEADLINE).await);

    let mut received = log.lock().clone();
    received.sort_unstable();
    assert_eq!(received, (0..50).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_wait_for_idle_times_out_while_inactive() {
    let bus = MessageBus::new();
    bus.send_message(OrderPlaced { id: 1 }).unwrap();

    assert!(!bus.wait_for_idle(Duration::from_millis(50)).await);
}

#[test]
fn test_activate_requires_runtime() {
    let bus = MessageBus::new();

    assert_eq!(bus.activate(), Err(BusError::NoRuntime));
    assert!(!bus.is_active());
}
