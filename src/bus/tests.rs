use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::{Event, EventBus, EventType};

/// Poll until `cond` holds or a second passes.
async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

fn reload() -> Event {
    Event::new(EventType::Reload, "test")
}

#[tokio::test]
async fn test_publish_drops_when_full_without_blocking() {
    let bus = EventBus::new(4);

    // Loop not started: nothing drains the buffer
    let accepted = (0..10).filter(|_| bus.publish(reload())).count();
    assert_eq!(accepted, 4);
    assert_eq!(bus.dropped(), 6);

    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    bus.subscribe(EventType::Reload, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(bus.start());
    assert!(eventually(|| received.load(Ordering::SeqCst) == 4).await);
    bus.stop().await;
}

#[tokio::test]
async fn test_delivery_follows_publish_order() {
    let bus = EventBus::new(16);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(EventType::FileModified, move |event| {
        sink.lock().push(event.get_str("path").unwrap_or_default().to_string());
    });
    bus.start();

    for name in ["a", "b", "c"] {
        bus.publish(Event::new(EventType::FileModified, "test").with("path", name));
    }
    assert!(eventually(|| seen.lock().len() == 3).await);
    assert_eq!(*seen.lock(), ["a", "b", "c"]);
    bus.stop().await;
}

#[tokio::test]
async fn test_panicking_handler_is_isolated() {
    let bus = EventBus::new(8);
    let delivered = Arc::new(AtomicUsize::new(0));

    bus.subscribe(EventType::Reload, |_| panic!("handler failure"));
    let counter = Arc::clone(&delivered);
    bus.subscribe(EventType::Reload, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    bus.start();

    bus.publish(reload());
    assert!(eventually(|| delivered.load(Ordering::SeqCst) == 1).await);

    // The loop survived and keeps delivering
    bus.publish(reload());
    assert!(eventually(|| delivered.load(Ordering::SeqCst) == 2).await);
    bus.stop().await;
}

#[tokio::test]
async fn test_only_matching_type_delivered() {
    let bus = EventBus::new(8);
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    bus.subscribe(EventType::BuildCompleted, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    bus.start();

    bus.publish(reload());
    bus.publish(Event::new(EventType::BuildCompleted, "test"));
    assert!(eventually(|| delivered.load(Ordering::SeqCst) == 1).await);
    bus.stop().await;
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unsubscribe() {
    let bus = EventBus::new(8);
    let id = bus.subscribe(EventType::Reload, |_| {});
    assert_eq!(bus.subscriber_count(EventType::Reload), 1);

    assert!(bus.unsubscribe(EventType::Reload, id));
    assert!(!bus.unsubscribe(EventType::Reload, id));
    assert_eq!(bus.subscriber_count(EventType::Reload), 0);
}

#[tokio::test]
async fn test_stop_is_idempotent_and_start_once() {
    let bus = EventBus::new(2);
    assert!(bus.start());
    assert!(!bus.start());
    bus.stop().await;
    bus.stop().await;

    // Nothing drains after stop; the receiver is closed
    assert!(!bus.publish(reload()));
}
