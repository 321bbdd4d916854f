use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::event::{BusEvent, EventBus, KernelEvent};

fn error_event(message: &str) -> KernelEvent {
    KernelEvent::Error {
        message: message.to_string(),
        module: None,
        operation: None,
    }
}

#[test]
fn test_subscribers_receive_emitted_events() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(move |event| sink.lock().unwrap().push(event.name().to_string()))
        .unwrap();

    bus.emit(&error_event("one")).unwrap();
    bus.emit(&KernelEvent::MemoryLeaks(Vec::new())).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["error", "memoryLeaks"]);
}

#[test]
fn test_multiple_subscribers_in_registration_order() {
    let bus = EventBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second"] {
        let sink = Arc::clone(&order);
        bus.subscribe(move |_| sink.lock().unwrap().push(tag)).unwrap();
    }
    bus.emit(&error_event("x")).unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let bus = EventBus::new();
    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    let id = bus
        .subscribe(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    bus.emit(&error_event("a")).unwrap();
    assert!(bus.unsubscribe(id).unwrap());
    bus.emit(&error_event("b")).unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!bus.unsubscribe(id).unwrap());
}

#[test]
fn test_event_names_are_stable() {
    assert_eq!(KernelEvent::Ready(Vec::new()).name(), "ready");
    assert_eq!(error_event("x").name(), "error");
    assert_eq!(KernelEvent::MemoryLeaks(Vec::new()).name(), "memoryLeaks");
}

#[test]
fn test_bus_event_display_names_the_source() {
    let anonymous = BusEvent::new("tick", json!(null), None);
    assert_eq!(anonymous.to_string(), "tick");

    let sourced = BusEvent::new("tick", json!(null), Some("clock".to_string()));
    assert_eq!(sourced.to_string(), "tick (from clock)");
}
