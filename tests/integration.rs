//! Integration tests for subscribe / publish / unsubscribe behaviour.

use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use typehub::{HandlerError, Hub, HubConfig, MessageType, Token};

type Log = Arc<Mutex<Vec<String>>>;

/// Route hub logs to the test output. Safe to call from every test.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Subscribe a handler that records "<tag>-<msg>" into `log`.
fn subscribe_recorder(hub: &Hub, log: &Log, tag: &'static str) -> Token {
    let log = Arc::clone(log);
    hub.subscribe(move |msg: &String| {
        log.lock().push(format!("{}-{}", tag, msg));
        Ok(())
    })
}

/// Global handler that records every string message it sees into `log`.
fn register_global_recorder(hub: &Hub, log: &Log) {
    let log = Arc::clone(log);
    hub.register_global_handler(move |ty: MessageType, msg: &dyn Any| {
        assert!(ty.is::<String>());
        let msg = msg.downcast_ref::<String>().expect("string message");
        log.lock().push(msg.clone());
        Ok(())
    });
}

// --- Basic delivery ---

#[test]
fn test_publish_with_no_subscribers() {
    let hub = Hub::create();
    hub.publish(Duration::from_nanos(1234)).unwrap();

    let result = new_log();
    register_global_recorder(&hub, &result);

    hub.publish("654321".to_string()).unwrap();

    assert_eq!(*result.lock(), vec!["654321"]);
}

#[test]
fn test_unsubscribe_invalid_token() {
    let hub = Hub::create();
    hub.unsubscribe::<String>(Token::new());

    subscribe_recorder(&hub, &new_log(), "Sub1");
    hub.unsubscribe::<String>(Token::new());
    assert_eq!(hub.subscription_count::<String>(), 1);
}

#[test]
fn test_single_subscriber() {
    let hub = Hub::create();
    let log = new_log();
    subscribe_recorder(&hub, &log, "Sub1");

    hub.publish("MessageA".to_string()).unwrap();
    assert_eq!(*log.lock(), vec!["Sub1-MessageA"]);

    hub.publish("MessageB".to_string()).unwrap();
    assert_eq!(*log.lock(), vec!["Sub1-MessageA", "Sub1-MessageB"]);
}

#[test]
fn test_multiple_subscribers_each_invoked_once() {
    let hub = Hub::create();
    let one = new_log();
    let two = new_log();
    subscribe_recorder(&hub, &one, "Sub1");
    subscribe_recorder(&hub, &two, "Sub2");

    hub.publish("MessageA".to_string()).unwrap();
    hub.publish("MessageB".to_string()).unwrap();

    assert_eq!(*one.lock(), vec!["Sub1-MessageA", "Sub1-MessageB"]);
    assert_eq!(*two.lock(), vec!["Sub2-MessageA", "Sub2-MessageB"]);
}

#[test]
fn test_subscribers_filtering_inside_handlers() {
    let hub = Hub::create();
    let long = new_log();
    let short = new_log();

    {
        let long = Arc::clone(&long);
        hub.subscribe(move |msg: &String| {
            if msg.len() > 3 {
                long.lock().push(format!("Sub1-{}", msg));
            }
            Ok(())
        });
    }
    {
        let short = Arc::clone(&short);
        hub.subscribe(move |msg: &String| {
            if msg.len() < 3 {
                short.lock().push(format!("Sub2-{}", msg));
            }
            Ok(())
        });
    }

    for msg in ["MessageA", "MA", "MMM", "MessageB", "MB"] {
        hub.publish(msg.to_string()).unwrap();
    }

    assert_eq!(*long.lock(), vec!["Sub1-MessageA", "Sub1-MessageB"]);
    assert_eq!(*short.lock(), vec!["Sub2-MA", "Sub2-MB"]);
}

#[test]
fn test_same_handler_subscribed_twice() {
    let hub = Hub::create();
    let global_count = Arc::new(AtomicUsize::new(0));
    {
        let global_count = Arc::clone(&global_count);
        hub.register_global_handler(move |_, _| {
            global_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    let received = Arc::new(AtomicUsize::new(0));
    let handler = {
        let received = Arc::clone(&received);
        move |_: &String| -> Result<(), HandlerError> {
            received.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    };

    let first = hub.subscribe(handler.clone());
    let second = hub.subscribe(handler);
    assert_ne!(first, second);

    hub.publish("A".to_string()).unwrap();

    assert_eq!(received.load(Ordering::SeqCst), 2);
    assert_eq!(global_count.load(Ordering::SeqCst), 1);
}

// --- Type matching ---

#[derive(Clone, Debug, PartialEq)]
struct Ping(u32);

#[derive(Clone, Debug, PartialEq)]
struct Pong(u32);

#[test]
fn test_exact_type_matching() {
    let hub = Hub::create();
    let pings = hub.subscribe_channel::<Ping>(16);
    let pongs = hub.subscribe_channel::<Pong>(16);
    let strings = new_log();
    subscribe_recorder(&hub, &strings, "Str");

    hub.publish(Ping(1)).unwrap();
    hub.publish(Pong(2)).unwrap();
    hub.publish(Ping(3)).unwrap();
    // &str is not String.
    hub.publish("not a String").unwrap();

    assert_eq!(pings.drain(), vec![Ping(1), Ping(3)]);
    assert_eq!(pongs.drain(), vec![Pong(2)]);
    assert!(strings.lock().is_empty());
}

#[test]
fn test_global_handler_sees_exact_type() {
    let hub = Hub::create();
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        hub.register_global_handler(move |ty, msg| {
            seen.lock().push((ty, msg.is::<Ping>()));
            Ok(())
        });
    }

    hub.publish(Ping(1)).unwrap();
    hub.publish(7u64).unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], (MessageType::of::<Ping>(), true));
    assert_eq!(seen[1], (MessageType::of::<u64>(), false));
}

// --- Unsubscribe ---

#[test]
fn test_unsubscribe_then_resubscribe() {
    init_tracing();
    let hub = Hub::create();
    let total = Arc::new(AtomicUsize::new(0));
    {
        let total = Arc::clone(&total);
        hub.register_global_handler(move |ty, _| {
            assert!(ty.is::<String>());
            total.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    let log = new_log();
    let token_one = subscribe_recorder(&hub, &log, "Sub1");
    subscribe_recorder(&hub, &log, "Sub2");

    hub.publish("A".to_string()).unwrap();
    assert_eq!(*log.lock(), vec!["Sub1-A", "Sub2-A"]);

    hub.unsubscribe::<String>(token_one);
    hub.publish("B".to_string()).unwrap();
    assert_eq!(log.lock()[2..], ["Sub2-B"]);

    let token_again = subscribe_recorder(&hub, &log, "Sub1");
    assert_ne!(token_again, token_one);
    hub.publish("C".to_string()).unwrap();

    // Re-subscribing appends to the end of the subscriber order.
    assert_eq!(log.lock()[3..], ["Sub2-C", "Sub1-C"]);
    assert_eq!(total.load(Ordering::SeqCst), 3);
}

#[test]
fn test_unsubscribe_twice_is_noop() {
    let hub = Hub::create();
    let log = new_log();
    let token = subscribe_recorder(&hub, &log, "Sub1");

    hub.unsubscribe::<String>(token);
    let revision = hub.revision::<String>();
    hub.unsubscribe::<String>(token);

    assert_eq!(hub.revision::<String>(), revision + 1);
    hub.publish("A".to_string()).unwrap();
    assert!(log.lock().is_empty());
}

// --- Global handler ---

#[test]
fn test_global_handler_replacement() {
    let hub = Hub::create();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    {
        let first = Arc::clone(&first);
        hub.register_global_handler(move |_, _| {
            first.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    hub.publish("A".to_string()).unwrap();
    assert_eq!(first.load(Ordering::SeqCst), 1);
    hub.publish("B".to_string()).unwrap();
    assert_eq!(first.load(Ordering::SeqCst), 2);

    // Registering the same counter twice still leaves a single slot.
    for _ in 0..2 {
        let second = Arc::clone(&second);
        hub.register_global_handler(move |_, _| {
            second.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    hub.publish("C".to_string()).unwrap();
    assert_eq!(second.load(Ordering::SeqCst), 1);

    hub.register_global_handler(|_, _| Ok(()));
    hub.publish("D".to_string()).unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 2);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[test]
fn test_global_handler_fires_once_regardless_of_subscribers() {
    let hub = Hub::create();
    let global = new_log();
    register_global_recorder(&hub, &global);

    let log = new_log();
    for tag in ["Sub1", "Sub2", "Sub3", "Sub4"] {
        subscribe_recorder(&hub, &log, tag);
    }

    hub.publish("A".to_string()).unwrap();

    assert_eq!(*global.lock(), vec!["A"]);
    assert_eq!(log.lock().len(), 4);
}

#[test]
fn test_cleared_global_handler_stops_firing() {
    let hub = Hub::create();
    let global = new_log();
    register_global_recorder(&hub, &global);

    hub.publish("A".to_string()).unwrap();
    hub.clear_global_handler();
    hub.publish("B".to_string()).unwrap();

    assert_eq!(*global.lock(), vec!["A"]);
}

// --- Hub isolation ---

#[test]
fn test_multiple_hubs_are_independent() {
    init_tracing();
    let hub1 = Hub::with_config(HubConfig {
        label: "hub1".to_string(),
        ..Default::default()
    });
    let hub2 = Hub::with_config(HubConfig {
        label: "hub2".to_string(),
        ..Default::default()
    });

    let total1 = new_log();
    let total2 = new_log();
    register_global_recorder(&hub1, &total1);
    register_global_recorder(&hub2, &total2);

    let hub1_messages = new_log();
    let hub2_messages = new_log();
    subscribe_recorder(&hub1, &hub1_messages, "hub1");
    subscribe_recorder(&hub2, &hub2_messages, "hub2");

    hub1.publish("A".to_string()).unwrap();
    hub2.publish("B".to_string()).unwrap();
    hub2.publish("C".to_string()).unwrap();

    assert_eq!(*total1.lock(), vec!["A"]);
    assert_eq!(*total2.lock(), vec!["B", "C"]);
    assert_eq!(*hub1_messages.lock(), vec!["hub1-A"]);
    assert_eq!(*hub2_messages.lock(), vec!["hub2-B", "hub2-C"]);
}

#[test]
fn test_token_from_other_hub_is_ignored() {
    let hub1 = Hub::create();
    let hub2 = Hub::create();
    let log = new_log();

    let token = subscribe_recorder(&hub1, &log, "Sub1");
    subscribe_recorder(&hub2, &log, "Sub2");
    hub2.unsubscribe::<String>(token);

    hub1.publish("A".to_string()).unwrap();
    hub2.publish("B".to_string()).unwrap();

    assert_eq!(*log.lock(), vec!["Sub1-A", "Sub2-B"]);
}

// --- Introspection ---

#[test]
fn test_revision_tracks_every_mutation() {
    let hub = Hub::create();
    assert_eq!(hub.revision::<String>(), 0);

    let a = subscribe_recorder(&hub, &new_log(), "a");
    let b = subscribe_recorder(&hub, &new_log(), "b");
    assert_eq!(hub.revision::<String>(), 2);
    assert_eq!(hub.subscription_count::<String>(), 2);

    hub.unsubscribe::<String>(a);
    hub.unsubscribe::<String>(b);
    hub.unsubscribe::<String>(b);
    assert_eq!(hub.revision::<String>(), 5);
    assert_eq!(hub.subscription_count::<String>(), 0);
}
