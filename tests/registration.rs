//! Registration lifecycle: no-handler rejection, duplicate detection,
//! unregister semantics, index providers, and strict verification.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use typebus::{
    event_type, subscriber_info, EventBus, EventBusError, HandlerDef, Subscriber, SubscriberInfo,
    SubscriberInfoIndex, ThreadMode,
};

struct Beat;
event_type!(Beat);

struct BeatCounter {
    count: AtomicUsize,
}
impl BeatCounter {
    fn on_beat(&self, _event: &Beat) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
subscriber_info! {
    BeatCounter;
    on_beat => Beat;
}

// ---- NoHandlers ----

struct Handlerless;

impl Subscriber for Handlerless {
    fn subscriber_info(&self) -> &'static SubscriberInfo {
        Self::info()
    }
    fn info() -> &'static SubscriberInfo {
        static INFO: SubscriberInfo = SubscriberInfo {
            subscriber_type: "Handlerless",
            type_id: TypeId::of::<Handlerless>,
            handlers: &[],
            supertype: None,
        };
        &INFO
    }
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

#[test]
fn subscriber_without_handlers_is_rejected() {
    let bus = EventBus::new();
    let empty = Arc::new(Handlerless);
    let err = bus.register(Arc::clone(&empty)).unwrap_err();
    assert!(matches!(err, EventBusError::NoHandlers { subscriber_type: "Handlerless" }));
    assert!(!bus.is_registered(&empty));
}

// ---- Duplicate registration and lifecycle ----

#[test]
fn double_registration_fails_and_unregister_recovers() {
    let bus = EventBus::new();
    let counter = Arc::new(BeatCounter { count: AtomicUsize::new(0) });

    assert!(!bus.is_registered(&counter));
    bus.register(Arc::clone(&counter)).unwrap();
    assert!(bus.is_registered(&counter));

    let err = bus.register(Arc::clone(&counter)).unwrap_err();
    assert!(matches!(err, EventBusError::AlreadyRegistered { .. }));

    bus.unregister(&counter);
    assert!(!bus.is_registered(&counter));
    bus.register(Arc::clone(&counter)).unwrap();
    assert!(bus.is_registered(&counter));
}

#[test]
fn unregistering_an_unknown_subscriber_is_a_warning_not_an_error() {
    let bus = EventBus::new();
    let stranger = Arc::new(BeatCounter { count: AtomicUsize::new(0) });
    bus.unregister(&stranger);
    assert!(!bus.is_registered(&stranger));
}

#[test]
fn distinct_instances_of_one_type_register_independently() {
    let bus = EventBus::new();
    let first = Arc::new(BeatCounter { count: AtomicUsize::new(0) });
    let second = Arc::new(BeatCounter { count: AtomicUsize::new(0) });
    bus.register(Arc::clone(&first)).unwrap();
    bus.register(Arc::clone(&second)).unwrap();

    bus.post(Beat);
    assert_eq!(first.count.load(Ordering::SeqCst), 1);
    assert_eq!(second.count.load(Ordering::SeqCst), 1);

    bus.unregister(&first);
    bus.post(Beat);
    assert_eq!(first.count.load(Ordering::SeqCst), 1);
    assert_eq!(second.count.load(Ordering::SeqCst), 2);
}

#[test]
fn has_subscriber_for_tracks_registration() {
    let bus = EventBus::new();
    assert!(!bus.has_subscriber_for::<Beat>());
    let counter = Arc::new(BeatCounter { count: AtomicUsize::new(0) });
    bus.register(Arc::clone(&counter)).unwrap();
    assert!(bus.has_subscriber_for::<Beat>());
    bus.unregister(&counter);
    assert!(!bus.has_subscriber_for::<Beat>());
}

// ---- Index providers ----

// DualCounter declares only one of its two methods; the index table
// publishes both.
struct DualCounter {
    count: AtomicUsize,
}
impl DualCounter {
    fn on_beat(&self, _event: &Beat) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
    fn on_beat_extra(&self, _event: &Beat) {
        self.count.fetch_add(100, Ordering::SeqCst);
    }
}
subscriber_info! {
    DualCounter;
    on_beat => Beat;
}

struct DualIndex;

impl DualIndex {
    fn table() -> &'static SubscriberInfo {
        fn invoke_on_beat(subscriber: &(dyn Any + Send + Sync), event: &(dyn Any + Send + Sync)) {
            if let (Some(subscriber), Some(event)) =
                (subscriber.downcast_ref::<DualCounter>(), event.downcast_ref::<Beat>())
            {
                DualCounter::on_beat(subscriber, event);
            }
        }
        fn invoke_on_beat_extra(
            subscriber: &(dyn Any + Send + Sync),
            event: &(dyn Any + Send + Sync),
        ) {
            if let (Some(subscriber), Some(event)) =
                (subscriber.downcast_ref::<DualCounter>(), event.downcast_ref::<Beat>())
            {
                DualCounter::on_beat_extra(subscriber, event);
            }
        }
        static INFO: SubscriberInfo = SubscriberInfo {
            subscriber_type: "DualCounter",
            type_id: TypeId::of::<DualCounter>,
            handlers: &[
                HandlerDef {
                    name: "on_beat",
                    event: <Beat as typebus::Event>::event_type_of,
                    mode: ThreadMode::Posting,
                    priority: 0,
                    sticky: false,
                    invoke: invoke_on_beat,
                },
                HandlerDef {
                    name: "on_beat_extra",
                    event: <Beat as typebus::Event>::event_type_of,
                    mode: ThreadMode::Posting,
                    priority: 0,
                    sticky: false,
                    invoke: invoke_on_beat_extra,
                },
            ],
            supertype: None,
        };
        &INFO
    }
}

impl SubscriberInfoIndex for DualIndex {
    fn subscriber_info(&self, subscriber_type: TypeId) -> Option<&'static SubscriberInfo> {
        (subscriber_type == TypeId::of::<DualCounter>()).then(Self::table)
    }
}

#[test]
fn index_table_replaces_the_declared_table() {
    let bus = EventBus::builder().add_index(Arc::new(DualIndex)).build();
    let counter = Arc::new(DualCounter { count: AtomicUsize::new(0) });
    bus.register(Arc::clone(&counter)).unwrap();

    bus.post(Beat);
    assert_eq!(counter.count.load(Ordering::SeqCst), 101);
}

#[test]
fn ignoring_indexes_falls_back_to_the_declared_table() {
    let bus = EventBus::builder()
        .add_index(Arc::new(DualIndex))
        .ignore_registered_indexes(true)
        .build();
    let counter = Arc::new(DualCounter { count: AtomicUsize::new(0) });
    bus.register(Arc::clone(&counter)).unwrap();

    bus.post(Beat);
    assert_eq!(counter.count.load(Ordering::SeqCst), 1);
}

// ---- Strict verification ----

struct SloppyTarget {
    count: AtomicUsize,
}
impl SloppyTarget {
    fn on_beat(&self, _event: &Beat) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
subscriber_info! {
    SloppyTarget;
    on_beat => Beat;
}

struct SloppyIndex;

impl SloppyIndex {
    fn table() -> &'static SubscriberInfo {
        fn invoke(subscriber: &(dyn Any + Send + Sync), event: &(dyn Any + Send + Sync)) {
            if let (Some(subscriber), Some(event)) =
                (subscriber.downcast_ref::<SloppyTarget>(), event.downcast_ref::<Beat>())
            {
                SloppyTarget::on_beat(subscriber, event);
            }
        }
        static INFO: SubscriberInfo = SubscriberInfo {
            subscriber_type: "SloppyTarget",
            type_id: TypeId::of::<SloppyTarget>,
            handlers: &[
                // Malformed entry: empty method name.
                HandlerDef {
                    name: "",
                    event: <Beat as typebus::Event>::event_type_of,
                    mode: ThreadMode::Posting,
                    priority: 0,
                    sticky: false,
                    invoke,
                },
                HandlerDef {
                    name: "on_beat",
                    event: <Beat as typebus::Event>::event_type_of,
                    mode: ThreadMode::Posting,
                    priority: 0,
                    sticky: false,
                    invoke,
                },
            ],
            supertype: None,
        };
        &INFO
    }
}

impl SubscriberInfoIndex for SloppyIndex {
    fn subscriber_info(&self, subscriber_type: TypeId) -> Option<&'static SubscriberInfo> {
        (subscriber_type == TypeId::of::<SloppyTarget>()).then(Self::table)
    }
}

#[test]
fn strict_verification_rejects_malformed_entries() {
    let bus = EventBus::builder()
        .add_index(Arc::new(SloppyIndex))
        .strict_handler_verification(true)
        .build();
    let target = Arc::new(SloppyTarget { count: AtomicUsize::new(0) });
    let err = bus.register(Arc::clone(&target)).unwrap_err();
    assert!(matches!(err, EventBusError::IllegalHandler { .. }));
    assert!(!bus.is_registered(&target));
}

#[test]
fn lenient_verification_skips_malformed_entries() {
    let bus = EventBus::builder().add_index(Arc::new(SloppyIndex)).build();
    let target = Arc::new(SloppyTarget { count: AtomicUsize::new(0) });
    bus.register(Arc::clone(&target)).unwrap();

    bus.post(Beat);
    assert_eq!(target.count.load(Ordering::SeqCst), 1);
}
