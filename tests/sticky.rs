//! Sticky event semantics: replay on registration, latest-wins storage,
//! removal, inheritance-aware replay, and the no-cancel corner of replay.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use typebus::{event_type, subscriber_info, EventBus, EventBusError};

#[derive(PartialEq)]
struct Motd(String);
event_type!(Motd);

struct MotdReader {
    seen: Mutex<Vec<String>>,
}
impl MotdReader {
    fn on_motd(&self, event: &Motd) {
        self.seen.lock().unwrap().push(event.0.clone());
    }
}
subscriber_info! {
    MotdReader;
    #[handle(sticky)]
    on_motd => Motd;
}

fn seen(reader: &MotdReader) -> Vec<String> {
    reader.seen.lock().unwrap().clone()
}

#[test]
fn sticky_event_replays_to_later_registrants() {
    let bus = EventBus::new();
    bus.post_sticky(Motd("hello".into()));

    let first = Arc::new(MotdReader { seen: Mutex::new(Vec::new()) });
    bus.register(Arc::clone(&first)).unwrap();
    assert_eq!(seen(&first), ["hello"]);

    // Replay does not consume the sticky event.
    let second = Arc::new(MotdReader { seen: Mutex::new(Vec::new()) });
    bus.register(Arc::clone(&second)).unwrap();
    assert_eq!(seen(&second), ["hello"]);

    bus.remove_sticky::<Motd>().unwrap();
    let third = Arc::new(MotdReader { seen: Mutex::new(Vec::new()) });
    bus.register(Arc::clone(&third)).unwrap();
    assert!(seen(&third).is_empty());
}

#[test]
fn registering_before_the_post_delivers_through_the_ordinary_path() {
    let bus = EventBus::new();
    let reader = Arc::new(MotdReader { seen: Mutex::new(Vec::new()) });
    bus.register(Arc::clone(&reader)).unwrap();

    bus.post_sticky(Motd("early".into()));

    assert_eq!(seen(&reader), ["early"]);
}

#[test]
fn latest_sticky_event_wins() {
    let bus = EventBus::new();
    bus.post_sticky(Motd("stale".into()));
    bus.post_sticky(Motd("fresh".into()));

    let reader = Arc::new(MotdReader { seen: Mutex::new(Vec::new()) });
    bus.register(Arc::clone(&reader)).unwrap();

    assert_eq!(seen(&reader), ["fresh"]);
    assert_eq!(bus.sticky_event::<Motd>().unwrap().0, "fresh");
}

#[test]
fn sticky_accessors_and_removal() {
    let bus = EventBus::new();
    assert!(bus.sticky_event::<Motd>().is_none());

    bus.post_sticky(Motd("kept".into()));
    assert_eq!(bus.sticky_event::<Motd>().unwrap().0, "kept");

    // Equality-gated removal leaves a non-matching event in place.
    assert!(!bus.remove_sticky_event(&Motd("other".into())));
    assert!(bus.sticky_event::<Motd>().is_some());
    assert!(bus.remove_sticky_event(&Motd("kept".into())));
    assert!(bus.sticky_event::<Motd>().is_none());

    bus.post_sticky(Motd("again".into()));
    bus.remove_all_sticky();
    assert!(bus.sticky_event::<Motd>().is_none());
}

#[test]
fn removed_sticky_is_returned() {
    let bus = EventBus::new();
    bus.post_sticky(Motd("take me".into()));
    let removed = bus.remove_sticky::<Motd>().unwrap();
    assert_eq!(removed.0, "take me");
    assert!(bus.remove_sticky::<Motd>().is_none());
}

// ---- Inheritance-aware replay ----

struct Announcement {
    text: String,
}
struct Banner {
    base: Announcement,
}
event_type!(Announcement);
event_type!(Banner extends Announcement { base });

struct AnnouncementReader {
    seen: Mutex<Vec<String>>,
}
impl AnnouncementReader {
    fn on_announcement(&self, event: &Announcement) {
        self.seen.lock().unwrap().push(event.text.clone());
    }
}
subscriber_info! {
    AnnouncementReader;
    #[handle(sticky)]
    on_announcement => Announcement;
}

#[test]
fn sticky_replay_matches_supertype_handlers() {
    let bus = EventBus::new();
    bus.post_sticky(Banner { base: Announcement { text: "wide".into() } });

    let reader = Arc::new(AnnouncementReader { seen: Mutex::new(Vec::new()) });
    bus.register(Arc::clone(&reader)).unwrap();

    assert_eq!(reader.seen.lock().unwrap().clone(), ["wide"]);
}

#[test]
fn exact_type_replay_only_without_inheritance() {
    let bus = EventBus::builder().event_inheritance(false).build();
    bus.post_sticky(Banner { base: Announcement { text: "narrow".into() } });

    let reader = Arc::new(AnnouncementReader { seen: Mutex::new(Vec::new()) });
    bus.register(Arc::clone(&reader)).unwrap();

    assert!(reader.seen.lock().unwrap().is_empty());
}

// ---- Replay bypasses the posting pipeline ----

struct Pinned(u8);
event_type!(Pinned);

struct ReplayCanceler {
    bus: EventBus,
    outcome: Mutex<Option<Result<(), EventBusError>>>,
    replays: AtomicUsize,
}
impl ReplayCanceler {
    fn on_pinned(&self, event: &Pinned) {
        self.replays.fetch_add(event.0 as usize, Ordering::SeqCst);
        *self.outcome.lock().unwrap() = Some(self.bus.cancel_event_delivery(event));
    }
}
subscriber_info! {
    ReplayCanceler;
    #[handle(sticky)]
    on_pinned => Pinned;
}

#[test]
fn replayed_sticky_event_cannot_be_canceled() {
    let bus = EventBus::new();
    bus.post_sticky(Pinned(1));

    let canceler = Arc::new(ReplayCanceler {
        bus: bus.clone(),
        outcome: Mutex::new(None),
        replays: AtomicUsize::new(0),
    });
    bus.register(Arc::clone(&canceler)).unwrap();

    assert_eq!(canceler.replays.load(Ordering::SeqCst), 1);
    let outcome = canceler.outcome.lock().unwrap().take().unwrap();
    assert!(matches!(outcome, Err(EventBusError::NotPosting)));
}
