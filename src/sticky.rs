//! # Sticky event store.
//!
//! Retains the most recent event of each type for replay to sticky
//! handlers at registration time. At most one event per type; a newer
//! post of the same type replaces the older one. Entries are never
//! removed by replay, only by the explicit remove operations.
//!
//! The store has its own lock, independent of the registry lock.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::Event;

#[derive(Default)]
pub(crate) struct StickyStore {
    events: Mutex<HashMap<TypeId, Arc<dyn Event>>>,
}

impl StickyStore {
    /// Stores the event under its concrete type, replacing any previous
    /// event of that type.
    pub(crate) fn put(&self, event: Arc<dyn Event>) {
        let id = event.event_type().id();
        self.events.lock().insert(id, event);
    }

    pub(crate) fn get(&self, event_id: TypeId) -> Option<Arc<dyn Event>> {
        self.events.lock().get(&event_id).cloned()
    }

    pub(crate) fn remove(&self, event_id: TypeId) -> Option<Arc<dyn Event>> {
        self.events.lock().remove(&event_id)
    }

    /// Removes the stored event of `E`'s type iff it equals `event`.
    pub(crate) fn remove_if_equal<E: Event + PartialEq>(&self, event: &E) -> bool {
        let mut events = self.events.lock();
        let id = TypeId::of::<E>();
        let matches = events
            .get(&id)
            .and_then(|stored| stored.as_any().downcast_ref::<E>())
            .is_some_and(|stored| stored == event);
        if matches {
            events.remove(&id);
        }
        matches
    }

    pub(crate) fn clear(&self) {
        self.events.lock().clear();
    }

    /// Snapshot of all entries, for inheritance-aware replay.
    pub(crate) fn entries(&self) -> Vec<Arc<dyn Event>> {
        self.events.lock().values().cloned().collect()
    }
}
