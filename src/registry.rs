//! # Subscription registry.
//!
//! Holds the live bindings between subscribers and their handlers:
//! - `by_event_type`: per event type, the priority-ordered subscription
//!   list consulted at dispatch;
//! - `by_subscriber`: reverse index from subscriber identity to the event
//!   types it subscribed, used by unregister.
//!
//! ## Locking discipline
//! The whole registry sits behind one bus-wide mutex, held only for
//! add/remove and for taking a snapshot reference. Lists are
//! copy-on-write: every mutation builds a fresh `Vec` and swaps the
//! `Arc`, so a snapshot taken before a mutation iterates the old list
//! undisturbed, outside any lock.
//!
//! ## Rules
//! - A (subscriber, handler) pair appears at most once; re-adding fails.
//! - Insertion keeps lists sorted by priority descending and is stable:
//!   an equal-priority newcomer lands after the existing entries.
//! - Removal flips the subscription's `active` flag before the entry is
//!   dropped, which is what late queued deliveries check.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::EventBusError;
use crate::handler::HandlerDescriptor;
use crate::subscriber::Subscriber;

/// Live binding of one handler on one registered subscriber.
pub struct Subscription {
    subscriber: Arc<dyn Subscriber>,
    descriptor: HandlerDescriptor,
    /// True from registration until the entry leaves the registry.
    /// Checked right before a queued delivery invokes the handler.
    active: AtomicBool,
}

impl Subscription {
    fn new(subscriber: Arc<dyn Subscriber>, descriptor: HandlerDescriptor) -> Self {
        Self { subscriber, descriptor, active: AtomicBool::new(true) }
    }

    /// The registered subscriber object.
    pub fn subscriber(&self) -> &Arc<dyn Subscriber> {
        &self.subscriber
    }

    /// The handler this subscription binds.
    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn retire(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub(crate) fn subscriber_id(&self) -> usize {
        subscriber_id(&self.subscriber)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Subscription({}, active={})",
            self.descriptor.signature(),
            self.is_active()
        )
    }
}

/// Identity of a registered subscriber: the `Arc` data pointer.
pub(crate) fn subscriber_id(subscriber: &Arc<dyn Subscriber>) -> usize {
    Arc::as_ptr(subscriber) as *const () as usize
}

pub(crate) type SubscriptionList = Arc<Vec<Arc<Subscription>>>;

#[derive(Default)]
pub(crate) struct Registry {
    by_event_type: HashMap<TypeId, SubscriptionList>,
    by_subscriber: HashMap<usize, Vec<TypeId>>,
}

impl Registry {
    /// Inserts one subscription at its priority position. Fails when the
    /// (subscriber, handler) pair is already present.
    pub(crate) fn add(
        &mut self,
        subscriber: &Arc<dyn Subscriber>,
        descriptor: HandlerDescriptor,
    ) -> Result<Arc<Subscription>, EventBusError> {
        let event_id = descriptor.event_info().id();
        let id = subscriber_id(subscriber);
        let list = self.by_event_type.entry(event_id).or_default();

        let duplicate = list.iter().any(|existing| {
            existing.subscriber_id() == id && existing.descriptor == descriptor
        });
        if duplicate {
            return Err(EventBusError::AlreadyRegistered {
                subscriber_type: subscriber.subscriber_info().subscriber_type,
                event_type: descriptor.event_info().name,
            });
        }

        let subscription = Arc::new(Subscription::new(Arc::clone(subscriber), descriptor));
        let position = list
            .iter()
            .position(|existing| existing.descriptor.priority() < subscription.descriptor.priority())
            .unwrap_or(list.len());

        let mut next = Vec::with_capacity(list.len() + 1);
        next.extend(list.iter().cloned());
        next.insert(position, Arc::clone(&subscription));
        *list = Arc::new(next);

        self.by_subscriber.entry(id).or_default().push(event_id);
        Ok(subscription)
    }

    /// Removes every subscription of the given subscriber, retiring each
    /// removed entry. Returns false when the subscriber was unknown.
    pub(crate) fn remove_all_for(&mut self, id: usize) -> bool {
        let Some(event_types) = self.by_subscriber.remove(&id) else {
            return false;
        };
        for event_id in event_types {
            let Some(list) = self.by_event_type.get_mut(&event_id) else {
                continue;
            };
            if !list.iter().any(|s| s.subscriber_id() == id) {
                continue;
            }
            let mut next = Vec::with_capacity(list.len());
            for subscription in list.iter() {
                if subscription.subscriber_id() == id {
                    subscription.retire();
                } else {
                    next.push(Arc::clone(subscription));
                }
            }
            *list = Arc::new(next);
        }
        true
    }

    /// Snapshot reference safe for unsynchronized iteration.
    pub(crate) fn snapshot(&self, event_id: TypeId) -> Option<SubscriptionList> {
        self.by_event_type.get(&event_id).cloned()
    }

    pub(crate) fn is_registered(&self, id: usize) -> bool {
        self.by_subscriber.contains_key(&id)
    }
}
