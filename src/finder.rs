//! # Handler discovery.
//!
//! Walks a subscriber type's handler table chain (the type itself, then
//! each declared supertype) and produces the deduplicated, cached list of
//! [`HandlerDescriptor`]s used by registration.
//!
//! ## Rules
//! - External [`SubscriberInfoIndex`] providers are consulted before a
//!   type's own table at every level, in the order they were added.
//! - A `(method, event type)` pair is kept only for the most derived type
//!   declaring it; a child overriding a parent handler wins.
//! - The walk stops at the first supertype whose name falls in a system
//!   namespace.
//! - A subscriber whose whole chain yields no handlers is a registration
//!   error, surfaced as `NoHandlers`.
//!
//! Dedup runs in two levels, the cheap one first: a per-event-type slot
//! that only degrades to full signature matching once a second handler
//! shows up for the same event type. Scratch state is pooled (at most
//! four instances) and recycled between scans.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::EventBusError;
use crate::event::Projection;
use crate::handler::{HandlerDef, HandlerDescriptor};
use crate::subscriber::{SubscriberInfo, SubscriberInfoIndex};

const FIND_STATE_POOL_SIZE: usize = 4;

/// Supertype names with these prefixes end the walk.
const SYSTEM_PREFIXES: &[&str] = &["std::", "core::", "alloc::", "tokio::"];

/// Per-bus handler discovery with a per-type cache.
pub(crate) struct HandlerFinder {
    cache: DashMap<TypeId, Arc<Vec<HandlerDescriptor>>>,
    indexes: Vec<Arc<dyn SubscriberInfoIndex>>,
    strict_verification: bool,
    ignore_indexes: bool,
    state_pool: Mutex<Vec<FindState>>,
}

impl HandlerFinder {
    pub(crate) fn new(
        indexes: Vec<Arc<dyn SubscriberInfoIndex>>,
        strict_verification: bool,
        ignore_indexes: bool,
    ) -> Self {
        Self {
            cache: DashMap::new(),
            indexes,
            strict_verification,
            ignore_indexes,
            state_pool: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn index_count(&self) -> usize {
        self.indexes.len()
    }

    /// Returns the handler descriptors of the given subscriber type,
    /// scanning and caching on first use.
    pub(crate) fn find(
        &self,
        root: &'static SubscriberInfo,
    ) -> Result<Arc<Vec<HandlerDescriptor>>, EventBusError> {
        if let Some(hit) = self.cache.get(&root.id()) {
            return Ok(Arc::clone(hit.value()));
        }

        let mut state = self.obtain_state();
        state.init(root);
        let scanned = self.scan(&mut state);
        let found = state.take_found();
        self.release_state(state);
        scanned?;

        if found.is_empty() {
            return Err(EventBusError::NoHandlers { subscriber_type: root.subscriber_type });
        }
        let descriptors = Arc::new(found);
        self.cache.insert(root.id(), Arc::clone(&descriptors));
        Ok(descriptors)
    }

    fn scan(&self, state: &mut FindState) -> Result<(), EventBusError> {
        while let Some(level) = state.current {
            let table = self.level_info(level);
            for def in table.handlers {
                if def.name.is_empty() {
                    if self.strict_verification {
                        return Err(EventBusError::IllegalHandler {
                            subscriber_type: table.subscriber_type,
                            method: def.name,
                            reason: "handler method name is empty",
                        });
                    }
                    continue;
                }
                if state.check_add(def, table) {
                    let path: Arc<[Projection]> = state.receiver_path.clone().into();
                    state.found.push(HandlerDescriptor::new(def, table, path));
                }
            }
            state.move_to_superclass();
        }
        Ok(())
    }

    /// The table actually used at one chain level: an index hit, or the
    /// level's own declared table.
    fn level_info(&self, level: &'static SubscriberInfo) -> &'static SubscriberInfo {
        if !self.ignore_indexes {
            for index in &self.indexes {
                if let Some(info) = index.subscriber_info(level.id()) {
                    return info;
                }
            }
        }
        level
    }

    fn obtain_state(&self) -> FindState {
        self.state_pool.lock().pop().unwrap_or_default()
    }

    fn release_state(&self, mut state: FindState) {
        state.recycle();
        let mut pool = self.state_pool.lock();
        if pool.len() < FIND_STATE_POOL_SIZE {
            pool.push(state);
        }
    }
}

/// Per-event-type dedup slot.
#[derive(Clone, Copy)]
enum Seen {
    Single(&'static HandlerDef, &'static SubscriberInfo),
    Multiple,
}

/// Reusable scratch state for one scan.
#[derive(Default)]
struct FindState {
    found: Vec<HandlerDescriptor>,
    any_by_event: HashMap<TypeId, Seen>,
    declaring_by_signature: HashMap<String, &'static str>,
    receiver_path: Vec<Projection>,
    current: Option<&'static SubscriberInfo>,
}

impl FindState {
    fn init(&mut self, root: &'static SubscriberInfo) {
        self.current = Some(root);
    }

    fn recycle(&mut self) {
        self.found.clear();
        self.any_by_event.clear();
        self.declaring_by_signature.clear();
        self.receiver_path.clear();
        self.current = None;
    }

    fn take_found(&mut self) -> Vec<HandlerDescriptor> {
        std::mem::take(&mut self.found)
    }

    /// Two-level check: cheap per-event-type slot first, full signature
    /// matching only once an event type has competing handlers.
    fn check_add(&mut self, def: &'static HandlerDef, declaring: &'static SubscriberInfo) -> bool {
        let event_id = def.event_info().id();
        match self.any_by_event.insert(event_id, Seen::Single(def, declaring)) {
            None => true,
            Some(Seen::Single(prev_def, prev_declaring)) => {
                let recorded = self.check_add_with_signature(prev_def, prev_declaring);
                debug_assert!(recorded, "fast-path handler missing from signature map");
                self.any_by_event.insert(event_id, Seen::Multiple);
                self.check_add_with_signature(def, declaring)
            }
            Some(Seen::Multiple) => {
                self.any_by_event.insert(event_id, Seen::Multiple);
                self.check_add_with_signature(def, declaring)
            }
        }
    }

    fn check_add_with_signature(
        &mut self,
        def: &'static HandlerDef,
        declaring: &'static SubscriberInfo,
    ) -> bool {
        let key = format!("{}>{}", def.name, def.event_info().name);
        match self.declaring_by_signature.insert(key.clone(), declaring.subscriber_type) {
            None => true,
            Some(previous) => {
                // The walk runs child to parent, so the recorded
                // occurrence is the more derived one. Restore it.
                self.declaring_by_signature.insert(key, previous);
                false
            }
        }
    }

    fn move_to_superclass(&mut self) {
        let edge = self.current.and_then(|info| info.supertype.as_ref());
        self.current = match edge {
            Some(edge) => {
                let target = (edge.target)();
                if is_system_type(target.subscriber_type) {
                    None
                } else {
                    self.receiver_path.push(edge.project);
                    Some(target)
                }
            }
            None => None,
        };
    }
}

fn is_system_type(name: &str) -> bool {
    SYSTEM_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}
