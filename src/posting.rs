//! # Per-thread posting state.
//!
//! Each (bus, thread) pair owns one [`PostingState`]: the FIFO queue of
//! events posted on that thread, the reentrancy flag that makes nested
//! `post` calls append instead of dispatching, and the slots the
//! cancellation check reads.
//!
//! State lives in a thread-local map keyed by bus id, so independent bus
//! instances never observe each other's reentrancy. All access goes
//! through [`with_state`], which keeps the borrow short: callers must not
//! invoke handlers from inside the closure, since a reentrant `post`
//! borrows the same cell again.

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::event::Event;
use crate::registry::Subscription;

#[derive(Default)]
pub(crate) struct PostingState {
    pub(crate) queue: VecDeque<Arc<dyn Event>>,
    pub(crate) is_posting: bool,
    pub(crate) is_main_thread: bool,
    pub(crate) canceled: bool,
    pub(crate) current_event: Option<Arc<dyn Event>>,
    pub(crate) current_subscription: Option<Arc<Subscription>>,
    /// Address of the view the current handler receives. A supertype
    /// handler sees a projected reference, not the posted allocation, and
    /// the cancellation identity check must accept either.
    pub(crate) current_view: usize,
}

thread_local! {
    static POSTING_STATES: RefCell<HashMap<u64, PostingState>> = RefCell::new(HashMap::new());
}

/// Runs `f` against the calling thread's posting state for the given bus.
pub(crate) fn with_state<R>(bus_id: u64, f: impl FnOnce(&mut PostingState) -> R) -> R {
    POSTING_STATES.with(|states| f(states.borrow_mut().entry(bus_id).or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_scoped_per_bus() {
        with_state(1, |state| state.is_posting = true);
        assert!(with_state(1, |state| state.is_posting));
        assert!(!with_state(2, |state| state.is_posting));
        with_state(1, |state| state.is_posting = false);
    }

    #[test]
    fn queue_is_fifo() {
        struct Note(u32);
        crate::event_type!(Note);

        with_state(3, |state| {
            state.queue.push_back(Arc::new(Note(1)));
            state.queue.push_back(Arc::new(Note(2)));
        });
        let first = with_state(3, |state| state.queue.pop_front()).unwrap();
        let note = first.as_any().downcast_ref::<Note>().unwrap();
        assert_eq!(note.0, 1);
    }
}
