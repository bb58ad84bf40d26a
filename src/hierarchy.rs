//! # Type hierarchy expansion for dispatch.
//!
//! Expands a concrete event type into the ordered list of types its
//! dispatch may reach: the type itself, its interfaces (recursing into
//! super-interfaces, skipping duplicates), then the supertype, repeating
//! until the chain ends. The resulting order is the dispatch order across
//! per-type subscription lists for one posted event.
//!
//! Each entry carries the composed projection path from the concrete type
//! to the entry's type, so delivery can hand every handler a reference of
//! its declared type.
//!
//! The cache is process-wide and append-only: entries are computed once
//! per concrete event type and never mutate after publication.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::{EventTypeInfo, Projection};

/// One reachable type plus the projection path leading to it.
#[derive(Clone)]
pub(crate) struct CachedEventType {
    pub(crate) info: &'static EventTypeInfo,
    pub(crate) path: Arc<[Projection]>,
}

static EVENT_TYPE_CACHE: Mutex<Option<HashMap<TypeId, Arc<Vec<CachedEventType>>>>> =
    Mutex::new(None);

/// Expands `root` into its full dispatch list, memoizing the result.
pub(crate) fn expand(root: &'static EventTypeInfo) -> Arc<Vec<CachedEventType>> {
    let mut guard = EVENT_TYPE_CACHE.lock();
    let cache = guard.get_or_insert_with(HashMap::new);
    if let Some(hit) = cache.get(&root.id()) {
        return Arc::clone(hit);
    }

    let mut list = Vec::new();
    let mut seen = Vec::new();
    let mut current: Option<(&'static EventTypeInfo, Vec<Projection>)> = Some((root, Vec::new()));
    while let Some((info, path)) = current {
        if !seen.contains(&info.id()) {
            seen.push(info.id());
            list.push(CachedEventType { info, path: path.clone().into() });
        }
        add_interfaces(info, &path, &mut list, &mut seen);
        current = info.supertype.as_ref().map(|edge| {
            let mut next = path.clone();
            next.push(edge.project);
            ((edge.target)(), next)
        });
    }

    let entry = Arc::new(list);
    cache.insert(root.id(), Arc::clone(&entry));
    entry
}

/// Recurses through declared interfaces and their super-interfaces.
fn add_interfaces(
    info: &'static EventTypeInfo,
    base_path: &[Projection],
    list: &mut Vec<CachedEventType>,
    seen: &mut Vec<TypeId>,
) {
    for edge in info.interfaces {
        let target = (edge.target)();
        if seen.contains(&target.id()) {
            continue;
        }
        seen.push(target.id());
        let mut path = base_path.to_vec();
        path.push(edge.project);
        list.push(CachedEventType { info: target, path: path.clone().into() });
        add_interfaces(target, &path, list, seen);
    }
}

/// The empty projection path: the concrete type viewed as itself.
pub(crate) fn identity_path() -> Arc<[Projection]> {
    Arc::from(Vec::new())
}

/// Applies a projection path to a type-erased event view.
pub(crate) fn apply<'a>(
    mut view: &'a (dyn Any + Send + Sync),
    path: &[Projection],
) -> &'a (dyn Any + Send + Sync) {
    for project in path {
        view = project(view);
    }
    view
}
