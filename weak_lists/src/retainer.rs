//! Liveness policies consulted while tracing weak lists.
//!
//! The traversal never decides liveness itself. For every node it asks a
//! [`WeakObjectRetainer`], which answers with the node's (possibly new)
//! address or `None` for a dead node.

use hashbrown::{HashMap, HashSet};
use rustc_hash::FxBuildHasher;

use crate::heap::{Heap, HeapRef, ObjectKind, ObjectRef};
use crate::objects::Code;

/// Decides which weak-list members survive the current pass.
pub trait WeakObjectRetainer {
    /// Returns where `object` lives after this pass, or `None` if it is dead.
    fn retain_as(&mut self, object: ObjectRef) -> Option<ObjectRef>;

    /// Called once a dead `object` has been unlinked and its kind hooks have
    /// run. The list no longer refers to it, so it may be reclaimed here.
    fn discarded(&mut self, _object: ObjectRef) {}
}

impl<F> WeakObjectRetainer for F
where
    F: FnMut(ObjectRef) -> Option<ObjectRef>,
{
    fn retain_as(&mut self, object: ObjectRef) -> Option<ObjectRef> {
        self(object)
    }
}

/// Keeps exactly the marked objects, in place.
#[derive(Debug, Default)]
pub struct MarkedObjectRetainer {
    marked: HashSet<ObjectRef, FxBuildHasher>,
}

impl MarkedObjectRetainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, object: ObjectRef) -> bool {
        self.marked.insert(object)
    }

    pub fn is_marked(&self, object: ObjectRef) -> bool {
        self.marked.contains(&object)
    }
}

impl Extend<ObjectRef> for MarkedObjectRetainer {
    fn extend<I: IntoIterator<Item = ObjectRef>>(&mut self, iter: I) {
        self.marked.extend(iter);
    }
}

impl WeakObjectRetainer for MarkedObjectRetainer {
    fn retain_as(&mut self, object: ObjectRef) -> Option<ObjectRef> {
        self.is_marked(object).then_some(object)
    }
}

/// Keeps the marked objects by evacuating them to fresh slots, and reclaims
/// dead ones as soon as their list has let go of them.
///
/// This is what a compacting pass looks like to a weak list: every survivor
/// comes back at a new address and every dead slot is recycled.
#[derive(Debug)]
pub struct EvacuatingRetainer<'heap> {
    heap: &'heap Heap,
    marked: HashSet<ObjectRef, FxBuildHasher>,
    forwarding: HashMap<ObjectRef, ObjectRef, FxBuildHasher>,
    reclaimed: usize,
}

impl<'heap> EvacuatingRetainer<'heap> {
    pub fn new(heap: &'heap Heap) -> Self {
        Self {
            heap,
            marked: HashSet::default(),
            forwarding: HashMap::default(),
            reclaimed: 0,
        }
    }

    pub fn mark(&mut self, object: ObjectRef) -> bool {
        self.marked.insert(object)
    }

    /// The new address of an object moved by this retainer.
    pub fn forwarding_address(&self, object: ObjectRef) -> Option<ObjectRef> {
        self.forwarding.get(&object).copied()
    }

    pub fn evacuated(&self) -> usize {
        self.forwarding.len()
    }

    pub fn reclaimed(&self) -> usize {
        self.reclaimed
    }
}

impl Extend<ObjectRef> for EvacuatingRetainer<'_> {
    fn extend<I: IntoIterator<Item = ObjectRef>>(&mut self, iter: I) {
        self.marked.extend(iter);
    }
}

impl WeakObjectRetainer for EvacuatingRetainer<'_> {
    fn retain_as(&mut self, object: ObjectRef) -> Option<ObjectRef> {
        if let Some(&moved) = self.forwarding.get(&object) {
            return Some(moved);
        }
        if !self.marked.contains(&object) {
            return None;
        }
        debug_assert!(
            self.heap.contains(object),
            "marked object {object:?} is not in the heap"
        );
        match self.heap.evacuate_object(object) {
            Ok(moved) => {
                self.forwarding.insert(object, moved);
                Some(moved)
            }
            Err(err) => {
                tracing::warn!(?object, %err, "evacuation failed, keeping object in place");
                Some(object)
            }
        }
    }

    fn discarded(&mut self, object: ObjectRef) {
        debug_assert!(
            self.heap.contains(object),
            "discarded object {object:?} was already reclaimed"
        );
        // a code entry owns its data container
        if object.kind() == ObjectKind::Code {
            let container = HeapRef::<Code>::cast(object).get().code_data_container();
            self.heap.reclaim(container.erase());
        }
        self.heap.reclaim(object);
        self.reclaimed += 1;
    }
}

#[cfg(test)]
mod tests {
    use rust_alloc::vec::Vec;

    use super::{EvacuatingRetainer, MarkedObjectRetainer, WeakObjectRetainer};
    use crate::heap::Heap;
    use crate::slots::SlotsBuffer;
    use crate::weak_list::{GcPhase, WeakListPass};

    #[test]
    fn marked_objects_stay_in_place() {
        let heap = Heap::default();
        let (live, dead) = (
            heap.alloc_allocation_site().unwrap(),
            heap.alloc_allocation_site().unwrap(),
        );
        let mut retainer = MarkedObjectRetainer::new();
        assert!(retainer.mark(live.erase()));
        assert!(!retainer.mark(live.erase()));

        assert_eq!(retainer.retain_as(live.erase()), Some(live.erase()));
        assert_eq!(retainer.retain_as(dead.erase()), None);
    }

    #[test]
    fn evacuation_happens_once_per_object() {
        let heap = Heap::default();
        let site = heap.alloc_allocation_site().unwrap();
        let mut retainer = EvacuatingRetainer::new(&heap);
        retainer.mark(site.erase());

        let moved = retainer.retain_as(site.erase()).unwrap();
        assert_ne!(moved, site.erase());
        assert_eq!(retainer.retain_as(site.erase()), Some(moved));
        assert_eq!(retainer.evacuated(), 1);
        assert_eq!(heap.live_objects(), 1);
    }

    #[test]
    fn discarded_objects_are_reclaimed() {
        let heap = Heap::default();
        let site = heap.alloc_allocation_site().unwrap();
        let mut retainer = EvacuatingRetainer::new(&heap);

        assert_eq!(retainer.retain_as(site.erase()), None);
        retainer.discarded(site.erase());

        assert!(!heap.contains(site.erase()));
        assert_eq!(retainer.reclaimed(), 1);
    }

    #[test]
    fn discarded_code_takes_its_container_along() {
        let heap = Heap::default();
        let codes: Vec<_> = (0..3).map(|_| heap.alloc_code().unwrap()).collect();
        for pair in codes.windows(2) {
            pair[0].get().set_next_code_link(Some(pair[1]));
        }
        let head = codes.first().copied();

        let mut retainer = EvacuatingRetainer::new(&heap);
        let mut slots = SlotsBuffer::new();
        let head = WeakListPass::new(GcPhase::MarkCompact, &mut retainer, &mut slots)
            .visit_weak_list(head);

        assert_eq!(head, None);
        assert_eq!(retainer.reclaimed(), 3);
        assert_eq!(heap.live_objects(), 0);
    }
}
