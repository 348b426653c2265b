//! Generic traversal of weak lists.
//!
//! A weak list is a chain of heap objects whose links do not keep their
//! members alive. [`WeakListPass::visit_weak_list`] rebuilds such a chain out
//! of the members the retainer keeps, [`clear_weak_list`] takes a chain
//! apart when its owner is dead.
//!
//! Both walks read a node's link before anything else happens to the node:
//! the retainer may move a survivor, and a discarded node may be reclaimed
//! and its slot reused as soon as the list lets go of it.

use crate::heap::{HeapObject, HeapRef, Link, ObjectRef};
use crate::retainer::WeakObjectRetainer;
use crate::slots::{FieldId, SlotRecorder};

mod visitors;


/// Upper bound on list length before a walk is assumed to be cycling.
pub const DEFAULT_MAX_WEAK_LIST_LENGTH: usize = 1 << 24;

/// The collection phase a weak-list pass runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcPhase {
    /// Young generation collection.
    Scavenge,
    /// Full collection that does not move old objects.
    MarkSweep,
    /// Full collection that may move objects.
    MarkCompact,
}

impl GcPhase {
    /// Slot writes must be recorded only while objects may move.
    pub const fn must_record_slots(self) -> bool {
        matches!(self, Self::MarkCompact)
    }

    /// Old objects are traced only by full collections.
    pub const fn is_full_gc(self) -> bool {
        matches!(self, Self::MarkSweep | Self::MarkCompact)
    }
}

/// Per-kind policy for weak lists of `Self`.
pub trait WeakListVisitor: HeapObject {
    /// The next member after `node`, read without touching liveness.
    fn weak_next(node: HeapRef<Self>) -> Link<Self>;

    /// Overwrites the link of `node`. The store is weak and never recorded.
    fn set_weak_next(node: HeapRef<Self>, next: Link<Self>);

    /// The object whose storage holds the link of `node`.
    fn weak_next_holder(node: HeapRef<Self>) -> ObjectRef;

    /// The field of the holder that stores the link.
    fn weak_next_field() -> FieldId;

    /// Runs after `node` has been kept and relinked.
    fn visit_live_object(_node: HeapRef<Self>, _pass: &mut WeakListPass<'_>) {}

    /// Runs after `node` has been dropped from its list, before it may be
    /// reclaimed.
    fn visit_phantom_object(_node: HeapRef<Self>) {}
}

/// Everything one collection phase needs to trace weak lists.
pub struct WeakListPass<'a> {
    phase: GcPhase,
    retainer: &'a mut dyn WeakObjectRetainer,
    recorder: &'a mut dyn SlotRecorder,
    max_length: usize,
}

impl<'a> WeakListPass<'a> {
    pub fn new(
        phase: GcPhase,
        retainer: &'a mut dyn WeakObjectRetainer,
        recorder: &'a mut dyn SlotRecorder,
    ) -> Self {
        Self {
            phase,
            retainer,
            recorder,
            max_length: DEFAULT_MAX_WEAK_LIST_LENGTH,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn phase(&self) -> GcPhase {
        self.phase
    }

    pub fn must_record_slots(&self) -> bool {
        self.phase.must_record_slots()
    }

    /// Records a slot write, if this pass records slots at all.
    pub fn record_slot(&mut self, owner: ObjectRef, field: FieldId, value: Option<ObjectRef>) {
        if self.must_record_slots() {
            self.recorder.record_slot(owner, field, value);
        }
    }

    /// Drops the members of `list` the retainer does not keep and returns the
    /// new head. Survivors keep their relative order.
    pub fn visit_weak_list<T: WeakListVisitor>(&mut self, list: Link<T>) -> Link<T> {
        let record_slots = self.must_record_slots();
        let mut head: Link<T> = None;
        let mut tail: Link<T> = None;
        let mut cursor = list;
        let (mut retained, mut discarded) = (0usize, 0usize);

        while let Some(candidate) = cursor {
            debug_assert!(
                retained + discarded < self.max_length,
                "weak list of {:?} longer than {}, is it cyclic?",
                T::KIND,
                self.max_length
            );
            // the candidate may move or die below, so step past it first
            cursor = T::weak_next(candidate);

            match self.retainer.retain_as(candidate.erase()) {
                Some(object) => {
                    let survivor = HeapRef::<T>::cast(object);
                    match tail {
                        None => head = Some(survivor),
                        Some(prev) => {
                            T::set_weak_next(prev, Some(survivor));
                            if record_slots {
                                self.recorder.record_slot(
                                    T::weak_next_holder(prev),
                                    T::weak_next_field(),
                                    Some(object),
                                );
                            }
                        }
                    }
                    tail = Some(survivor);
                    retained += 1;
                    T::visit_live_object(survivor, self);
                }
                None => {
                    T::visit_phantom_object(candidate);
                    discarded += 1;
                    self.retainer.discarded(candidate.erase());
                }
            }
        }

        if let Some(tail) = tail {
            T::set_weak_next(tail, None);
        }

        tracing::trace!(
            kind = ?T::KIND,
            phase = ?self.phase,
            retained,
            discarded,
            "visited weak list"
        );
        head
    }
}

/// Unlinks every member of `list` without asking anyone about liveness.
///
/// Used when the owner of `list` is dead: nothing reachable only through it
/// may look linked afterwards. No slots are recorded, the links lead nowhere
/// the compactor cares about.
pub fn clear_weak_list<T: WeakListVisitor>(list: Link<T>) {
    let mut cursor = list;
    let mut cleared = 0usize;
    while let Some(candidate) = cursor {
        debug_assert!(
            cleared < DEFAULT_MAX_WEAK_LIST_LENGTH,
            "weak list of {:?} is cyclic",
            T::KIND
        );
        cursor = T::weak_next(candidate);
        T::set_weak_next(candidate, None);
        cleared += 1;
    }
    if cleared > 0 {
        tracing::trace!(kind = ?T::KIND, cleared, "cleared weak list");
    }
}

/// Iterates the members of `list` in order.
///
/// The list must not be modified while iterating.
pub fn iter_weak_list<T: WeakListVisitor>(list: Link<T>) -> impl Iterator<Item = HeapRef<T>> {
    core::iter::successors(list, |&node| T::weak_next(node))
}
