//! Slot recording for the compactor.
//!
//! While a compacting pass is running, every pointer written into a heap
//! object has to be remembered so the compactor can rewrite it once objects
//! have moved. A slot is named by its owner and a logical field, never by a
//! raw address.

use core::cell::Cell;
use core::fmt;

use rust_alloc::vec::Vec;

use crate::heap::{HeapObject, HeapRef, Link, ObjectRef};

/// Logical identity of a pointer field.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(&'static str);

impl FieldId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Sink for slots that need fixing up after compaction.
pub trait SlotRecorder {
    /// Remember that `field` of `owner` now holds `value`.
    fn record_slot(&mut self, owner: ObjectRef, field: FieldId, value: Option<ObjectRef>);
}

/// One recorded slot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedSlot {
    pub owner: ObjectRef,
    pub field: FieldId,
    pub value: Option<ObjectRef>,
}

/// Append-only [`SlotRecorder`] handing its entries to the compactor in
/// recording order.
#[derive(Debug, Default)]
pub struct SlotsBuffer {
    slots: Vec<RecordedSlot>,
}

impl SlotsBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn as_slice(&self) -> &[RecordedSlot] {
        &self.slots
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordedSlot> {
        self.slots.iter()
    }

    /// Slots recorded for `owner`, in recording order.
    pub fn slots_of(&self, owner: ObjectRef) -> impl Iterator<Item = &RecordedSlot> {
        self.slots.iter().filter(move |slot| slot.owner == owner)
    }

    /// Hands every recorded slot over, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<RecordedSlot> {
        core::mem::take(&mut self.slots)
    }
}

impl SlotRecorder for SlotsBuffer {
    fn record_slot(&mut self, owner: ObjectRef, field: FieldId, value: Option<ObjectRef>) {
        self.slots.push(RecordedSlot {
            owner,
            field,
            value,
        });
    }
}

/// A field that can hold a weak reference.
pub trait WeakSlot {
    fn load(&self) -> Option<ObjectRef>;
}

impl<T: HeapObject> WeakSlot for Cell<Link<T>> {
    fn load(&self) -> Option<ObjectRef> {
        self.get().map(HeapRef::erase)
    }
}

/// Objects with a fixed range of weak fields that must be recorded when the
/// object survives a compacting pass.
///
/// Usually derived: `#[derive(WeakSlots)]` walks the fields tagged
/// `#[weak_slot]` in declaration order.
pub trait WeakSlots: HeapObject {
    fn for_each_weak_slot(&self, visitor: &mut dyn FnMut(FieldId, Option<ObjectRef>));
}

#[cfg(test)]
mod tests {
    use rust_alloc::vec::Vec;

    use super::{SlotRecorder, SlotsBuffer};
    use crate::heap::Heap;
    use crate::objects::{AllocationSite, Context};

    #[test]
    fn slots_are_kept_in_recording_order() {
        let heap = Heap::default();
        let (a, b) = (
            heap.alloc_allocation_site().unwrap(),
            heap.alloc_allocation_site().unwrap(),
        );
        let context = heap.alloc_context().unwrap();

        let mut buffer = SlotsBuffer::new();
        buffer.record_slot(a.erase(), AllocationSite::WEAK_NEXT, Some(b.erase()));
        buffer.record_slot(context.erase(), Context::NEXT_CONTEXT_LINK, None);
        buffer.record_slot(b.erase(), AllocationSite::WEAK_NEXT, None);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.slots_of(a.erase()).count(), 1);
        let fields: Vec<_> = buffer.iter().map(|slot| slot.field.name()).collect();
        assert_eq!(fields, ["weak_next", "next_context_link", "weak_next"]);
    }

    #[test]
    fn take_empties_the_buffer() {
        let heap = Heap::default();
        let site = heap.alloc_allocation_site().unwrap();
        let mut buffer = SlotsBuffer::new();
        buffer.record_slot(site.erase(), AllocationSite::WEAK_NEXT, None);

        let taken = buffer.take();

        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].owner, site.erase());
        assert!(buffer.is_empty());
    }
}
