use core::cell::Cell;

use crate::heap::{HeapObject, Link, ObjectKind};
use crate::slots::FieldId;

/// Allocation feedback for one allocation site in the program.
///
/// Every site is chained into the heap's allocation-site list through
/// `weak_next`.
#[derive(Debug)]
#[repr(C)]
pub struct AllocationSite {
    weak_next: Cell<Link<AllocationSite>>,
    memento_found_count: Cell<u32>,
}

impl AllocationSite {
    pub const WEAK_NEXT: FieldId = FieldId::new("weak_next");

    pub(crate) fn new() -> Self {
        Self {
            weak_next: Cell::new(None),
            memento_found_count: Cell::new(0),
        }
    }

    pub fn weak_next(&self) -> Link<AllocationSite> {
        self.weak_next.get()
    }

    pub fn set_weak_next(&self, next: Link<AllocationSite>) {
        self.weak_next.set(next);
    }

    pub fn memento_found_count(&self) -> u32 {
        self.memento_found_count.get()
    }

    pub fn increment_memento_found_count(&self) -> u32 {
        let count = self.memento_found_count.get().saturating_add(1);
        self.memento_found_count.set(count);
        count
    }
}

impl HeapObject for AllocationSite {
    const KIND: ObjectKind = ObjectKind::AllocationSite;
}
