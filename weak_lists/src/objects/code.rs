use core::cell::Cell;

use crate::heap::{HeapObject, HeapRef, Link, ObjectKind};
use crate::slots::FieldId;

const MARKED_FOR_DEOPTIMIZATION: u32 = 1 << 0;

/// Mutable side data of a [`Code`] entry.
///
/// Code entries themselves are immutable once published, so the link that
/// chains them into their context's code lists is kept here.
#[derive(Debug)]
#[repr(C)]
pub struct CodeDataContainer {
    next_code_link: Cell<Link<Code>>,
    kind_specific_flags: Cell<u32>,
}

impl CodeDataContainer {
    pub const NEXT_CODE_LINK: FieldId = FieldId::new("next_code_link");

    pub(crate) fn new() -> Self {
        Self {
            next_code_link: Cell::new(None),
            kind_specific_flags: Cell::new(0),
        }
    }

    pub fn next_code_link(&self) -> Link<Code> {
        self.next_code_link.get()
    }

    pub fn set_next_code_link(&self, next: Link<Code>) {
        self.next_code_link.set(next);
    }

    pub fn kind_specific_flags(&self) -> u32 {
        self.kind_specific_flags.get()
    }

    pub fn set_kind_specific_flags(&self, flags: u32) {
        self.kind_specific_flags.set(flags);
    }
}

impl HeapObject for CodeDataContainer {
    const KIND: ObjectKind = ObjectKind::CodeDataContainer;
}

/// An executable code entry.
#[derive(Debug)]
#[repr(C)]
pub struct Code {
    data_container: HeapRef<CodeDataContainer>,
}

impl Code {
    pub(crate) fn new(data_container: HeapRef<CodeDataContainer>) -> Self {
        Self { data_container }
    }

    pub fn code_data_container(&self) -> HeapRef<CodeDataContainer> {
        self.data_container
    }

    pub fn next_code_link(&self) -> Link<Code> {
        self.data_container.get().next_code_link()
    }

    pub fn set_next_code_link(&self, next: Link<Code>) {
        self.data_container.get().set_next_code_link(next);
    }

    pub fn marked_for_deoptimization(&self) -> bool {
        self.data_container.get().kind_specific_flags() & MARKED_FOR_DEOPTIMIZATION != 0
    }

    pub fn set_marked_for_deoptimization(&self, marked: bool) {
        let container = self.data_container.get();
        let flags = container.kind_specific_flags();
        container.set_kind_specific_flags(if marked {
            flags | MARKED_FOR_DEOPTIMIZATION
        } else {
            flags & !MARKED_FOR_DEOPTIMIZATION
        });
    }
}

impl HeapObject for Code {
    const KIND: ObjectKind = ObjectKind::Code;
}
