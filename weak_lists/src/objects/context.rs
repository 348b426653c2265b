use core::cell::Cell;

use super::Code;
use crate::WeakSlots;
use crate::heap::{HeapObject, HeapRef, Link, ObjectKind};
use crate::slots::FieldId;

/// Selects one of the two code lists owned by a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeList {
    Optimized,
    Deoptimized,
}

impl CodeList {
    pub const fn field(self) -> FieldId {
        match self {
            Self::Optimized => Context::OPTIMIZED_CODE_LIST,
            Self::Deoptimized => Context::DEOPTIMIZED_CODE_LIST,
        }
    }
}

/// A native execution context.
///
/// Contexts are chained through `next_context_link` and own the weak lists
/// of code optimized for them. The `#[weak_slot]` fields form the context's
/// weak slot range and are recorded, in declaration order, when the context
/// survives a compacting pass.
#[derive(Debug, WeakSlots)]
#[repr(C)]
pub struct Context {
    #[weak_slot]
    optimized_code_list: Cell<Link<Code>>,
    #[weak_slot]
    deoptimized_code_list: Cell<Link<Code>>,
    #[weak_slot]
    next_context_link: Cell<Link<Context>>,
}

impl Context {
    pub const OPTIMIZED_CODE_LIST: FieldId = FieldId::new("optimized_code_list");
    pub const DEOPTIMIZED_CODE_LIST: FieldId = FieldId::new("deoptimized_code_list");
    pub const NEXT_CONTEXT_LINK: FieldId = FieldId::new("next_context_link");

    pub(crate) fn new() -> Self {
        Self {
            optimized_code_list: Cell::new(None),
            deoptimized_code_list: Cell::new(None),
            next_context_link: Cell::new(None),
        }
    }

    pub fn code_list(&self, list: CodeList) -> Link<Code> {
        match list {
            CodeList::Optimized => self.optimized_code_list.get(),
            CodeList::Deoptimized => self.deoptimized_code_list.get(),
        }
    }

    pub fn set_code_list(&self, list: CodeList, head: Link<Code>) {
        match list {
            CodeList::Optimized => self.optimized_code_list.set(head),
            CodeList::Deoptimized => self.deoptimized_code_list.set(head),
        }
    }

    pub fn optimized_code_list(&self) -> Link<Code> {
        self.optimized_code_list.get()
    }

    pub fn set_optimized_code_list(&self, head: Link<Code>) {
        self.optimized_code_list.set(head);
    }

    pub fn deoptimized_code_list(&self) -> Link<Code> {
        self.deoptimized_code_list.get()
    }

    pub fn set_deoptimized_code_list(&self, head: Link<Code>) {
        self.deoptimized_code_list.set(head);
    }

    pub fn next_context_link(&self) -> Link<Context> {
        self.next_context_link.get()
    }

    pub fn set_next_context_link(&self, next: Link<Context>) {
        self.next_context_link.set(next);
    }

    /// Prepends `code` to the optimized code list.
    pub fn add_optimized_code(&self, code: HeapRef<Code>) {
        debug_assert!(
            code.get().next_code_link().is_none(),
            "{code:?} is already linked into a code list"
        );
        code.get().set_next_code_link(self.optimized_code_list());
        self.set_optimized_code_list(Some(code));
    }

    /// Moves every optimized code entry marked for deoptimization to the
    /// front of the deoptimized list. Both lists keep their relative order.
    ///
    /// Returns the number of entries moved.
    pub fn deoptimize_marked_code(&self) -> usize {
        let (mut kept_head, mut kept_tail): (Link<Code>, Link<Code>) = (None, None);
        let (mut marked_head, mut marked_tail): (Link<Code>, Link<Code>) = (None, None);
        let mut moved = 0;

        let mut cursor = self.optimized_code_list();
        while let Some(code) = cursor {
            let entry = code.get();
            cursor = entry.next_code_link();

            let (head, tail) = if entry.marked_for_deoptimization() {
                moved += 1;
                (&mut marked_head, &mut marked_tail)
            } else {
                (&mut kept_head, &mut kept_tail)
            };
            match *tail {
                None => *head = Some(code),
                Some(prev) => prev.get().set_next_code_link(Some(code)),
            }
            *tail = Some(code);
        }

        if let Some(tail) = kept_tail {
            tail.get().set_next_code_link(None);
        }
        self.set_optimized_code_list(kept_head);

        if let Some(tail) = marked_tail {
            tail.get().set_next_code_link(self.deoptimized_code_list());
            self.set_deoptimized_code_list(marked_head);
        }
        moved
    }
}

impl HeapObject for Context {
    const KIND: ObjectKind = ObjectKind::Context;
}
