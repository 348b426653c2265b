//! `WeakListVisitor` for the three kinds that live in weak lists.

use crate::heap::{HeapRef, Link, ObjectRef};
use crate::objects::{AllocationSite, Code, CodeDataContainer, CodeList, Context};
use crate::slots::{FieldId, WeakSlots};

use super::{WeakListPass, WeakListVisitor, clear_weak_list};

// the link of a code entry sits in its data container
impl WeakListVisitor for Code {
    fn weak_next(code: HeapRef<Self>) -> Link<Self> {
        code.get().next_code_link()
    }

    fn set_weak_next(code: HeapRef<Self>, next: Link<Self>) {
        code.get().set_next_code_link(next);
    }

    fn weak_next_holder(code: HeapRef<Self>) -> ObjectRef {
        code.get().code_data_container().erase()
    }

    fn weak_next_field() -> FieldId {
        CodeDataContainer::NEXT_CODE_LINK
    }
}

impl WeakListVisitor for Context {
    fn weak_next(context: HeapRef<Self>) -> Link<Self> {
        context.get().next_context_link()
    }

    fn set_weak_next(context: HeapRef<Self>, next: Link<Self>) {
        context.get().set_next_context_link(next);
    }

    fn weak_next_holder(context: HeapRef<Self>) -> ObjectRef {
        context.erase()
    }

    fn weak_next_field() -> FieldId {
        Context::NEXT_CONTEXT_LINK
    }

    fn visit_live_object(context: HeapRef<Self>, pass: &mut WeakListPass<'_>) {
        // code entries are never young, a scavenge leaves the code lists alone
        if !pass.phase().is_full_gc() {
            return;
        }

        if pass.must_record_slots() {
            let owner = context.erase();
            context
                .get()
                .for_each_weak_slot(&mut |field, value| pass.record_slot(owner, field, value));
        }

        visit_code_list(context, CodeList::Optimized, pass);
        visit_code_list(context, CodeList::Deoptimized, pass);
    }

    fn visit_phantom_object(context: HeapRef<Self>) {
        let context = context.get();
        clear_weak_list::<Code>(context.optimized_code_list());
        clear_weak_list::<Code>(context.deoptimized_code_list());
    }
}

fn visit_code_list(context: HeapRef<Context>, list: CodeList, pass: &mut WeakListPass<'_>) {
    let head = pass.visit_weak_list::<Code>(context.get().code_list(list));
    context.get().set_code_list(list, head);
    pass.record_slot(context.erase(), list.field(), head.map(HeapRef::erase));
}

impl WeakListVisitor for AllocationSite {
    fn weak_next(site: HeapRef<Self>) -> Link<Self> {
        site.get().weak_next()
    }

    fn set_weak_next(site: HeapRef<Self>, next: Link<Self>) {
        site.get().set_weak_next(next);
    }

    fn weak_next_holder(site: HeapRef<Self>) -> ObjectRef {
        site.erase()
    }

    fn weak_next_field() -> FieldId {
        AllocationSite::WEAK_NEXT
    }
}
