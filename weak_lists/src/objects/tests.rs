use rust_alloc::vec::Vec;

use crate::heap::{Heap, HeapRef, ObjectRef};
use crate::slots::{FieldId, WeakSlots};
use crate::weak_list::iter_weak_list;

use super::{Code, CodeDataContainer, CodeList, Context};

fn optimized(context: &Context) -> Vec<HeapRef<Code>> {
    iter_weak_list(context.optimized_code_list()).collect()
}

fn deoptimized(context: &Context) -> Vec<HeapRef<Code>> {
    iter_weak_list(context.deoptimized_code_list()).collect()
}

#[test]
fn optimized_code_is_prepended() {
    let heap = Heap::default();
    let context = heap.alloc_context().unwrap();
    let (first, second) = (heap.alloc_code().unwrap(), heap.alloc_code().unwrap());

    context.get().add_optimized_code(first);
    context.get().add_optimized_code(second);

    assert_eq!(optimized(context.get()), [second, first]);
    assert_eq!(context.get().code_list(CodeList::Optimized), Some(second));
    assert_eq!(context.get().code_list(CodeList::Deoptimized), None);
}

#[test]
fn deoptimization_flag_lives_in_the_container() {
    let heap = Heap::default();
    let code = heap.alloc_code().unwrap();

    assert!(!code.get().marked_for_deoptimization());
    code.get().set_marked_for_deoptimization(true);
    assert!(code.get().marked_for_deoptimization());
    assert_eq!(code.get().code_data_container().get().kind_specific_flags(), 1);

    code.get().set_marked_for_deoptimization(false);
    assert!(!code.get().marked_for_deoptimization());
}

#[test]
fn marked_code_moves_to_the_deoptimized_list() {
    let heap = Heap::default();
    let context = heap.alloc_context().unwrap();
    let already = heap.alloc_code().unwrap();
    context.get().set_deoptimized_code_list(Some(already));

    let codes: Vec<_> = (0..4).map(|_| heap.alloc_code().unwrap()).collect();
    for &code in &codes {
        context.get().add_optimized_code(code);
    }
    codes[0].get().set_marked_for_deoptimization(true);
    codes[2].get().set_marked_for_deoptimization(true);

    assert_eq!(context.get().deoptimize_marked_code(), 2);

    assert_eq!(optimized(context.get()), [codes[3], codes[1]]);
    assert_eq!(deoptimized(context.get()), [codes[2], codes[0], already]);
}

#[test]
fn deoptimizing_without_marks_changes_nothing() {
    let heap = Heap::default();
    let context = heap.alloc_context().unwrap();
    let code = heap.alloc_code().unwrap();
    context.get().add_optimized_code(code);

    assert_eq!(context.get().deoptimize_marked_code(), 0);
    assert_eq!(optimized(context.get()), [code]);
    assert_eq!(context.get().deoptimized_code_list(), None);
}

#[test]
fn context_weak_slots_in_declaration_order() {
    let heap = Heap::default();
    let context = heap.alloc_context().unwrap();
    let next = heap.alloc_context().unwrap();
    let code = heap.alloc_code().unwrap();
    context.get().add_optimized_code(code);
    context.get().set_next_context_link(Some(next));

    let mut seen: Vec<(FieldId, Option<ObjectRef>)> = Vec::new();
    context
        .get()
        .for_each_weak_slot(&mut |field, value| seen.push((field, value)));

    assert_eq!(
        seen,
        [
            (Context::OPTIMIZED_CODE_LIST, Some(code.erase())),
            (Context::DEOPTIMIZED_CODE_LIST, None),
            (Context::NEXT_CONTEXT_LINK, Some(next.erase())),
        ]
    );
}

#[test]
fn code_list_fields_match_the_slot_names() {
    assert_eq!(CodeList::Optimized.field(), Context::OPTIMIZED_CODE_LIST);
    assert_eq!(CodeList::Deoptimized.field(), Context::DEOPTIMIZED_CODE_LIST);
    assert_eq!(CodeDataContainer::NEXT_CODE_LINK.name(), "next_code_link");
}
