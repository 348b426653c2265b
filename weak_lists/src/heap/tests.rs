use crate::heap::{Heap, HeapError, HeapObject, HeapRef, ObjectKind};
use crate::objects::{AllocationSite, Context};

#[test]
fn alloc_places_objects_in_pages() {
    let heap = Heap::default();
    let site = heap.alloc_allocation_site().unwrap();
    let context = heap.alloc_context().unwrap();

    assert!(heap.contains(site.erase()));
    assert!(heap.contains(context.erase()));
    assert_eq!(heap.live_objects(), 2);
    // sites and contexts land in different size classes
    assert_eq!(heap.pages_len(), 2);
    assert_eq!(heap.committed_bytes(), 2 * 4096);
}

#[test]
fn code_brings_its_data_container() {
    let heap = Heap::default();
    let code = heap.alloc_code().unwrap();

    assert_eq!(heap.live_objects(), 2);
    let container = code.get().code_data_container();
    assert!(heap.contains(container.erase()));
    assert_eq!(container.erase().kind(), ObjectKind::CodeDataContainer);
    assert_eq!(code.get().next_code_link(), None);
}

#[test]
fn reclaimed_slot_is_handed_out_again() {
    let heap = Heap::default();
    let first = heap.alloc_allocation_site().unwrap();
    let _second = heap.alloc_allocation_site().unwrap();

    heap.reclaim(first.erase());
    assert!(!heap.contains(first.erase()));
    assert_eq!(heap.live_objects(), 1);

    let third = heap.alloc_allocation_site().unwrap();
    assert_eq!(third.addr(), first.addr());
    assert_eq!(third.get().weak_next(), None);
}

#[test]
fn reclaim_clobbers_the_first_word() {
    let heap = Heap::default();
    let next = heap.alloc_allocation_site().unwrap();
    let site = heap.alloc_allocation_site().unwrap();
    heap.reclaim(next.erase());
    assert_eq!(site.get().weak_next(), None);

    heap.reclaim(site.erase());

    // the free list now threads through the old link field
    // SAFETY: the slot is still mapped, the page is alive
    let word = unsafe { (site.addr() as *const usize).read() };
    assert_eq!(word, next.addr());
}

#[test]
fn evacuate_moves_the_object() {
    let heap = Heap::default();
    let site = heap.alloc_allocation_site().unwrap();
    site.get().increment_memento_found_count();
    site.get().increment_memento_found_count();

    let moved = heap.evacuate(site).unwrap();

    assert_ne!(moved, site);
    assert!(heap.contains(moved.erase()));
    assert!(!heap.contains(site.erase()));
    assert_eq!(moved.get().memento_found_count(), 2);
    assert_eq!(heap.live_objects(), 1);
}

#[test]
fn evacuate_object_keeps_the_kind() {
    let heap = Heap::default();
    let context = heap.alloc_context().unwrap();
    let other = heap.alloc_context().unwrap();
    context.get().set_next_context_link(Some(other));

    let moved = heap.evacuate_object(context.erase()).unwrap();

    assert_eq!(moved.kind(), ObjectKind::Context);
    assert_ne!(moved, context.erase());
    let moved = HeapRef::<Context>::cast(moved);
    assert_eq!(moved.get().next_context_link(), Some(other));
}

#[test]
fn pages_are_added_on_demand() {
    // 64 bytes hold one bitmap word and three 16 byte slots
    let heap = Heap::default().with_page_size(64);
    let sites = (0..4)
        .map(|_| heap.alloc_allocation_site().unwrap())
        .collect::<rust_alloc::vec::Vec<_>>();

    assert_eq!(heap.pages_len(), 2);
    assert!(sites.iter().all(|site| heap.contains(site.erase())));
}

#[test]
fn empty_pages_are_released() {
    let heap = Heap::default();
    let site = heap.alloc_allocation_site().unwrap();
    let context = heap.alloc_context().unwrap();

    heap.reclaim(site.erase());
    assert_eq!(heap.release_empty_pages(), 1);
    assert_eq!(heap.pages_len(), 1);
    assert_eq!(heap.committed_bytes(), 4096);
    assert!(heap.contains(context.erase()));

    // the next site gets a fresh page
    heap.alloc_allocation_site().unwrap();
    assert_eq!(heap.pages_len(), 2);
}

#[derive(Debug)]
struct Oversized {
    _payload: [u64; 32],
}

impl HeapObject for Oversized {
    const KIND: ObjectKind = ObjectKind::AllocationSite;
}

#[test]
fn oversized_objects_are_rejected() {
    let heap = Heap::default();
    let err = heap.alloc(Oversized { _payload: [0; 32] }).unwrap_err();

    assert!(matches!(err, HeapError::ObjectTooLarge(256)));
    assert_eq!(heap.pages_len(), 0);
}

#[test]
fn try_cast_checks_the_kind() {
    let heap = Heap::default();
    let site = heap.alloc_allocation_site().unwrap();

    assert_eq!(HeapRef::<AllocationSite>::try_cast(site.erase()), Some(site));
    assert_eq!(HeapRef::<Context>::try_cast(site.erase()), None);
}
