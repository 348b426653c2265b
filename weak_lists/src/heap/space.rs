//! the set of pages backing a `Heap`
//!
//! objects go to a page of the smallest size class that fits them. each size
//! class remembers the page that last served it so repeated allocations of one
//! kind stay on the fast path

use core::{cell::Cell, ptr::NonNull};

use rust_alloc::vec::Vec;

use super::HeapError;
use super::page::Page;

const SIZE_CLASSES: [usize; 7] = [16, 24, 32, 48, 64, 96, 128];
const PAGE_ALIGN: usize = 16;

pub(crate) const DEFAULT_PAGE_SIZE: usize = 4096;

fn size_class_index_for(size: usize) -> Option<usize> {
    SIZE_CLASSES.iter().position(|&sc| sc >= size)
}

#[derive(Debug)]
pub(crate) struct ObjectSpace {
    pub(crate) page_size: usize,
    pages: Vec<Page>,
    committed: usize,
    alloc_cache: [Cell<usize>; SIZE_CLASSES.len()],
    free_cache: Cell<usize>,
}

impl Default for ObjectSpace {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pages: Vec::new(),
            committed: 0,
            alloc_cache: core::array::from_fn(|_| Cell::new(usize::MAX)),
            free_cache: Cell::new(usize::MAX),
        }
    }
}

impl ObjectSpace {
    pub(crate) fn pages_len(&self) -> usize {
        self.pages.len()
    }

    // bytes held by all pages
    pub(crate) fn committed(&self) -> usize {
        self.committed
    }

    pub(crate) fn live_objects(&self) -> usize {
        self.pages.iter().map(Page::live).sum()
    }

    pub(crate) fn try_alloc<T>(&mut self, value: T) -> Result<NonNull<T>, HeapError> {
        debug_assert!(
            core::mem::align_of::<T>() <= 8,
            "heap objects must not need more than 8 byte alignment"
        );
        let needed = core::mem::size_of::<T>().max(8);
        let sc_idx = size_class_index_for(needed).ok_or(HeapError::ObjectTooLarge(needed))?;
        let slot_size = SIZE_CLASSES[sc_idx];

        let slot = self.alloc_slot(sc_idx, slot_size)?;
        let dst = slot.cast::<T>();
        // SAFETY: the slot is fresh, at least `size_of::<T>()` bytes and 8
        // byte aligned
        unsafe { dst.as_ptr().write(value) };
        Ok(dst)
    }

    fn alloc_slot(&mut self, sc_idx: usize, slot_size: usize) -> Result<NonNull<u8>, HeapError> {
        let cached = self.alloc_cache[sc_idx].get();
        if let Some(page) = self.pages.get(cached) {
            if page.slot_size == slot_size {
                if let Some(slot) = page.alloc_slot() {
                    return Ok(slot);
                }
            }
        }

        for (i, page) in self.pages.iter().enumerate().rev() {
            if page.slot_size == slot_size {
                if let Some(slot) = page.alloc_slot() {
                    self.alloc_cache[sc_idx].set(i);
                    return Ok(slot);
                }
            }
        }

        let total = self.page_size.max(slot_size * 4);
        let page = Page::try_init(slot_size, total, PAGE_ALIGN)?;
        let slot = page.alloc_slot().ok_or(HeapError::OutOfMemory)?;
        self.committed += page.size();
        self.alloc_cache[sc_idx].set(self.pages.len());
        self.pages.push(page);
        Ok(slot)
    }

    fn page_of(&self, ptr: NonNull<u8>) -> Option<&Page> {
        let cached = self.free_cache.get();
        if let Some(page) = self.pages.get(cached) {
            if page.owns(ptr) {
                return Some(page);
            }
        }
        let (i, page) = self
            .pages
            .iter()
            .enumerate()
            .rev()
            .find(|(_, page)| page.owns(ptr))?;
        self.free_cache.set(i);
        Some(page)
    }

    pub(crate) fn is_occupied(&self, ptr: NonNull<u8>) -> bool {
        self.page_of(ptr).is_some_and(|page| page.is_occupied(ptr))
    }

    pub(crate) fn free_slot(&mut self, ptr: NonNull<u8>) {
        match self.page_of(ptr) {
            Some(page) => page.free_slot(ptr),
            None => debug_assert!(
                false,
                "free_slot called with pointer {ptr:p} not owned by any page; \
                 possible double-free or foreign pointer"
            ),
        }
    }

    // drop pages that no longer hold any object
    pub(crate) fn release_empty_pages(&mut self) -> usize {
        let before = self.pages.len();
        let mut released = 0;
        self.pages.retain(|page| {
            if page.is_empty() {
                released += page.size();
                false
            } else {
                true
            }
        });
        self.committed = self.committed.saturating_sub(released);
        self.free_cache.set(usize::MAX);
        for cache in &self.alloc_cache {
            cache.set(usize::MAX);
        }
        before - self.pages.len()
    }
}
