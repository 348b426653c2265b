//! fixed size heap pages
//!
//! a `Page` is one buffer split into equally sized slots, laid out as
//! `[ bitmap ][ slots ]`. bitmap bit `i` is set while slot `i` holds an
//! object. a reclaimed slot is pushed on the page's free list, which stores
//! its `next` pointer in the first word of the slot, so reclaimed memory is
//! clobbered straight away

use core::{cell::Cell, ptr::NonNull};

use rust_alloc::alloc::{Layout, alloc, dealloc, handle_alloc_error};

use crate::heap::HeapError;

pub(crate) struct Page {
    pub(crate) slot_size: usize,
    slot_count: usize,
    layout: Layout,
    buffer: NonNull<u8>,
    bitmap_words: usize,
    bump: Cell<usize>,
    free_list: Cell<*mut u8>,
    live: Cell<usize>,
}

impl core::fmt::Debug for Page {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Page")
            .field("slot_size", &self.slot_size)
            .field("slot_count", &self.slot_count)
            .field("layout", &self.layout)
            .field("bump", &self.bump.get())
            .field("live", &self.live.get())
            .finish()
    }
}

impl Page {
    pub(crate) fn try_init(
        slot_size: usize,
        total_capacity: usize,
        align: usize,
    ) -> Result<Self, HeapError> {
        assert!(
            slot_size >= 8 && slot_size % 8 == 0,
            "slot_size must be a multiple of 8 (for the free-list pointer)"
        );

        let estimated = total_capacity / slot_size;
        let bitmap_words = estimated.div_ceil(64);
        let bitmap_bytes = bitmap_words * 8;
        let slot_count = total_capacity.saturating_sub(bitmap_bytes) / slot_size;
        if slot_count == 0 {
            return Err(HeapError::OutOfMemory);
        }

        let layout = Layout::from_size_align(total_capacity, align)?;

        // SAFETY: `layout` has a non-zero size
        let buffer = unsafe {
            let ptr = alloc(layout);
            let Some(nn) = NonNull::new(ptr) else {
                handle_alloc_error(layout)
            };
            nn
        };

        // SAFETY: buffer is valid for at least `bitmap_bytes`
        unsafe {
            core::ptr::write_bytes(buffer.as_ptr(), 0, bitmap_bytes);
        }

        Ok(Self {
            slot_size,
            slot_count,
            layout,
            buffer,
            bitmap_words,
            bump: Cell::new(0),
            free_list: Cell::new(core::ptr::null_mut()),
            live: Cell::new(0),
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.layout.size()
    }

    pub(crate) fn live(&self) -> usize {
        self.live.get()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live.get() == 0
    }

    #[inline]
    fn slot_base(&self) -> *mut u8 {
        // SAFETY: the bitmap is inside the buffer
        unsafe { self.buffer.as_ptr().add(self.bitmap_words * 8) }
    }

    #[inline]
    fn slot_ptr(&self, i: usize) -> NonNull<u8> {
        // SAFETY: `i < slot_count`, so the slot is inside the buffer and
        // derived from a non-null base
        unsafe { NonNull::new_unchecked(self.slot_base().add(i * self.slot_size)) }
    }

    #[inline]
    fn slot_index(&self, ptr: NonNull<u8>) -> usize {
        (ptr.as_ptr() as usize - self.slot_base() as usize) / self.slot_size
    }

    // true if `ptr` is the start of one of this page's slots
    pub(crate) fn owns(&self, ptr: NonNull<u8>) -> bool {
        let start = self.slot_base() as usize;
        let end = start + self.slot_count * self.slot_size;
        let addr = ptr.as_ptr() as usize;
        addr >= start && addr < end && (addr - start) % self.slot_size == 0
    }

    #[inline]
    fn bitmap_word(&self, i: usize) -> &Cell<u64> {
        // SAFETY: word `i / 64` lies in the bitmap, which is 8 byte aligned
        // because the buffer is at least 8 byte aligned
        unsafe { &*(self.buffer.as_ptr().add((i / 64) * 8) as *const Cell<u64>) }
    }

    pub(crate) fn is_occupied(&self, ptr: NonNull<u8>) -> bool {
        let i = self.slot_index(ptr);
        self.bitmap_word(i).get() & (1u64 << (i % 64)) != 0
    }

    // hand out a slot, preferring reclaimed ones. `None` when full
    pub(crate) fn alloc_slot(&self) -> Option<NonNull<u8>> {
        let fl = self.free_list.get();
        let (ptr, idx) = if let Some(nn) = NonNull::new(fl) {
            // SAFETY: a free slot stores the next free slot in its first word
            let next = unsafe { (fl as *const *mut u8).read() };
            self.free_list.set(next);
            (nn, self.slot_index(nn))
        } else {
            let idx = self.bump.get();
            if idx >= self.slot_count {
                return None;
            }
            self.bump.set(idx + 1);
            (self.slot_ptr(idx), idx)
        };

        let word = self.bitmap_word(idx);
        word.set(word.get() | (1u64 << (idx % 64)));
        self.live.set(self.live.get() + 1);
        Some(ptr)
    }

    pub(crate) fn free_slot(&self, ptr: NonNull<u8>) {
        let idx = self.slot_index(ptr);
        let word = self.bitmap_word(idx);
        debug_assert!(
            word.get() & (1u64 << (idx % 64)) != 0,
            "slot {ptr:p} freed twice"
        );
        word.set(word.get() & !(1u64 << (idx % 64)));
        // SAFETY: the slot is at least 8 bytes and 8 byte aligned
        unsafe {
            (ptr.as_ptr() as *mut *mut u8).write(self.free_list.get());
        }
        self.free_list.set(ptr.as_ptr());
        self.live.set(self.live.get().saturating_sub(1));
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        // SAFETY: buffer was allocated with the same layout by the global allocator
        unsafe { dealloc(self.buffer.as_ptr(), self.layout) };
    }
}
