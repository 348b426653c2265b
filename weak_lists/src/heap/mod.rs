//! The object heap hosting weak-list nodes.
//!
//! Objects live in size-classed arena pages. The heap can move a single
//! object to a fresh slot ([`Heap::evacuate`]) and reclaim a slot on the spot
//! ([`Heap::reclaim`]); reclaimed slots are clobbered by the page free list
//! and handed out again, which is exactly the memory behaviour weak-list
//! traversal has to survive.

use core::cell::RefCell;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ptr::NonNull;

use rust_alloc::alloc::LayoutError;

use crate::objects::{AllocationSite, Code, CodeDataContainer, Context};

mod page;
mod space;

use space::ObjectSpace;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone)]
pub enum HeapError {
    LayoutError(LayoutError),
    OutOfMemory,
    ObjectTooLarge(usize),
}

impl From<LayoutError> for HeapError {
    fn from(value: LayoutError) -> Self {
        Self::LayoutError(value)
    }
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LayoutError(err) => write!(f, "invalid page layout: {err}"),
            Self::OutOfMemory => f.write_str("heap page exhausted"),
            Self::ObjectTooLarge(size) => {
                write!(f, "object of {size}B exceeds the largest size class")
            }
        }
    }
}

impl core::error::Error for HeapError {}

/// The kinds of object the heap knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Code,
    CodeDataContainer,
    Context,
    AllocationSite,
}

/// A type that can be stored in the [`Heap`].
///
/// Heap objects are reclaimed without running drop glue, so implementors
/// must not need `Drop`.
pub trait HeapObject: Sized + 'static {
    const KIND: ObjectKind;
}

/// A kind-tagged, untyped object identity.
///
/// This is what retainers and slot recorders see.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    kind: ObjectKind,
    addr: NonNull<u8>,
}

impl ObjectRef {
    pub fn kind(self) -> ObjectKind {
        self.kind
    }

    pub fn addr(self) -> usize {
        self.addr.as_ptr() as usize
    }

    pub(crate) fn as_non_null(self) -> NonNull<u8> {
        self.addr
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{:p}", self.kind, self.addr)
    }
}

/// A typed reference to an object in a [`Heap`].
///
/// The reference is only valid while the heap that allocated it is alive and
/// the object has been neither reclaimed nor evacuated. Like the arena
/// pointers it is built on, it does not track that, do not keep it around
/// past a collection that discarded or moved the object.
#[repr(transparent)]
pub struct HeapRef<T: HeapObject>(NonNull<T>, PhantomData<&'static T>);

/// A weak link: `None` terminates a list of `T`.
pub type Link<T> = Option<HeapRef<T>>;

impl<T: HeapObject> HeapRef<T> {
    pub(crate) fn from_non_null(ptr: NonNull<T>) -> Self {
        Self(ptr, PhantomData)
    }

    /// Reinterprets an erased reference as a `T`.
    ///
    /// Handing in an object of another kind is a bug in the caller.
    pub fn cast(object: ObjectRef) -> Self {
        debug_assert_eq!(
            object.kind,
            T::KIND,
            "{object:?} used as a {:?}",
            T::KIND
        );
        Self::from_non_null(object.addr.cast::<T>())
    }

    /// Reinterprets an erased reference, or `None` if the kinds differ.
    pub fn try_cast(object: ObjectRef) -> Option<Self> {
        (object.kind == T::KIND).then(|| Self::from_non_null(object.addr.cast::<T>()))
    }

    pub fn get(&self) -> &T {
        // SAFETY: see the type level docs, the object is valid while the
        // reference is in use
        unsafe { self.0.as_ref() }
    }

    pub fn erase(self) -> ObjectRef {
        ObjectRef {
            kind: T::KIND,
            addr: self.0.cast::<u8>(),
        }
    }

    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    pub(crate) fn as_non_null(self) -> NonNull<T> {
        self.0
    }
}

impl<T: HeapObject> Clone for HeapRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: HeapObject> Copy for HeapRef<T> {}

impl<T: HeapObject> PartialEq for HeapRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: HeapObject> Eq for HeapRef<T> {}

impl<T: HeapObject> Hash for HeapRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T: HeapObject> fmt::Debug for HeapRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{:p}", T::KIND, self.0)
    }
}

#[derive(Debug, Default)]
pub struct Heap {
    // RefCell so retainers holding `&Heap` can move and reclaim objects
    space: RefCell<ObjectSpace>,
}

impl Heap {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.space.get_mut().page_size = page_size;
        self
    }

    pub fn pages_len(&self) -> usize {
        self.space.borrow().pages_len()
    }

    pub fn committed_bytes(&self) -> usize {
        self.space.borrow().committed()
    }

    pub fn live_objects(&self) -> usize {
        self.space.borrow().live_objects()
    }

    /// Returns `true` if `object` points at an occupied slot of this heap.
    pub fn contains(&self, object: ObjectRef) -> bool {
        self.space.borrow().is_occupied(object.as_non_null())
    }

    pub fn alloc<T: HeapObject>(&self, value: T) -> Result<HeapRef<T>, HeapError> {
        debug_assert!(
            !core::mem::needs_drop::<T>(),
            "heap objects are reclaimed without drop glue"
        );
        let ptr = self.space.borrow_mut().try_alloc(value)?;
        Ok(HeapRef::from_non_null(ptr))
    }

    /// Allocates a code entry together with its data container.
    pub fn alloc_code(&self) -> Result<HeapRef<Code>, HeapError> {
        let container = self.alloc(CodeDataContainer::new())?;
        self.alloc(Code::new(container))
    }

    pub fn alloc_context(&self) -> Result<HeapRef<Context>, HeapError> {
        self.alloc(Context::new())
    }

    pub fn alloc_allocation_site(&self) -> Result<HeapRef<AllocationSite>, HeapError> {
        self.alloc(AllocationSite::new())
    }

    /// Moves `object` to a fresh slot and reclaims the old one.
    ///
    /// On error the object stays where it was.
    pub fn evacuate<T: HeapObject>(&self, object: HeapRef<T>) -> Result<HeapRef<T>, HeapError> {
        let mut space = self.space.borrow_mut();
        debug_assert!(
            space.is_occupied(object.as_non_null().cast()),
            "evacuating reclaimed object {object:?}"
        );
        // SAFETY: the slot holds a valid `T`. the bitwise copy becomes the
        // only live instance once the old slot is released, and `T` has no
        // drop glue, so dropping the copy on error is harmless
        let value = unsafe { object.as_non_null().as_ptr().read() };
        let moved = space.try_alloc(value)?;
        space.free_slot(object.as_non_null().cast());
        Ok(HeapRef::from_non_null(moved))
    }

    /// Kind-dispatched [`Heap::evacuate`].
    pub fn evacuate_object(&self, object: ObjectRef) -> Result<ObjectRef, HeapError> {
        Ok(match object.kind() {
            ObjectKind::Code => self.evacuate(HeapRef::<Code>::cast(object))?.erase(),
            ObjectKind::CodeDataContainer => self
                .evacuate(HeapRef::<CodeDataContainer>::cast(object))?
                .erase(),
            ObjectKind::Context => self.evacuate(HeapRef::<Context>::cast(object))?.erase(),
            ObjectKind::AllocationSite => self
                .evacuate(HeapRef::<AllocationSite>::cast(object))?
                .erase(),
        })
    }

    /// Releases the slot of `object` immediately. The slot may be handed out
    /// by the very next allocation.
    pub fn reclaim(&self, object: ObjectRef) {
        self.space.borrow_mut().free_slot(object.as_non_null());
    }

    /// Returns pages that no longer hold objects to the global allocator.
    pub fn release_empty_pages(&self) -> usize {
        self.space.borrow_mut().release_empty_pages()
    }
}
