//! Weak-list tracing for a compacting garbage collector.
//!
//! Heaps keep a few singly linked chains whose links do not keep their
//! members alive: the native contexts, the allocation sites and, per
//! context, the optimized and deoptimized code. During a collection each
//! chain is walked, dead entries are unlinked, and every rewritten link is
//! reported to the compactor so it can be fixed up after objects move.
//!
//! The moving parts:
//! - [`WeakListPass`] runs [`WeakListPass::visit_weak_list`] over a chain
//!   for one [`GcPhase`], asking a [`WeakObjectRetainer`] about every entry
//!   and reporting writes to a [`SlotRecorder`].
//! - [`WeakListVisitor`] tells the traversal where a kind keeps its link.
//! - [`WeakListRoots`] owns the global chains.
//! - [`Heap`] holds the objects in arena pages so they can be moved and
//!   reclaimed for real.

#![no_std]

extern crate self as weak_lists;

extern crate alloc as rust_alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod heap;
pub mod objects;
pub mod retainer;
pub mod roots;
pub mod slots;
pub mod weak_list;

pub use heap::{Heap, HeapError, HeapObject, HeapRef, Link, ObjectKind, ObjectRef};
pub use objects::{AllocationSite, Code, CodeDataContainer, CodeList, Context};
pub use retainer::{EvacuatingRetainer, MarkedObjectRetainer, WeakObjectRetainer};
pub use roots::WeakListRoots;
pub use slots::{FieldId, RecordedSlot, SlotRecorder, SlotsBuffer, WeakSlot, WeakSlots};
pub use weak_list::{GcPhase, WeakListPass, WeakListVisitor, clear_weak_list, iter_weak_list};
pub use weak_lists_derive::WeakSlots;
