//! Heap-level owners of the global weak lists.

use core::cell::Cell;

use crate::heap::{HeapRef, Link};
use crate::objects::{AllocationSite, Context};
use crate::weak_list::{WeakListPass, WeakListVisitor, iter_weak_list};

/// The weak list heads held by the heap roots.
///
/// These heads are roots, so updating them after a pass needs no slot
/// recording, the root visitor rewrites them like any other root.
#[derive(Debug, Default)]
pub struct WeakListRoots {
    native_contexts_list: Cell<Link<Context>>,
    allocation_sites_list: Cell<Link<AllocationSite>>,
}

impl WeakListRoots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn native_contexts_list(&self) -> Link<Context> {
        self.native_contexts_list.get()
    }

    pub fn set_native_contexts_list(&self, head: Link<Context>) {
        self.native_contexts_list.set(head);
    }

    pub fn allocation_sites_list(&self) -> Link<AllocationSite> {
        self.allocation_sites_list.get()
    }

    pub fn set_allocation_sites_list(&self, head: Link<AllocationSite>) {
        self.allocation_sites_list.set(head);
    }

    /// Prepends a freshly created native context.
    pub fn add_native_context(&self, context: HeapRef<Context>) {
        debug_assert!(
            Context::weak_next(context).is_none(),
            "{context:?} is already linked"
        );
        Context::set_weak_next(context, self.native_contexts_list());
        self.set_native_contexts_list(Some(context));
    }

    /// Prepends a freshly created allocation site.
    pub fn add_allocation_site(&self, site: HeapRef<AllocationSite>) {
        debug_assert!(
            site.get().weak_next().is_none(),
            "{site:?} is already linked"
        );
        site.get().set_weak_next(self.allocation_sites_list());
        self.set_allocation_sites_list(Some(site));
    }

    pub fn native_contexts(&self) -> impl Iterator<Item = HeapRef<Context>> {
        iter_weak_list(self.native_contexts_list())
    }

    pub fn allocation_sites(&self) -> impl Iterator<Item = HeapRef<AllocationSite>> {
        iter_weak_list(self.allocation_sites_list())
    }

    pub fn process_native_contexts(&self, pass: &mut WeakListPass<'_>) {
        let head = pass.visit_weak_list(self.native_contexts_list());
        self.set_native_contexts_list(head);
        tracing::debug!(phase = ?pass.phase(), "processed native contexts");
    }

    pub fn process_allocation_sites(&self, pass: &mut WeakListPass<'_>) {
        let head = pass.visit_weak_list(self.allocation_sites_list());
        self.set_allocation_sites_list(head);
        tracing::debug!(phase = ?pass.phase(), "processed allocation sites");
    }

    /// Prunes every weak list reachable from the roots.
    pub fn process_all_weak_references(&self, pass: &mut WeakListPass<'_>) {
        self.process_native_contexts(pass);
        self.process_allocation_sites(pass);
    }

    /// Prunes the lists that can hold young objects.
    ///
    /// Allocation sites are only ever pruned by full collections.
    pub fn process_young_weak_references(&self, pass: &mut WeakListPass<'_>) {
        self.process_native_contexts(pass);
    }
}
