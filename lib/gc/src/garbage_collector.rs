use itertools::Itertools;

use crate::{Heap, Object, ObjectRef};

/// Live-object count that triggers the first collection of a fresh heap.
pub const DEFAULT_THRESHOLD: usize = 8;

#[derive(Debug, PartialEq)]
pub(crate) struct GcObject {
    is_marked: bool,
    pub(crate) object: Object,
}

impl GcObject {
    pub(crate) fn new(object: impl Into<Object>) -> Self {
        Self { is_marked: false, object: object.into() }
    }

    pub(crate) fn mark_reachable(&mut self) {
        self.is_marked = true;
    }

    pub(crate) fn unmark(&mut self) {
        self.is_marked = false;
    }

    pub(crate) fn is_marked(&self) -> bool {
        self.is_marked
    }
}

/// Outcome of one collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, derive_more::Display)]
#[display(fmt = "Collected {} objects, {} remaining.", collected, remaining)]
pub struct CollectionReport {
    pub collected: usize,
    pub remaining: usize,
}

#[derive(Debug)]
pub struct GarbageCollector {
    gray_stack: Vec<ObjectRef>,
    children: Vec<ObjectRef>,
    initial_threshold: usize,
    next_gc: usize,
}

impl Default for GarbageCollector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl GarbageCollector {
    pub fn new(initial_threshold: usize) -> Self {
        let initial_threshold = initial_threshold.max(1);
        Self {
            gray_stack: Vec::new(),
            children: Vec::new(),
            initial_threshold,
            next_gc: initial_threshold,
        }
    }

    pub fn initial_threshold(&self) -> usize {
        self.initial_threshold
    }

    /// Live-object count at which the next allocation collects first.
    pub fn next_gc(&self) -> usize {
        self.next_gc
    }

    pub fn gc_needed(&self, heap: &Heap) -> bool {
        if cfg!(feature = "gc_stress_test") {
            true
        } else {
            heap.len() >= self.next_gc
        }
    }

    fn mark_ref(&mut self, heap: &mut Heap, object_ref: ObjectRef) {
        debug_assert!(heap.contains(object_ref), "Dangling reference {object_ref}");
        if let Some(object) = heap.gc_object_mut(object_ref) {
            if !object.is_marked() {
                object.mark_reachable();
                self.gray_stack.push(object_ref);
            }
        }
    }

    /// Marks everything reachable from `roots`, sweeps the rest and recomputes the
    /// threshold from what survived.
    pub fn collect_garbage(
        &mut self,
        heap: &mut Heap,
        roots: impl IntoIterator<Item = ObjectRef>,
    ) -> CollectionReport {
        log::debug!("Starting garbage collection ({} objects, threshold {})", heap.len(), self.next_gc);

        for root in roots {
            self.mark_ref(heap, root);
        }

        log::trace!("Gray stack: [{}]", self.gray_stack.iter().join(", "));

        // An object is pushed only when its mark goes from unset to set, so every object
        // is scanned at most once and cycles terminate.
        while let Some(object_ref) = self.gray_stack.pop() {
            let Some(object) = heap.get(object_ref) else {
                continue;
            };
            log::trace!("Marking {object_ref}: {object}");

            let mut children = std::mem::take(&mut self.children);
            children.extend(object.children().iter().flatten().copied());
            for child in children.drain(..) {
                self.mark_ref(heap, child);
            }
            self.children = children;
        }

        let collected = heap.sweep();
        let remaining = heap.len();

        self.next_gc = if remaining == 0 {
            self.initial_threshold
        } else {
            remaining.saturating_mul(2)
        };

        let report = CollectionReport { collected, remaining };
        log::debug!("{report} Next collection at {} objects", self.next_gc);
        report
    }
}
