use std::fmt::Debug;

use gc::{CollectionReport, GarbageCollector, Heap, Object, ObjectRef, Pair, Resolved};
use log::trace;

mod config;
pub use config::*;

mod error;
pub use error::*;

mod stack;
pub use stack::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, derive_more::Display)]
#[display(fmt = "{} collections, {} allocated, {} freed", collections, allocated, freed)]
pub struct Stats {
    pub collections: usize,
    pub allocated: usize,
    pub freed: usize,
}

type CollectionHook = Box<dyn FnMut(&CollectionReport)>;

/// Owns the heap together with the root stack that keeps objects alive.
///
/// Objects are only created through the machine. Whenever the number of live objects has
/// reached the collection threshold, the next allocation runs a full collection first.
pub struct Machine {
    heap: Heap,
    gc: GarbageCollector,
    stack: RootStack,
    config: MachineConfig,
    stats: Stats,
    on_collection: CollectionHook,
}

impl Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("heap", &self.heap)
            .field("gc", &self.gc)
            .field("stack", &self.stack)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Self {
        let config = config.normalized();
        Self {
            heap: Heap::with_limit(config.heap_limit),
            gc: GarbageCollector::new(config.initial_threshold),
            stack: RootStack::with_capacity(config.root_capacity),
            config,
            stats: Stats::default(),
            on_collection: Box::new(|report| log::info!("{report}")),
        }
    }

    /// Replaces the hook notified after every collection. By default reports are logged.
    pub fn on_collection(&mut self, hook: impl FnMut(&CollectionReport) + 'static) {
        self.on_collection = Box::new(hook);
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn live_count(&self) -> usize {
        self.heap.len()
    }

    pub fn collection_threshold(&self) -> usize {
        self.gc.next_gc()
    }

    pub fn get(&self, object: ObjectRef) -> Option<&Object> {
        self.heap.get(object)
    }

    pub fn resolve(&self, object: ObjectRef) -> Resolved<'_> {
        self.heap.resolve(Some(object))
    }

    pub fn stack(&self) -> &RootStack {
        &self.stack
    }

    pub fn roots(&self) -> &[ObjectRef] {
        self.stack.as_slice()
    }

    pub fn push_root(&mut self, object: ObjectRef) -> Result<()> {
        self.check_live(object)?;
        self.stack.push(object)
    }

    pub fn pop_root(&mut self) -> Result<ObjectRef> {
        self.stack.pop()
    }

    /// The `n`th root from the top of the stack.
    pub fn peek_root(&self, n: usize) -> Result<ObjectRef> {
        self.stack.peek_nth(n)
    }

    /// Drops every root, leaving all objects unreachable until pushed again.
    pub fn clear_roots(&mut self) {
        self.stack.clear();
    }

    /// Allocates `object` without rooting it.
    ///
    /// Children of `object` must be live. They are kept alive by this call even if it
    /// collects, but once it returns the caller is responsible for rooting the result.
    pub fn allocate(&mut self, object: impl Into<Object>) -> Result<ObjectRef> {
        let object = object.into();
        for &child in object.children().iter().flatten() {
            self.check_live(child)?;
        }

        // Over the hard limit, garbage may still free up room.
        if self.gc.gc_needed(&self.heap) || self.heap.is_at_limit() {
            self.collect_with(object.children().iter().flatten().copied());
        }

        let object_ref = self.heap.alloc(object)?;

        self.stats.allocated += 1;
        trace!("Allocated {object_ref}, {} live", self.heap.len());
        Ok(object_ref)
    }

    /// Allocates an integer and pushes it as a new root.
    pub fn push_int(&mut self, value: i64) -> Result<ObjectRef> {
        if self.stack.is_full() {
            return Err(Error::RootStackOverflow { capacity: self.stack.capacity() });
        }
        let object = self.allocate(value)?;
        self.stack.push(object)?;
        Ok(object)
    }

    /// Pops the two topmost roots, builds a pair `(deeper . top)` from them and pushes the
    /// pair in their place.
    ///
    /// Both children stay on the stack until the pair exists, so a collection triggered by
    /// this allocation cannot free them.
    pub fn push_pair(&mut self) -> Result<ObjectRef> {
        let tail = self.stack.peek_nth(0)?;
        let head = self.stack.peek_nth(1)?;

        let pair = self.allocate(Pair::new(Some(head), Some(tail)))?;

        let popped_tail = self.stack.pop()?;
        let popped_head = self.stack.pop()?;
        debug_assert_eq!((popped_head, popped_tail), (head, tail));

        self.stack.push(pair)?;
        Ok(pair)
    }

    pub fn set_first(&mut self, pair: ObjectRef, child: Option<ObjectRef>) -> Result<()> {
        self.pair_mut(pair, child)?.set_first(child);
        Ok(())
    }

    pub fn set_second(&mut self, pair: ObjectRef, child: Option<ObjectRef>) -> Result<()> {
        self.pair_mut(pair, child)?.set_second(child);
        Ok(())
    }

    /// Runs a full collection with the root stack as the only roots.
    pub fn collect(&mut self) -> CollectionReport {
        self.collect_with(std::iter::empty())
    }

    /// Drops every root and frees everything with one final collection.
    pub fn destroy(mut self) -> CollectionReport {
        self.stack.clear();
        let report = self.collect();
        debug_assert!(self.heap.is_empty(), "{} objects survived teardown", self.heap.len());
        report
    }

    fn collect_with(&mut self, extra_roots: impl IntoIterator<Item = ObjectRef>) -> CollectionReport {
        let roots = self.stack.iter().copied().chain(extra_roots);
        let report = self.gc.collect_garbage(&mut self.heap, roots);

        self.stats.collections += 1;
        self.stats.freed += report.collected;
        (self.on_collection)(&report);
        report
    }

    fn check_live(&self, object: ObjectRef) -> Result<()> {
        if self.heap.contains(object) {
            Ok(())
        } else {
            Err(Error::StaleReference(object))
        }
    }

    fn pair_mut(&mut self, pair: ObjectRef, child: Option<ObjectRef>) -> Result<&mut Pair> {
        if let Some(child) = child {
            self.check_live(child)?;
        }
        let object = self.heap.get_mut(pair).ok_or(Error::StaleReference(pair))?;
        object.try_into().map_err(|_| Error::NotAPair(pair))
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use gc::ObjectKind;
    use itertools::Itertools;
    use pretty_assertions::assert_eq;

    use super::*;

    #[ctor::ctor]
    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn int(machine: &Machine, object: ObjectRef) -> i64 {
        machine.get(object).and_then(Object::as_integer).unwrap()
    }

    fn pair(machine: &Machine, object: ObjectRef) -> Pair {
        *machine.get(object).and_then(Object::as_pair).unwrap()
    }

    #[test]
    fn roots_survive() {
        let mut machine = Machine::new();
        machine.push_int(1).unwrap();
        machine.push_int(2).unwrap();

        let before = machine.live_count();
        let report = machine.collect();

        assert_eq!(report, CollectionReport { collected: 0, remaining: 2 });
        assert_eq!(machine.live_count(), before);
        assert_eq!(machine.roots().iter().map(|&r| int(&machine, r)).collect_vec(), vec![1, 2]);
    }

    #[test]
    fn unrooted_objects_are_reclaimed() {
        let mut machine = Machine::new();
        let one = machine.push_int(1).unwrap();
        let two = machine.push_int(2).unwrap();
        machine.pop_root().unwrap();
        machine.pop_root().unwrap();

        assert_eq!(machine.collect(), CollectionReport { collected: 2, remaining: 0 });
        assert_eq!(machine.live_count(), 0);
        assert_eq!(machine.get(one), None);
        assert_eq!(machine.get(two), None);
    }

    #[test]
    fn nested_objects_are_reachable() {
        let mut machine = Machine::new();
        machine.push_int(1).unwrap();
        machine.push_int(2).unwrap();
        machine.push_pair().unwrap();
        machine.push_int(3).unwrap();
        machine.push_int(4).unwrap();
        machine.push_pair().unwrap();
        let root = machine.push_pair().unwrap();

        assert_eq!(machine.roots(), &[root]);
        assert_eq!(machine.collect(), CollectionReport { collected: 0, remaining: 7 });
        assert_eq!(machine.resolve(root).to_string(), "((1 . 2) . (3 . 4))");
    }

    #[test]
    fn unrooted_cycle_is_reclaimed() {
        let mut machine = Machine::new();
        machine.push_int(1).unwrap();
        machine.push_int(2).unwrap();
        let a = machine.push_pair().unwrap();
        machine.push_int(3).unwrap();
        machine.push_int(4).unwrap();
        let b = machine.push_pair().unwrap();

        machine.set_second(a, Some(b)).unwrap();
        machine.set_second(b, Some(a)).unwrap();

        // 2 and 4 are no longer referenced by anything.
        assert_eq!(machine.collect(), CollectionReport { collected: 2, remaining: 4 });
        assert_eq!(machine.resolve(a).to_string(), "(1 . (3 . #<cycle>))");

        machine.pop_root().unwrap();
        machine.pop_root().unwrap();
        assert_eq!(machine.collect(), CollectionReport { collected: 4, remaining: 0 });
        assert_eq!(machine.live_count(), 0);
    }

    #[cfg(not(feature = "gc_stress_test"))]
    #[test]
    fn threshold_doubles_after_collection() {
        let reports = Rc::new(RefCell::new(Vec::new()));
        let mut machine = Machine::with_config(MachineConfig::default().with_initial_threshold(4));
        let sink = reports.clone();
        machine.on_collection(move |report| sink.borrow_mut().push(*report));

        for i in 0..4 {
            machine.push_int(i).unwrap();
        }
        assert!(reports.borrow().is_empty());

        // Fifth allocation finds the heap at the threshold.
        machine.push_int(4).unwrap();
        assert_eq!(*reports.borrow(), vec![CollectionReport { collected: 0, remaining: 4 }]);
        assert_eq!(machine.collection_threshold(), 8);

        // Room for 4 more before the live count reaches 2K.
        for i in 5..8 {
            machine.push_int(i).unwrap();
        }
        assert_eq!(reports.borrow().len(), 1);
        machine.push_int(8).unwrap();
        assert_eq!(reports.borrow().len(), 2);
        assert_eq!(reports.borrow()[1], CollectionReport { collected: 0, remaining: 8 });
        assert_eq!(machine.collection_threshold(), 16);
    }

    #[test]
    fn threshold_resets_when_heap_empties() {
        let mut machine = Machine::with_config(MachineConfig::default().with_initial_threshold(3));
        for i in 0..10 {
            machine.push_int(i).unwrap();
        }
        assert!(machine.collection_threshold() > 3);

        machine.clear_roots();
        machine.collect();
        assert_eq!(machine.collection_threshold(), 3);
    }

    #[test]
    fn stack_discipline() {
        let mut machine = Machine::new();
        let pushed = (0..5).map(|i| machine.push_int(i).unwrap()).collect_vec();

        let popped = (0..5).map(|_| machine.pop_root().unwrap()).collect_vec();

        assert_eq!(popped, pushed.into_iter().rev().collect_vec());
        assert!(machine.roots().is_empty());
        assert_eq!(machine.pop_root(), Err(Error::RootStackUnderflow));
    }

    #[test]
    fn pair_of_two_integers() {
        let mut machine = Machine::new();
        let one = machine.push_int(1).unwrap();
        let two = machine.push_int(2).unwrap();
        let root = machine.push_pair().unwrap();

        assert_eq!(machine.roots(), &[root]);
        assert_eq!(machine.live_count(), 3);
        assert_eq!(machine.get(root).map(Object::kind), Some(ObjectKind::Pair));
        assert_eq!(pair(&machine, root), Pair::new(Some(one), Some(two)));

        assert_eq!(machine.collect(), CollectionReport { collected: 0, remaining: 3 });
    }

    #[cfg(not(feature = "gc_stress_test"))]
    #[test]
    fn pair_children_survive_collection_during_construction() {
        let mut machine = Machine::with_config(MachineConfig::default().with_initial_threshold(2));
        let one = machine.push_int(1).unwrap();
        let two = machine.push_int(2).unwrap();

        // Heap is at the threshold, so building the pair collects first.
        let root = machine.push_pair().unwrap();

        assert_eq!(machine.stats().collections, 1);
        assert_eq!(pair(&machine, root), Pair::new(Some(one), Some(two)));
        assert_eq!(int(&machine, one) + int(&machine, two), 3);
    }

    #[test]
    fn allocate_keeps_unrooted_children_alive() {
        let mut machine = Machine::with_config(MachineConfig::default().with_initial_threshold(1));
        let one = machine.allocate(1_i64).unwrap();

        let root = machine.allocate(Pair::new(Some(one), None)).unwrap();
        machine.push_root(root).unwrap();

        assert!(machine.get(one).is_some());
        assert_eq!(machine.collect(), CollectionReport { collected: 0, remaining: 2 });
    }

    #[test]
    fn stack_overflow_leaves_state_untouched() {
        let mut machine = Machine::with_config(MachineConfig::default().with_root_capacity(2));
        machine.push_int(1).unwrap();
        let top = machine.push_int(2).unwrap();

        assert_eq!(machine.push_int(3), Err(Error::RootStackOverflow { capacity: 2 }));
        assert_eq!(machine.push_root(top), Err(Error::RootStackOverflow { capacity: 2 }));
        assert_eq!(machine.roots().len(), 2);
        assert_eq!(machine.live_count(), 2);
    }

    #[test]
    fn pair_needs_two_roots() {
        let mut machine = Machine::new();
        assert_eq!(machine.push_pair(), Err(Error::RootStackUnderflow));

        machine.push_int(1).unwrap();
        assert_eq!(machine.push_pair(), Err(Error::RootStackUnderflow));
        assert_eq!(machine.roots().len(), 1);
        assert_eq!(machine.live_count(), 1);
    }

    #[test]
    fn heap_limit_collects_before_failing() {
        let config = MachineConfig::default().with_heap_limit(Some(2));
        let mut machine = Machine::with_config(config);
        machine.push_int(1).unwrap();
        machine.push_int(2).unwrap();

        assert_eq!(
            machine.push_int(3),
            Err(Error::AllocationFailure(gc::HeapError::LimitReached { limit: 2 }))
        );
        assert_eq!(machine.live_count(), 2);
        assert_eq!(machine.stats().allocated, 2);

        machine.pop_root().unwrap();
        machine.push_int(3).unwrap();
        assert_eq!(machine.live_count(), 2);
    }

    #[test]
    fn stale_and_mistyped_references_are_rejected() {
        let mut machine = Machine::new();
        let gone = machine.push_int(1).unwrap();
        machine.pop_root().unwrap();
        machine.collect();

        let integer = machine.push_int(2).unwrap();
        assert_eq!(machine.push_root(gone), Err(Error::StaleReference(gone)));
        assert_eq!(machine.set_first(integer, None), Err(Error::NotAPair(integer)));
        assert_eq!(machine.allocate(Pair::new(Some(gone), None)), Err(Error::StaleReference(gone)));

        machine.push_int(3).unwrap();
        let pair = machine.push_pair().unwrap();
        assert_eq!(machine.set_first(pair, Some(gone)), Err(Error::StaleReference(gone)));
        assert_eq!(machine.set_first(gone, None), Err(Error::StaleReference(gone)));
    }

    #[test]
    fn set_slots_changes_reachability() {
        let mut machine = Machine::new();
        let one = machine.push_int(1).unwrap();
        machine.push_int(2).unwrap();
        let root = machine.push_pair().unwrap();

        machine.set_first(root, None).unwrap();
        assert_eq!(machine.collect(), CollectionReport { collected: 1, remaining: 2 });
        assert_eq!(machine.get(one), None);
        assert_eq!(machine.resolve(root).to_string(), "(nil . 2)");
    }

    #[test]
    fn destroy_frees_rooted_objects() {
        let mut machine = Machine::new();
        machine.push_int(1).unwrap();
        machine.push_int(2).unwrap();
        machine.push_pair().unwrap();

        assert_eq!(machine.destroy(), CollectionReport { collected: 3, remaining: 0 });
    }

    #[cfg(not(feature = "gc_stress_test"))]
    #[test]
    fn reports_and_stats() {
        let reports = Rc::new(RefCell::new(Vec::new()));
        let mut machine = Machine::new();
        let sink = reports.clone();
        machine.on_collection(move |report| sink.borrow_mut().push(report.to_string()));

        machine.push_int(1).unwrap();
        machine.push_int(2).unwrap();
        machine.pop_root().unwrap();
        machine.collect();
        machine.collect();

        assert_eq!(
            *reports.borrow(),
            vec!["Collected 1 objects, 1 remaining.", "Collected 0 objects, 1 remaining."]
        );
        assert_eq!(machine.stats(), Stats { collections: 2, allocated: 2, freed: 1 });
        assert_eq!(machine.stats().to_string(), "2 collections, 2 allocated, 1 freed");
    }

    #[test]
    fn churn_stays_bounded() {
        let mut machine = Machine::new();
        for i in 0..1000 {
            for _ in 0..20 {
                machine.push_int(i).unwrap();
            }
            for _ in 0..20 {
                machine.pop_root().unwrap();
            }
        }

        assert!(machine.live_count() <= 2 * 20);
        assert_eq!(machine.stats().allocated, 20_000);
        assert_eq!(machine.destroy().remaining, 0);
    }

    #[cfg(not(feature = "gc_stress_test"))]
    #[test]
    fn deep_chain_survives_collection_and_prints() {
        let mut machine = Machine::new();
        machine.push_int(0).unwrap();
        for i in 1..20_000 {
            machine.push_int(i).unwrap();
            machine.push_pair().unwrap();
        }
        let root = machine.peek_root(0).unwrap();

        assert_eq!(machine.collect(), CollectionReport { collected: 0, remaining: 39_999 });

        let printed = machine.resolve(root).to_string();
        assert!(printed.starts_with(&format!("{}0 . 1)", "(".repeat(19_999))));
        assert!(printed.ends_with(" . 19999)"));

        assert_eq!(machine.destroy(), CollectionReport { collected: 39_999, remaining: 0 });
    }
}
