use gc::DEFAULT_THRESHOLD;

/// Default capacity of the root stack.
pub const STACK_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Maximum number of roots on the stack.
    pub root_capacity: usize,
    /// Threshold for the first collection, and again whenever a collection empties the heap.
    pub initial_threshold: usize,
    /// Hard cap on live objects. `None` means only real memory exhaustion fails an allocation.
    pub heap_limit: Option<usize>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self { root_capacity: STACK_SIZE, initial_threshold: DEFAULT_THRESHOLD, heap_limit: None }
    }
}

impl MachineConfig {
    pub fn with_root_capacity(self, root_capacity: usize) -> Self {
        Self { root_capacity, ..self }
    }

    pub fn with_initial_threshold(self, initial_threshold: usize) -> Self {
        Self { initial_threshold, ..self }
    }

    pub fn with_heap_limit(self, heap_limit: Option<usize>) -> Self {
        Self { heap_limit, ..self }
    }

    pub(crate) fn normalized(self) -> Self {
        if self.root_capacity == 0 {
            log::warn!("Root stack capacity must be positive, using 1");
        }
        if self.initial_threshold == 0 {
            log::warn!("Collection threshold must be positive, using 1");
        }
        Self {
            root_capacity: self.root_capacity.max(1),
            initial_threshold: self.initial_threshold.max(1),
            ..self
        }
    }
}
