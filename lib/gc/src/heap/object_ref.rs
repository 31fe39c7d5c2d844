use std::fmt::Display;

/// Handle to an object living in a [`crate::Heap`].
///
/// A handle addresses an arena slot together with the generation the slot had when the
/// object was allocated. Once the object is swept the slot's generation moves on, so any
/// handle still pointing at it is detected as stale instead of silently aliasing whatever
/// gets allocated into the slot next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    index: u32,
    generation: u32,
}

impl ObjectRef {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.index)
    }
}
