use std::fmt::Display;

use crate::ObjectRef;

/// Two child slots, `first` and `second`, either of which may be empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pair {
    slots: [Option<ObjectRef>; 2],
}

impl Pair {
    pub fn new(first: Option<ObjectRef>, second: Option<ObjectRef>) -> Self {
        Self { slots: [first, second] }
    }

    pub fn first(&self) -> Option<ObjectRef> {
        self.slots[0]
    }

    pub fn second(&self) -> Option<ObjectRef> {
        self.slots[1]
    }

    pub fn set_first(&mut self, object: Option<ObjectRef>) {
        self.slots[0] = object;
    }

    pub fn set_second(&mut self, object: Option<ObjectRef>) {
        self.slots[1] = object;
    }

    pub fn slots(&self) -> &[Option<ObjectRef>] {
        &self.slots
    }
}

impl Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = |slot: Option<ObjectRef>| slot.map_or_else(|| "nil".to_string(), |o| o.to_string());
        write!(f, "({} . {})", slot(self.first()), slot(self.second()))
    }
}
