use gc::ObjectRef;
use log::trace;

use crate::{Error, Result};

/// The root set: a bounded LIFO stack of object handles.
#[derive(Debug)]
pub struct RootStack {
    stack: Vec<ObjectRef>,
    capacity: usize,
}

impl RootStack {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { stack: Vec::with_capacity(capacity), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    pub fn push(&mut self, object: ObjectRef) -> Result<()> {
        if self.is_full() {
            return Err(Error::RootStackOverflow { capacity: self.capacity });
        }
        trace!("Pushing {object}");
        self.stack.push(object);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<ObjectRef> {
        let object = self.stack.pop().ok_or(Error::RootStackUnderflow)?;
        trace!("Popping {object}");
        Ok(object)
    }

    /// The `n`th root counted from the top, `0` being the top itself.
    pub fn peek_nth(&self, n: usize) -> Result<ObjectRef> {
        self.stack.iter().rev().nth(n).copied().ok_or(Error::RootStackUnderflow)
    }

    /// The root at `index`, counted from the bottom of the stack.
    pub fn get(&self, index: usize) -> Option<ObjectRef> {
        self.stack.get(index).copied()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn as_slice(&self) -> &[ObjectRef] {
        &self.stack
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ObjectRef> {
        self.stack.iter()
    }
}
