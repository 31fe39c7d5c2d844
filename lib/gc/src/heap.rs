use std::{
    collections::{HashSet, TryReserveError},
    fmt::Display,
};

use crate::{garbage_collector::GcObject, Object};

mod object_ref;
pub use object_ref::ObjectRef;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    #[error("heap limit of {limit} objects reached")]
    LimitReached { limit: usize },
    #[error(transparent)]
    OutOfMemory(#[from] TryReserveError),
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    object: Option<GcObject>,
}

/// Arena holding every allocated object.
///
/// Objects never move: an [`ObjectRef`] stays valid until the object is swept. Freed slots
/// are recycled through a free list, with the slot generation bumped so stale handles can
/// be told apart from the slot's next occupant. A slot whose generation is exhausted is
/// retired instead.
#[derive(Debug, Default)]
pub struct Heap {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    live: usize,
    limit: Option<usize>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A heap that refuses to hold more than `limit` live objects at once.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self { limit, ..Self::default() }
    }

    /// Number of objects currently allocated, reachable or not.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the next allocation would exceed the heap limit.
    pub fn is_at_limit(&self) -> bool {
        self.limit.is_some_and(|limit| self.live >= limit)
    }

    /// Links a new, unmarked object into the heap.
    ///
    /// On failure nothing is linked and the live count is left untouched.
    pub fn alloc(&mut self, object: impl Into<Object>) -> Result<ObjectRef, HeapError> {
        if let Some(limit) = self.limit.filter(|_| self.is_at_limit()) {
            return Err(HeapError::LimitReached { limit });
        }

        let object = GcObject::new(object);
        let object_ref = match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                debug_assert!(slot.object.is_none(), "Free slot #{index} is occupied");
                slot.object = Some(object);
                ObjectRef::new(index, slot.generation)
            }
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| HeapError::LimitReached { limit: u32::MAX as usize })?;
                self.slots.try_reserve(1)?;
                self.slots.push(Slot { generation: 0, object: Some(object) });
                ObjectRef::new(index, 0)
            }
        };

        self.live += 1;
        log::trace!("Allocated {object_ref}");
        Ok(object_ref)
    }

    pub fn get(&self, object: ObjectRef) -> Option<&Object> {
        self.gc_object(object).map(|o| &o.object)
    }

    pub fn get_mut(&mut self, object: ObjectRef) -> Option<&mut Object> {
        self.gc_object_mut(object).map(|o| &mut o.object)
    }

    /// Whether `object` still refers to a live object.
    pub fn contains(&self, object: ObjectRef) -> bool {
        self.gc_object(object).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectRef, &Object)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let object = slot.object.as_ref()?;
            Some((ObjectRef::new(index as u32, slot.generation), &object.object))
        })
    }

    /// Displays the object graph below `object`, with shared structure printed in full and
    /// back edges printed as `#<cycle>`.
    pub fn resolve(&self, object: Option<ObjectRef>) -> Resolved<'_> {
        Resolved { heap: self, object }
    }

    pub(crate) fn gc_object(&self, object: ObjectRef) -> Option<&GcObject> {
        self.slots
            .get(object.index())
            .filter(|slot| slot.generation == object.generation())
            .and_then(|slot| slot.object.as_ref())
    }

    pub(crate) fn gc_object_mut(&mut self, object: ObjectRef) -> Option<&mut GcObject> {
        self.slots
            .get_mut(object.index())
            .filter(|slot| slot.generation == object.generation())
            .and_then(|slot| slot.object.as_mut())
    }

    /// Frees every unmarked object and clears the mark of every survivor, in a single pass
    /// over the slots. Returns the number of objects freed.
    pub(crate) fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(object) = slot.object.as_mut() else {
                continue;
            };

            if object.is_marked() {
                object.unmark();
            } else {
                log::trace!("Freeing #{index}: {}", object.object);
                slot.object = None;
                freed += 1;

                // A slot that ran out of generations is never reused.
                match slot.generation.checked_add(1) {
                    Some(generation) => {
                        slot.generation = generation;
                        self.free_slots.push(index as u32);
                    }
                    None => log::debug!("Retiring slot #{index}"),
                }
            }
        }

        debug_assert!(freed <= self.live, "Freed {freed} of {} objects", self.live);
        self.live -= freed;
        debug_assert_eq!(self.live, self.slots.iter().filter(|s| s.object.is_some()).count());

        freed
    }
}

pub struct Resolved<'a> {
    heap: &'a Heap,
    object: Option<ObjectRef>,
}

enum Frame {
    Value(Option<ObjectRef>),
    Text(&'static str),
    Leave(ObjectRef),
}

impl Display for Resolved<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pairs currently being printed, to detect back edges.
        let mut path = HashSet::new();
        let mut frames = vec![Frame::Value(self.object)];

        while let Some(frame) = frames.pop() {
            let object_ref = match frame {
                Frame::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Frame::Leave(object_ref) => {
                    path.remove(&object_ref);
                    continue;
                }
                Frame::Value(None) => {
                    f.write_str("nil")?;
                    continue;
                }
                Frame::Value(Some(object_ref)) => object_ref,
            };

            match self.heap.get(object_ref) {
                None => write!(f, "#<freed {object_ref}>")?,
                Some(Object::Integer(value)) => write!(f, "{value}")?,
                Some(Object::Pair(_)) if !path.insert(object_ref) => f.write_str("#<cycle>")?,
                Some(Object::Pair(pair)) => {
                    f.write_str("(")?;
                    frames.extend([
                        Frame::Leave(object_ref),
                        Frame::Text(")"),
                        Frame::Value(pair.second()),
                        Frame::Text(" . "),
                        Frame::Value(pair.first()),
                    ]);
                }
            }
        }

        Ok(())
    }
}
