use crate::{ObjectRef, Pair};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ObjectKind {
    Integer,
    Pair,
}

#[derive(
    Debug, Clone, PartialEq, Eq, derive_more::From, derive_more::TryInto, derive_more::Display,
)]
#[try_into(owned, ref, ref_mut)]
pub enum Object {
    Integer(i64),
    Pair(Pair),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Integer(_) => ObjectKind::Integer,
            Object::Pair(_) => ObjectKind::Pair,
        }
    }

    /// Direct children in slot order. Empty slots are included as `None` and contribute
    /// nothing to reachability.
    pub fn children(&self) -> &[Option<ObjectRef>] {
        match self {
            Object::Integer(_) => &[],
            Object::Pair(pair) => pair.slots(),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<&Pair> {
        match self {
            Object::Pair(pair) => Some(pair),
            _ => None,
        }
    }
}
