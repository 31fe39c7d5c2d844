use gc::{HeapError, ObjectRef};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("root stack overflow (capacity {capacity})")]
    RootStackOverflow { capacity: usize },
    #[error("root stack underflow")]
    RootStackUnderflow,
    #[error("allocation failed: {0}")]
    AllocationFailure(#[from] HeapError),
    #[error("stale object reference {0}")]
    StaleReference(ObjectRef),
    #[error("{0} is not a pair")]
    NotAPair(ObjectRef),
}

pub type Result<T> = std::result::Result<T, Error>;
