mod heap;
pub use heap::*;

mod value;
pub use value::*;

mod garbage_collector;
pub use garbage_collector::{CollectionReport, GarbageCollector, DEFAULT_THRESHOLD};
