//! The object model: every heap object is a tagged variant exposing its kind and an ordered
//! list of child slots. The collector only ever looks at [`Object::children`], so a new
//! variant needs no collector changes as long as it reports its children.

mod object;
pub use object::*;

mod pair;
pub use pair::*;
