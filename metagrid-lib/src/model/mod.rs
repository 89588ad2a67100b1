//! Row, column and lookup models

mod column;
mod dataset;
mod lookup;
mod value;

pub use column::*;
pub use dataset::*;
pub use lookup::*;
pub use value::*;
