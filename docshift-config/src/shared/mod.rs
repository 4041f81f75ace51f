mod base;
mod identifiers;
mod store;
mod transform;
mod writer;

pub use base::*;
pub use identifiers::*;
pub use store::*;
pub use transform::*;
pub use writer::*;
