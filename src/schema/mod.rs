//! Feature schema
//!
//! The fixed catalog of feature definitions and the ordered schema built
//! from it at startup.

mod catalog;
mod registry;

pub use catalog::*;
pub use registry::*;
