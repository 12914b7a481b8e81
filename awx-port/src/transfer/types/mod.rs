//! Core types for entity transfer

mod entity_type;
mod portable;
mod raw;
mod workflow;

pub use entity_type::*;
pub use portable::*;
pub use raw::*;
pub use workflow::*;
