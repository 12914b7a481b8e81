//! Source entity → portable entity transformation

mod decode;
mod engine;
mod workflow;

pub use decode::{decode_variables, encode_variables};
pub use engine::Transformer;
