mod access_flags;
mod attributes;
mod binary_format;
mod buffer;
mod class_graph;
mod class_writer;
pub mod code;
mod constants;
mod errors;
pub mod opcodes;
mod pool;
mod types;
mod version;

pub use access_flags::*;
pub use attributes::*;
pub use binary_format::*;
pub use buffer::*;
pub use class_graph::*;
pub use class_writer::*;
pub use constants::*;
pub use errors::*;
pub use opcodes::{mnemonic, negate};
pub use pool::*;
pub use types::*;
pub use version::*;
