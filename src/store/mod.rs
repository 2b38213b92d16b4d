//! File Store Core
//!
//! In-memory registry of whole files and upload fragments:
//! - `registry`: key -> stored object, memory or disk backed
//! - `chunks`: fragment naming and contiguous discovery
//! - `assembler`: size-checked merge of fragments and per-chunk reporting

pub mod assembler;
pub mod chunks;
pub mod registry;
pub mod types;

pub use assembler::Assembler;
pub use chunks::{chunk_key, parse_chunk_key, Fragment};
pub use registry::Registry;
pub use types::*;
