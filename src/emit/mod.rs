//! Code emission
//!
//! This module turns a design tree into a pair of companion text files: a
//! C++ source file and its header. Emission is deterministic: for the same
//! tree, settings, and paths, the output is byte-identical.
//!
//! ## Architecture
//!
//! ```text
//! DesignTree → emit_files → CodeWriter (two sinks, indent, once-sets, ids)
//!                              ├─ escapers (C strings, C data)
//!                              └─ BlockChecksum → tag lines for merge-back
//! ```
//!
//! ## Module Organization
//!
//! - `crc` - CRC-32 primitive and the block normalization rule
//! - `writer` - dual-stream writer (**primary interface** for node hooks)
//! - `escape` - C string/data literal escaping
//! - `driver` - tree walker and the `emit_files` entry point

// Enforce explicit error handling in emission code.
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod crc;
mod driver;
mod escape;
mod writer;

pub use crc::{crc32, BlockChecksum};
pub use driver::{emit_files, emit_into, EmitError};
pub use writer::{CodeWriter, TagKind};

pub(crate) use writer::TAG_MARKER;
