//! Quipu Code-Emission Core
//!
//! Quipu is a GUI-layout designer; this crate is its code-emission and
//! merge-back core. Given a design tree (provided by the host through the
//! traits in [`tree`]), it writes a pair of companion C++ files (source and
//! header) and can later read the source file back, detect regions a human
//! edited, and fold selected edits into the tree.
//!
//! ## Architecture
//!
//! ```text
//! DesignTree ── emit::emit_files ──▶ source.cxx + header.h (tagged blocks)
//!      ▲                                    │
//!      └──── mergeback::merge_back ◀────────┘ (edited by hand)
//! ```
//!
//! - [`emit`] - deterministic dual-stream writer, escapers, tree walker
//! - [`mergeback`] - tag scan, conflict classification, apply-edits
//! - [`strings`] - label/tooltip export for translation catalogs
//! - [`tree`] / [`project`] - collaborator contracts (node model, settings)

pub mod emit;
pub mod mergeback;
pub mod project;
pub mod strings;
pub mod tree;
pub mod version;

pub use emit::{emit_files, emit_into, CodeWriter, EmitError, TagKind};
pub use mergeback::{merge_back, MergeBackError, MergeOutcome, MergeReport, MergeTask};
pub use project::{CatgetsSettings, GettextSettings, I18nFlavor, ProjectSettings};
pub use strings::write_strings;
pub use tree::{DesignNode, DesignTree, NodeKind, SourceOffsets, Visibility};
pub use version::QUIPU_VERSION;
