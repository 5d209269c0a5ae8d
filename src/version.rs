//! Quipu core version information.
//!
//! This module exposes the generator version as a single constant so all
//! subsystems (emit banner, strings export) agree on the same value.
//!
//! ## Notes
//!
//! - The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time.
//! - Prefer this constant over repeating `env!("CARGO_PKG_VERSION")` in multiple places.

/// The Quipu core version string (for example, `0.3.1`).
pub const QUIPU_VERSION: &str = env!("CARGO_PKG_VERSION");
