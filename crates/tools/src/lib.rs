// # -----------------------------
// # crates/tools/src/lib.rs
// # -----------------------------
//! Bounded filesystem primitives. Callers are expected to have confined every path
//! before it reaches this crate.

pub mod fs;
pub mod search;
pub mod structure;
