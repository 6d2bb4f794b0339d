// # -----------------------------
// # crates/cli/src/lib.rs
// # -----------------------------
//! Pieces shared by the `fsgate` and `fsgate-mcpd` binaries.

pub mod doctor;
pub mod mcp;
pub mod settings;
