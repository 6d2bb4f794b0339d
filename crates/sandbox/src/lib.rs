// # -----------------------------
// # crates/sandbox/src/lib.rs
// # -----------------------------
// Capability sandbox for service file access.
// - Path confinement (traversal, dotfiles, blocklists, symlinks)
// - Secret redaction of anything leaving the process

mod path;
mod redact;

pub use path::{PathGuard, SandboxError};
pub use redact::{Redactor, PLACEHOLDER};
