// # -----------------------------
// # crates/common/src/lib.rs
// # -----------------------------
//! Configuration shared by every fsgate crate, plus the static service registry.

mod config;
mod service;

pub use config::{
    BreakerCfg, Config, ConfigError, LimitsCfg, PolicyCfg, SandboxCfg, SearchCfg, TelemetryCfg,
};
pub use service::{ServiceName, ServiceRegistry, UnknownService};
