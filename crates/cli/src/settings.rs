use anyhow::{Context, Result};
use clap::Args;
use fsgate_common::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Flags every binary accepts; they override the file and environment layers.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// TOML config file (default: $FSGATE_CONFIG, then ./fsgate.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Project root holding the service directories (overrides PROJECT_ROOT)
    #[arg(long, global = true)]
    pub project_root: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<Config> {
        let mut cfg = Config::load(self.config.as_deref()).context("load config")?;
        if let Some(root) = &self.project_root {
            cfg.project_root = root.clone();
        }
        Ok(cfg)
    }
}

/// Logs go to stderr; stdout is reserved for tool output and protocol frames.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
