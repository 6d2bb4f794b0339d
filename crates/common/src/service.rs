use crate::config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The closed set of services a caller may address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceName {
    Api,
    Crm,
    Frontend,
    Games,
    Website,
    Automation,
    Root,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown or disallowed service: {0}")]
pub struct UnknownService(pub String);

impl ServiceName {
    pub const ALL: [ServiceName; 7] = [
        ServiceName::Api,
        ServiceName::Crm,
        ServiceName::Frontend,
        ServiceName::Games,
        ServiceName::Website,
        ServiceName::Automation,
        ServiceName::Root,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceName::Api => "api",
            ServiceName::Crm => "crm",
            ServiceName::Frontend => "frontend",
            ServiceName::Games => "games",
            ServiceName::Website => "website",
            ServiceName::Automation => "automation",
            ServiceName::Root => "root",
        }
    }

    /// Directory under the project root when no override is configured.
    pub fn default_dir(self) -> &'static str {
        match self {
            ServiceName::Api => "api",
            ServiceName::Crm => "crm",
            ServiceName::Frontend => "frontend",
            ServiceName::Games => "web",
            ServiceName::Website => "website",
            ServiceName::Automation => "automation/n8n",
            ServiceName::Root => ".",
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceName {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownService(s.to_string()))
    }
}

#[derive(Debug, Clone)]
struct ServiceDir {
    relative: String,
    base: PathBuf,
}

/// Immutable service → base directory map, built once at startup.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    project_root: PathBuf,
    dirs: BTreeMap<ServiceName, ServiceDir>,
}

impl ServiceRegistry {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        for key in cfg.services.keys() {
            key.parse::<ServiceName>()
                .map_err(|e| ConfigError::Invalid(format!("[services]: {e}")))?;
        }
        let project_root = if cfg.project_root.is_absolute() {
            cfg.project_root.clone()
        } else {
            std::env::current_dir()
                .map_err(|e| ConfigError::Invalid(format!("current dir: {e}")))?
                .join(&cfg.project_root)
        };

        let dirs = ServiceName::ALL
            .into_iter()
            .map(|name| {
                let relative = cfg
                    .services
                    .get(name.as_str())
                    .cloned()
                    .unwrap_or_else(|| name.default_dir().to_string());
                let base = if relative == "." {
                    project_root.clone()
                } else {
                    project_root.join(&relative)
                };
                (name, ServiceDir { relative, base })
            })
            .collect();
        Ok(Self { project_root, dirs })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn base(&self, name: ServiceName) -> &Path {
        // every variant is inserted by `from_config`
        self.dirs
            .get(&name)
            .map(|d| d.base.as_path())
            .unwrap_or(self.project_root.as_path())
    }

    pub fn relative_dir(&self, name: ServiceName) -> &str {
        self.dirs
            .get(&name)
            .map(|d| d.relative.as_str())
            .unwrap_or(".")
    }

    pub fn iter(&self) -> impl Iterator<Item = (ServiceName, &Path)> {
        self.dirs.iter().map(|(name, d)| (*name, d.base.as_path()))
    }
}
