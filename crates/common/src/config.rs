use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fsgate.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse TOML {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project_root: PathBuf,
    /// Per-service directory overrides, relative to `project_root`.
    pub services: BTreeMap<String, String>,
    pub sandbox: SandboxCfg,
    pub search: SearchCfg,
    pub limits: LimitsCfg,
    pub policy: PolicyCfg,
    pub telemetry: TelemetryCfg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxCfg {
    pub max_path_len: usize,
    pub allow_dotfiles: bool,
    pub blocked_extensions: Vec<String>,
    pub blocked_patterns: Vec<String>,
    pub max_file_bytes: u64,
    pub max_list_entries: usize,
    /// Additional regexes whose whole match is redacted.
    pub extra_redactions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchCfg {
    pub max_files: usize,
    pub max_matches: usize,
    pub max_bytes_per_file: u64,
    pub max_depth: usize,
    pub ignore_dirs: Vec<String>,
    pub default_file_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsCfg {
    pub rate_limit: u32,
    pub rate_interval_ms: u64,
    pub max_concurrency: usize,
    pub read_timeout_ms: u64,
    pub list_timeout_ms: u64,
    pub search_timeout_ms: u64,
    pub breaker: BreakerCfg,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerCfg {
    pub threshold: u32,
    pub cooldown_ms: u64,
    pub half_open_pass: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyCfg {
    /// `false` selects the no-op oracle.
    pub enabled: bool,
    pub opa_bin: String,
    /// Rego policy; defaults to `<project_root>/policies/opa/tool-io.rego`.
    pub policy_path: Option<PathBuf>,
    /// Deny everything when the oracle is unreachable.
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryCfg {
    pub enabled: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            services: BTreeMap::new(),
            sandbox: SandboxCfg::default(),
            search: SearchCfg::default(),
            limits: LimitsCfg::default(),
            policy: PolicyCfg::default(),
            telemetry: TelemetryCfg::default(),
        }
    }
}

impl Default for SandboxCfg {
    fn default() -> Self {
        Self {
            max_path_len: 4096,
            allow_dotfiles: false,
            blocked_extensions: strings(&[".pem", ".key", ".p12", ".pfx", ".jks", ".keystore"]),
            blocked_patterns: strings(&[
                "/secrets/",
                "/.git/",
                "/.ssh/",
                "id_rsa",
                "id_ed25519",
                "credentials.json",
            ]),
            max_file_bytes: 256 * 1024,
            max_list_entries: 500,
            extra_redactions: Vec::new(),
        }
    }
}

impl Default for SearchCfg {
    fn default() -> Self {
        Self {
            max_files: 2000,
            max_matches: 200,
            max_bytes_per_file: 64 * 1024,
            max_depth: 8,
            ignore_dirs: strings(&[
                "node_modules",
                ".git",
                "dist",
                "build",
                "vendor",
                "target",
                ".next",
                "coverage",
                "__pycache__",
            ]),
            default_file_types: strings(&[".js", ".php", ".py", ".ts", ".jsx", ".tsx"]),
        }
    }
}

impl Default for LimitsCfg {
    fn default() -> Self {
        Self {
            rate_limit: 30,
            rate_interval_ms: 10_000,
            max_concurrency: 8,
            read_timeout_ms: 5_000,
            list_timeout_ms: 5_000,
            search_timeout_ms: 20_000,
            breaker: BreakerCfg::default(),
        }
    }
}

impl Default for BreakerCfg {
    fn default() -> Self {
        Self {
            threshold: 5,
            cooldown_ms: 60_000,
            half_open_pass: 2,
        }
    }
}

impl Default for PolicyCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            opa_bin: "opa".to_string(),
            policy_path: None,
            required: false,
        }
    }
}

impl Default for TelemetryCfg {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl PolicyCfg {
    pub fn policy_file(&self, project_root: &Path) -> PathBuf {
        self.policy_path
            .clone()
            .unwrap_or_else(|| project_root.join("policies").join("opa").join("tool-io.rego"))
    }
}

impl Config {
    /// File (explicit path, `FSGATE_CONFIG`, or `fsgate.toml` if present), then environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("FSGATE_CONFIG").map(PathBuf::from));
        let file = explicit.or_else(|| {
            Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists())
        });
        let mut cfg = match &file {
            Some(p) => {
                tracing::debug!(path = %p.display(), "loading config file");
                Self::from_file(p)?
            }
            None => Self::default(),
        };
        cfg.apply_env_from(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&s).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Applies `PROJECT_ROOT` / `MCP_*` overrides read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        if let Some(root) = env.raw("PROJECT_ROOT") {
            self.project_root = PathBuf::from(root);
        }

        let sb = &mut self.sandbox;
        env.set("MCP_FS_MAX_FILE_BYTES", &mut sb.max_file_bytes)?;
        env.set("MCP_FS_MAX_LIST_ENTRIES", &mut sb.max_list_entries)?;
        env.set("MCP_FS_MAX_PATH_LEN", &mut sb.max_path_len)?;
        env.set_bool("MCP_FS_ALLOW_DOTFILES", &mut sb.allow_dotfiles)?;
        env.set_list("MCP_FS_BLOCKED_EXTENSIONS", &mut sb.blocked_extensions);
        env.set_list("MCP_FS_BLOCKED_PATTERNS", &mut sb.blocked_patterns);

        let lim = &mut self.limits;
        env.set("MCP_MAX_CONCURRENCY", &mut lim.max_concurrency)?;
        env.set("MCP_RATE_LIMIT", &mut lim.rate_limit)?;
        env.set("MCP_RATE_INTERVAL_MS", &mut lim.rate_interval_ms)?;
        env.set("MCP_TIMEOUT_READ_MS", &mut lim.read_timeout_ms)?;
        env.set("MCP_TIMEOUT_LIST_MS", &mut lim.list_timeout_ms)?;
        env.set("MCP_TIMEOUT_SEARCH_MS", &mut lim.search_timeout_ms)?;
        env.set("MCP_CB_THRESHOLD", &mut lim.breaker.threshold)?;
        env.set("MCP_CB_COOLDOWN_MS", &mut lim.breaker.cooldown_ms)?;
        env.set("MCP_CB_HALF_OPEN_PASS", &mut lim.breaker.half_open_pass)?;

        let pol = &mut self.policy;
        env.set_bool("MCP_OPA_ENABLED", &mut pol.enabled)?;
        env.set_bool("MCP_OPA_REQUIRED", &mut pol.required)?;
        if let Some(bin) = env.raw("MCP_OPA_BIN") {
            pol.opa_bin = bin;
        }
        if let Some(p) = env.raw("MCP_OPA_POLICY") {
            pol.policy_path = Some(PathBuf::from(p));
        }

        let se = &mut self.search;
        env.set("MCP_SEARCH_MAX_FILES", &mut se.max_files)?;
        env.set("MCP_SEARCH_MAX_MATCHES", &mut se.max_matches)?;
        env.set("MCP_SEARCH_MAX_BYTES", &mut se.max_bytes_per_file)?;
        env.set("MCP_SEARCH_MAX_DEPTH", &mut se.max_depth)?;
        env.set_list("MCP_SEARCH_IGNORE_DIRS", &mut se.ignore_dirs);

        env.set_bool("MCP_TELEMETRY", &mut self.telemetry.enabled)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&str, bool); 9] = [
            ("sandbox.max_path_len must be > 0", self.sandbox.max_path_len > 0),
            ("sandbox.max_list_entries must be > 0", self.sandbox.max_list_entries > 0),
            ("limits.rate_limit must be > 0", self.limits.rate_limit > 0),
            ("limits.rate_interval_ms must be > 0", self.limits.rate_interval_ms > 0),
            ("limits.max_concurrency must be > 0", self.limits.max_concurrency > 0),
            ("limits.breaker.threshold must be > 0", self.limits.breaker.threshold > 0),
            ("limits.breaker.half_open_pass must be > 0", self.limits.breaker.half_open_pass > 0),
            ("search.max_files must be > 0", self.search.max_files > 0),
            ("search.max_matches must be > 0", self.search.max_matches > 0),
        ];
        if let Some((msg, _)) = checks.iter().find(|(_, ok)| !ok) {
            return Err(ConfigError::Invalid((*msg).to_string()));
        }
        Ok(())
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn set<T: FromStr>(&self, key: &str, slot: &mut T) -> Result<(), ConfigError> {
        if let Some(v) = self.raw(key) {
            *slot = v.parse::<T>().map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value: v.clone(),
            })?;
        }
        Ok(())
    }

    fn set_bool(&self, key: &str, slot: &mut bool) -> Result<(), ConfigError> {
        if let Some(v) = self.raw(key) {
            *slot = match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: key.to_string(),
                        value: v,
                    })
                }
            };
        }
        Ok(())
    }

    fn set_list(&self, key: &str, slot: &mut Vec<String>) {
        if let Some(v) = self.raw(key) {
            *slot = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.sandbox.max_path_len, 4096);
        assert_eq!(cfg.sandbox.max_list_entries, 500);
        assert_eq!(cfg.limits.rate_limit, 30);
        assert!(cfg.sandbox.blocked_extensions.contains(&".pem".to_string()));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        cfg.apply_env_from(lookup(&[
            ("PROJECT_ROOT", "/srv/project"),
            ("MCP_FS_MAX_FILE_BYTES", "1024"),
            ("MCP_FS_ALLOW_DOTFILES", "yes"),
            ("MCP_FS_BLOCKED_EXTENSIONS", ".pem, .der ,"),
            ("MCP_RATE_LIMIT", "3"),
            ("MCP_OPA_REQUIRED", "1"),
            ("MCP_TELEMETRY", "off"),
        ]))
        .unwrap();
        assert_eq!(cfg.project_root, PathBuf::from("/srv/project"));
        assert_eq!(cfg.sandbox.max_file_bytes, 1024);
        assert!(cfg.sandbox.allow_dotfiles);
        assert_eq!(cfg.sandbox.blocked_extensions, vec![".pem", ".der"]);
        assert_eq!(cfg.limits.rate_limit, 3);
        assert!(cfg.policy.required);
        assert!(!cfg.telemetry.enabled);
    }

    #[test]
    fn malformed_env_is_rejected() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_from(lookup(&[("MCP_RATE_LIMIT", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref key, .. } if key == "MCP_RATE_LIMIT"));

        let err = cfg
            .apply_env_from(lookup(&[("MCP_OPA_REQUIRED", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("MCP_OPA_REQUIRED"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fsgate.toml");
        fs::write(
            &path,
            "project_root = '/data'\n\n[services]\nfrontend = 'apps/web'\n\n[limits]\nmax_concurrency = 2\n\n[limits.breaker]\nthreshold = 3\n",
        )
        .unwrap();
        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.project_root, PathBuf::from("/data"));
        assert_eq!(cfg.services.get("frontend").map(String::as_str), Some("apps/web"));
        assert_eq!(cfg.limits.max_concurrency, 2);
        assert_eq!(cfg.limits.breaker.threshold, 3);
        assert_eq!(cfg.limits.breaker.half_open_pass, 2);
        assert_eq!(cfg.sandbox.max_list_entries, 500);
    }

    #[test]
    fn zero_concurrency_is_invalid() {
        let mut cfg = Config::default();
        cfg.limits.max_concurrency = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }
}
