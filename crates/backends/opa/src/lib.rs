// # -----------------------------
// # crates/backends/opa/src/lib.rs
// # -----------------------------
use async_trait::async_trait;
use fsgate_common::PolicyCfg;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;

/// Outcome of a policy evaluation. `Unknown` means "no opinion", never "allow".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    Unknown,
}

/// Where in a tool call the oracle is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Before touching the filesystem: `{service, filePath}`.
    Input,
    /// Before returning content: `{content}`.
    Output,
}

impl Gate {
    pub fn query(self) -> &'static str {
        match self {
            Gate::Input => "data.mcp.policy.toolio.allow_input",
            Gate::Output => "data.mcp.policy.toolio.allow_output",
        }
    }
}

#[async_trait]
pub trait PolicyOracle: Send + Sync {
    async fn decide(&self, gate: Gate, input: &Value) -> Decision;
}

/// Oracle used when policy evaluation is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOracle;

#[async_trait]
impl PolicyOracle for NoopOracle {
    async fn decide(&self, _gate: Gate, _input: &Value) -> Decision {
        Decision::Unknown
    }
}

/// Evaluates a Rego policy through the `opa` binary, one subprocess per decision.
pub struct OpaOracle {
    bin: PathBuf,
    policy: PathBuf,
    required: bool,
    available: OnceCell<bool>,
}

impl OpaOracle {
    pub fn new(bin: impl Into<PathBuf>, policy: impl Into<PathBuf>, required: bool) -> Self {
        Self {
            bin: bin.into(),
            policy: policy.into(),
            required,
            available: OnceCell::new(),
        }
    }

    pub fn from_config(cfg: &PolicyCfg, project_root: &Path) -> Self {
        Self::new(&cfg.opa_bin, cfg.policy_file(project_root), cfg.required)
    }

    /// Probed once per process, then cached.
    pub async fn available(&self) -> bool {
        *self.available.get_or_init(|| self.probe()).await
    }

    async fn probe(&self) -> bool {
        if !self.policy.is_file() {
            tracing::info!(policy = %self.policy.display(), "policy file missing; OPA disabled");
            return false;
        }
        let status = Command::new(&self.bin)
            .arg("version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;
        let ok = matches!(status, Ok(s) if s.success());
        if ok {
            tracing::info!(
                bin = %self.bin.display(),
                policy = %self.policy.display(),
                "OPA available"
            );
        } else {
            tracing::warn!(bin = %self.bin.display(), "OPA binary unavailable");
        }
        ok
    }

    async fn eval(&self, gate: Gate, input: &Value) -> std::io::Result<Option<String>> {
        let payload = serde_json::to_vec(input)?;
        let mut child = Command::new(&self.bin)
            .args(["eval", "--format", "raw", "--stdin-input", "--data"])
            .arg(&self.policy)
            .arg(gate.query())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        if let Some(mut sin) = child.stdin.take() {
            sin.write_all(&payload).await?;
            sin.shutdown().await?;
        }
        let out = child.wait_with_output().await?;
        if !out.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&out.stdout).trim().to_string()))
    }
}

#[async_trait]
impl PolicyOracle for OpaOracle {
    async fn decide(&self, gate: Gate, input: &Value) -> Decision {
        if !self.available().await {
            return if self.required {
                Decision::Deny
            } else {
                Decision::Unknown
            };
        }
        match self.eval(gate, input).await {
            Ok(Some(out)) => match out.as_str() {
                "true" => Decision::Allow,
                "false" => Decision::Deny,
                other => {
                    tracing::warn!(
                        query = gate.query(),
                        output = %other,
                        "unparseable OPA decision"
                    );
                    Decision::Unknown
                }
            },
            Ok(None) => {
                tracing::warn!(query = gate.query(), "OPA eval exited non-zero");
                Decision::Unknown
            }
            Err(e) => {
                tracing::warn!(query = gate.query(), error = %e, "OPA eval failed");
                Decision::Unknown
            }
        }
    }
}

/// `OpaOracle` unless policy evaluation is switched off.
pub fn oracle_from_config(cfg: &PolicyCfg, project_root: &Path) -> Arc<dyn PolicyOracle> {
    if cfg.enabled {
        Arc::new(OpaOracle::from_config(cfg, project_root))
    } else {
        Arc::new(NoopOracle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn noop_has_no_opinion() {
        let d = NoopOracle.decide(Gate::Input, &json!({"service": "api"})).await;
        assert_eq!(d, Decision::Unknown);
    }

    #[tokio::test]
    async fn missing_policy_means_unknown_or_deny() {
        let dir = tempfile::tempdir().unwrap();
        let policy = dir.path().join("absent.rego");
        let lax = OpaOracle::new("opa", &policy, false);
        assert!(!lax.available().await);
        assert_eq!(lax.decide(Gate::Input, &json!({})).await, Decision::Unknown);

        let strict = OpaOracle::new("opa", &policy, true);
        assert_eq!(strict.decide(Gate::Output, &json!({})).await, Decision::Deny);
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let policy = dir.path().join("tool-io.rego");
        std::fs::write(&policy, "package mcp.policy.toolio\n").unwrap();
        let oracle = OpaOracle::new(dir.path().join("no-such-opa"), &policy, false);
        assert!(!oracle.available().await);
        assert_eq!(oracle.decide(Gate::Input, &json!({})).await, Decision::Unknown);
    }

    #[cfg(unix)]
    fn fake_opa(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let bin = dir.join("opa");
        std::fs::write(
            &bin,
            "#!/bin/sh\n\
             if [ \"$1\" = \"version\" ]; then echo 'Version: test'; exit 0; fi\n\
             input=$(cat)\n\
             case \"$input\" in\n\
               *crash*) exit 3 ;;\n\
               *deny*) echo false ;;\n\
               *garbage*) echo maybe ;;\n\
               *) echo true ;;\n\
             esac\n",
        )
        .unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        bin
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn subprocess_decisions_are_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let policy = dir.path().join("tool-io.rego");
        std::fs::write(&policy, "package mcp.policy.toolio\n").unwrap();
        let oracle = OpaOracle::new(fake_opa(dir.path()), &policy, true);

        assert!(oracle.available().await);
        let ask = |s: &str| json!({"service": "api", "filePath": s});
        assert_eq!(oracle.decide(Gate::Input, &ask("ok.txt")).await, Decision::Allow);
        assert_eq!(oracle.decide(Gate::Input, &ask("deny.txt")).await, Decision::Deny);
        assert_eq!(oracle.decide(Gate::Input, &ask("garbage")).await, Decision::Unknown);
        assert_eq!(
            oracle.decide(Gate::Output, &json!({"content": "crash"})).await,
            Decision::Unknown
        );
    }
}
