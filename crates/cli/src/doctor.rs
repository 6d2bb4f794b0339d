//! Environment diagnostics: project root, service directories, OPA binary and policy file.
//! Human or JSON output; `--strict` turns any failed check into a non-zero exit.

use anyhow::Result;
use fsgate_common::{Config, ServiceName, ServiceRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    NotFound,
    Unknown,
    /// Check skipped because the feature is switched off.
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Check {
    fn new(status: Status, detail: Option<String>) -> Self {
        Self { status, detail }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCheck {
    pub service: ServiceName,
    pub path: String,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorReport {
    pub project_root: Check,
    pub services: Vec<ServiceCheck>,
    pub opa: Check,
    pub policy_file: Check,
    pub policy_required: bool,
}

fn dir_check(path: &Path) -> Status {
    if path.is_dir() {
        Status::Ok
    } else {
        Status::NotFound
    }
}

fn opa_check(bin: &str) -> Check {
    let Ok(path) = which::which(bin) else {
        return Check::new(Status::NotFound, Some(format!("{bin} not in PATH")));
    };
    match Command::new(&path).arg("version").output() {
        Ok(out) if out.status.success() => {
            let first = String::from_utf8_lossy(&out.stdout)
                .lines()
                .next()
                .unwrap_or("")
                .trim()
                .to_string();
            Check::new(Status::Ok, Some(format!("{} ({first})", path.display())))
        }
        Ok(out) => Check::new(Status::Unknown, Some(format!("exit: {}", out.status))),
        Err(e) => Check::new(Status::Unknown, Some(e.to_string())),
    }
}

pub fn gather_report(cfg: &Config) -> Result<DoctorReport> {
    let registry = ServiceRegistry::from_config(cfg)?;
    let root = registry.project_root();
    let services = registry
        .iter()
        .map(|(service, base)| ServiceCheck {
            service,
            path: base.display().to_string(),
            status: dir_check(base),
        })
        .collect();

    let (opa, policy_file) = if cfg.policy.enabled {
        let policy = cfg.policy.policy_file(root);
        let policy_status = if policy.is_file() {
            Status::Ok
        } else {
            Status::NotFound
        };
        (
            opa_check(&cfg.policy.opa_bin),
            Check::new(policy_status, Some(policy.display().to_string())),
        )
    } else {
        (
            Check::new(Status::Disabled, None),
            Check::new(Status::Disabled, None),
        )
    };

    Ok(DoctorReport {
        project_root: Check::new(dir_check(root), Some(root.display().to_string())),
        services,
        opa,
        policy_file,
        policy_required: cfg.policy.required,
    })
}

fn icon(s: &Status) -> &'static str {
    match s {
        Status::Ok => "✔",
        Status::NotFound => "✖",
        Status::Unknown => "?",
        Status::Disabled => "-",
    }
}

pub fn print_human(report: &DoctorReport) {
    println!("== fsgate doctor ==");
    let line = |label: &str, c: &Check| {
        println!("{label}: {} {}", icon(&c.status), c.detail.as_deref().unwrap_or(""));
    };
    line("project root", &report.project_root);
    for s in &report.services {
        println!("  {:<10} {} {}", s.service.as_str(), icon(&s.status), s.path);
    }
    line("opa", &report.opa);
    line("policy", &report.policy_file);
    if report.policy_required {
        println!("policy enforcement: required (calls are denied while OPA is unavailable)");
    }
}

pub fn print_json(report: &DoctorReport) -> Result<()> {
    let s = serde_json::to_string_pretty(report)?;
    println!("{s}");
    Ok(())
}

pub fn exit_code(report: &DoctorReport) -> i32 {
    let fine = |s: &Status| matches!(s, Status::Ok | Status::Disabled);
    let bad = !fine(&report.project_root.status)
        || report.services.iter().any(|s| !fine(&s.status))
        || !fine(&report.opa.status)
        || !fine(&report.policy_file.status);
    if bad {
        2
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("api")).unwrap();
        let mut cfg = Config {
            project_root: dir.path().to_path_buf(),
            ..Config::default()
        };
        cfg.policy.enabled = false;

        let report = gather_report(&cfg).unwrap();
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["project_root"]["status"], "ok");
        assert_eq!(v["opa"]["status"], "disabled");
        assert_eq!(v["services"][0]["service"], "api");
        assert_eq!(v["services"][0]["status"], "ok");
        assert_eq!(v["services"][1]["status"], "not_found");
        // missing service directories fail strict mode
        assert_eq!(exit_code(&report), 2);
    }

    #[test]
    fn missing_policy_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            project_root: dir.path().to_path_buf(),
            ..Config::default()
        };
        let report = gather_report(&cfg).unwrap();
        assert_eq!(report.policy_file.status, Status::NotFound);
        assert!(report
            .policy_file
            .detail
            .as_deref()
            .unwrap()
            .ends_with("tool-io.rego"));
    }
}
