// # -----------------------------
// # crates/gateway/src/handlers.rs
// # -----------------------------
use crate::error::GateError;
use crate::limits::{Breakers, OpKind};
use crate::result::ToolResult;
use crate::schema::{ListArgs, ReadArgs, SearchArgs, ToolCall, ToolName};
use fsgate_backend_opa::{Decision, Gate, PolicyOracle};
use fsgate_common::{Config, ConfigError, SearchCfg, ServiceName, ServiceRegistry};
use fsgate_sandbox::{PathGuard, Redactor, SandboxError, PLACEHOLDER};
use fsgate_tools::fs::{self as bounded, EntryKind};
use fsgate_tools::search::{self, WalkLimits};
use fsgate_tools::structure::project_structure;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct ListedEntry {
    name: String,
    #[serde(rename = "type")]
    kind: EntryKind,
    path: String,
}

#[derive(Debug, Serialize)]
struct SearchHit {
    service: ServiceName,
    path: String,
    line: usize,
    snippet: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchReport {
    results: Vec<SearchHit>,
    files_scanned: usize,
    matches_found: usize,
    truncated: bool,
}

/// Operation handlers over the sandboxed service tree. Every failure becomes an
/// error result and is reported to the breaker of its operation kind.
pub struct Gateway {
    registry: ServiceRegistry,
    guard: PathGuard,
    redactor: Redactor,
    oracle: Arc<dyn PolicyOracle>,
    breakers: Breakers,
    max_file_bytes: u64,
    max_list_entries: usize,
    search: SearchCfg,
}

impl Gateway {
    pub fn new(cfg: &Config, oracle: Arc<dyn PolicyOracle>) -> Result<Self, ConfigError> {
        let redactor = Redactor::new(&cfg.sandbox.extra_redactions)
            .map_err(|e| ConfigError::Invalid(format!("sandbox.extra_redactions: {e}")))?;
        Ok(Self {
            registry: ServiceRegistry::from_config(cfg)?,
            guard: PathGuard::new(&cfg.sandbox),
            redactor,
            oracle,
            breakers: Breakers::new(cfg.limits.breaker),
            max_file_bytes: cfg.sandbox.max_file_bytes,
            max_list_entries: cfg.sandbox.max_list_entries,
            search: cfg.search.clone(),
        })
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn breakers(&self) -> &Breakers {
        &self.breakers
    }

    pub async fn handle(&self, tool: ToolName, args: &Value) -> ToolResult {
        let Some(op) = tool.op_kind() else {
            return self.structure();
        };
        let breaker = self.breakers.get(op);
        if !breaker.allow() {
            let err = GateError::CircuitOpen(op);
            tracing::debug!(class = err.class().as_str(), "circuit open, call rejected");
            return ToolResult::error(format!("{}: {err}", failure_prefix(op)));
        }

        let outcome = match ToolCall::parse(tool, args) {
            Ok(ToolCall::Read(a)) => self.read(a).await,
            Ok(ToolCall::List(a)) => self.list(a).await,
            Ok(ToolCall::Search(a)) => self.search(a).await,
            Ok(ToolCall::Structure) => Ok(String::new()),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(text) => {
                breaker.success();
                ToolResult::ok(text)
            }
            Err(e) => {
                breaker.failure();
                if e.class() == crate::ErrorClass::Internal {
                    tracing::warn!(op = %op, error = %e, "tool call failed");
                } else {
                    tracing::debug!(
                        op = %op,
                        class = e.class().as_str(),
                        error = %e,
                        "tool call failed"
                    );
                }
                ToolResult::error(format!("{}: {e}", failure_prefix(op)))
            }
        }
    }

    async fn gate(&self, gate: Gate, input: Value) -> Result<(), GateError> {
        match self.oracle.decide(gate, &input).await {
            Decision::Deny => Err(GateError::PolicyDenied),
            Decision::Allow | Decision::Unknown => Ok(()),
        }
    }

    async fn service_base(&self, service: ServiceName) -> Result<&Path, GateError> {
        let base = self.registry.base(service);
        match tokio::fs::metadata(base).await {
            Ok(m) if m.is_dir() => Ok(base),
            _ => Err(GateError::ServiceMissing(service)),
        }
    }

    async fn read(&self, args: ReadArgs) -> Result<String, GateError> {
        self.gate(
            Gate::Input,
            json!({"service": args.service, "filePath": args.file_path}),
        )
        .await?;
        let base = self.service_base(args.service).await?;
        let path = self.guard.resolve(base, &args.file_path).await?;
        let raw = bounded::read_capped(&path, self.max_file_bytes).await?;
        let content = self.redactor.redact(&raw);
        self.gate(Gate::Output, json!({ "content": content })).await?;
        Ok(format!("File: {}/{}\n\n{}", args.service, args.file_path, content))
    }

    async fn list(&self, args: ListArgs) -> Result<String, GateError> {
        let dir = args.directory.trim();
        let dir = if dir.is_empty() { "." } else { dir };
        if dir.chars().count() > self.guard.max_path_len() {
            return Err(SandboxError::TooLong {
                len: dir.chars().count(),
                max: self.guard.max_path_len(),
            }
            .into());
        }
        if Path::new(dir).is_absolute()
            || dir.starts_with(['/', '\\'])
            || dir.split(['/', '\\']).any(|seg| seg == "..")
        {
            return Err(SandboxError::Traversal.into());
        }

        self.gate(
            Gate::Input,
            json!({"service": args.service, "filePath": dir}),
        )
        .await?;
        let base = self.service_base(args.service).await?;
        let path = self.guard.resolve(base, dir).await?;
        let raw = bounded::list_dir(&path, self.max_list_entries).await?;

        let prefix = dir.trim_end_matches(['/', '\\']);
        let entries: Vec<ListedEntry> = raw
            .into_iter()
            .filter(|e| self.guard.is_visible_name(&e.name))
            .filter(|e| !self.guard.is_blocked(&entry_probe(&path, &e.name, e.kind)))
            .map(|e| ListedEntry {
                path: if prefix.is_empty() || prefix == "." {
                    e.name.clone()
                } else {
                    format!("{prefix}/{}", e.name)
                },
                name: e.name,
                kind: e.kind,
            })
            .collect();
        let body = serde_json::to_string_pretty(&entries)
            .map_err(|e| GateError::Internal(e.to_string()))?;
        self.gate(Gate::Output, json!({ "content": body })).await?;
        Ok(format!("Files in {}/{}:\n\n{}", args.service, dir, body))
    }

    async fn search(&self, args: SearchArgs) -> Result<String, GateError> {
        let exts = search::normalize_exts(
            args.file_types
                .as_deref()
                .unwrap_or(&self.search.default_file_types),
        );
        let mut report = SearchReport::default();

        'services: for (service, base) in self.registry.iter() {
            // root overlaps every other service
            if service == ServiceName::Root {
                continue;
            }
            if self.service_base(service).await.is_err() {
                tracing::debug!(service = %service, "service directory missing, skipped");
                continue;
            }
            let budget = self.search.max_files - report.files_scanned;
            // a zero budget still walks, to learn whether anything was left out
            let walk = self.walk(base, &exts, budget).await?;
            if walk.capped {
                report.truncated = true;
            }

            for rel in walk.files {
                let path = match self.guard.resolve(base, &rel).await {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::trace!(
                            service = %service,
                            path = %rel,
                            error = %e,
                            "candidate skipped"
                        );
                        continue;
                    }
                };
                if self
                    .gate(Gate::Input, json!({"service": service, "filePath": rel}))
                    .await
                    .is_err()
                {
                    continue;
                }
                match tokio::fs::metadata(&path).await {
                    Ok(m) if m.len() <= self.max_file_bytes => {}
                    _ => continue,
                }
                let head = bounded::read_head(&path, self.search.max_bytes_per_file).await;
                let Ok(text) = head else {
                    continue;
                };
                report.files_scanned += 1;

                let remaining = self.search.max_matches - report.matches_found;
                let hits = search::scan_lines(&text, &args.query, remaining);
                if hits.is_empty() {
                    continue;
                }
                let blocks = self.redactor.block_spans(&text);
                for hit in hits {
                    let in_block = blocks
                        .iter()
                        .any(|b| b.start < hit.span.end && hit.span.start < b.end);
                    let snippet = if in_block {
                        PLACEHOLDER.to_string()
                    } else {
                        let line = self.redactor.redact(&text[hit.span.clone()]);
                        search::snippet(&line, SNIPPET_CHARS)
                    };
                    report.results.push(SearchHit {
                        service,
                        path: rel.clone(),
                        line: hit.line,
                        snippet,
                    });
                    report.matches_found += 1;
                }
                if report.matches_found >= self.search.max_matches {
                    report.truncated = true;
                    break 'services;
                }
            }
        }

        tracing::debug!(
            files = report.files_scanned,
            matches = report.matches_found,
            truncated = report.truncated,
            "search finished"
        );
        let body = serde_json::to_string_pretty(&report)
            .map_err(|e| GateError::Internal(e.to_string()))?;
        self.gate(Gate::Output, json!({ "content": body })).await?;
        Ok(format!("Search results for \"{}\":\n\n{}", args.query, body))
    }

    async fn walk(
        &self,
        base: &Path,
        exts: &[String],
        budget: usize,
    ) -> Result<search::Walk, GateError> {
        let limits = WalkLimits {
            max_depth: self.search.max_depth,
            max_files: budget,
            ignore_dirs: self.search.ignore_dirs.clone(),
            include_hidden: self.guard.allows_dotfiles(),
        };
        let root = base.to_path_buf();
        let exts = exts.to_vec();
        tokio::task::spawn_blocking(move || search::collect_candidates(&root, &exts, &limits))
            .await
            .map_err(|e| GateError::Internal(format!("walk task: {e}")))
    }

    fn structure(&self) -> ToolResult {
        match serde_json::to_string_pretty(&project_structure(&self.registry)) {
            Ok(body) => ToolResult::ok(format!("Multi-Service Project Structure:\n\n{body}")),
            Err(e) => ToolResult::error(format!("Error describing project: {e}")),
        }
    }
}

fn failure_prefix(op: OpKind) -> &'static str {
    match op {
        OpKind::Read => "Error reading file",
        OpKind::List => "Error listing files",
        OpKind::Search => "Error searching",
    }
}

/// Directories get a trailing separator so `/secrets/`-style patterns match them.
fn entry_probe(dir: &Path, name: &str, kind: EntryKind) -> PathBuf {
    let p = dir.join(name);
    match kind {
        EntryKind::Directory => p.join(""),
        _ => p,
    }
}
