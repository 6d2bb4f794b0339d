// # -----------------------------
// # crates/gateway/src/dispatch.rs
// # -----------------------------
use crate::error::GateError;
use crate::handlers::Gateway;
use crate::limits::{ConcurrencyLimiter, RateLimiter};
use crate::result::ToolResult;
use crate::schema::ToolName;
use fsgate_backend_opa::{oracle_from_config, PolicyOracle};
use fsgate_common::{Config, ConfigError, LimitsCfg, ServiceRegistry};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    read: Duration,
    list: Duration,
    search: Duration,
}

impl Timeouts {
    fn from_limits(l: &LimitsCfg) -> Self {
        Self {
            read: Duration::from_millis(l.read_timeout_ms),
            list: Duration::from_millis(l.list_timeout_ms),
            search: Duration::from_millis(l.search_timeout_ms),
        }
    }

    fn for_tool(&self, tool: ToolName) -> Duration {
        match tool {
            ToolName::ReadMultiServiceFile | ToolName::GetProjectStructure => self.read,
            ToolName::ListServiceFiles => self.list,
            ToolName::SearchAcrossServices => self.search,
        }
    }
}

/// Front door for tool calls: rate limit, concurrency slot, per-tool timeout, telemetry.
pub struct Dispatcher {
    gateway: Gateway,
    rate: RateLimiter,
    concurrency: ConcurrencyLimiter,
    timeouts: Timeouts,
    telemetry: bool,
}

impl Dispatcher {
    /// Builds every component from configuration, OPA oracle included.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let registry = ServiceRegistry::from_config(cfg)?;
        let oracle = oracle_from_config(&cfg.policy, registry.project_root());
        Self::with_oracle(cfg, oracle)
    }

    pub fn with_oracle(cfg: &Config, oracle: Arc<dyn PolicyOracle>) -> Result<Self, ConfigError> {
        let gateway = Gateway::new(cfg, oracle)?;
        Ok(Self {
            gateway,
            rate: RateLimiter::new(
                cfg.limits.rate_limit,
                Duration::from_millis(cfg.limits.rate_interval_ms),
            ),
            concurrency: ConcurrencyLimiter::new(cfg.limits.max_concurrency),
            timeouts: Timeouts::from_limits(&cfg.limits),
            telemetry: cfg.telemetry.enabled,
        })
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn in_flight(&self) -> usize {
        self.concurrency.in_flight()
    }

    pub async fn call(&self, tool: &str, args: &Value) -> ToolResult {
        let id = Uuid::new_v4();
        let span = if self.telemetry {
            tracing::info_span!("tool_call", %id, tool)
        } else {
            tracing::debug_span!("tool_call", %id, tool)
        };
        async {
            let started = Instant::now();
            let (result, outcome) = self.dispatch(tool, args).await;
            let duration_ms = started.elapsed().as_millis() as u64;
            if self.telemetry {
                tracing::info!(duration_ms, outcome, "tool call finished");
            } else {
                tracing::debug!(duration_ms, outcome, "tool call finished");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, tool: &str, args: &Value) -> (ToolResult, &'static str) {
        if !self.rate.try_acquire() {
            return (ToolResult::error(GateError::RateLimited.to_string()), "rate_limited");
        }
        let name = match tool.parse::<ToolName>() {
            Ok(n) => n,
            Err(e) => return (ToolResult::error(e.to_string()), "unknown_tool"),
        };
        let limit = self.timeouts.for_tool(name);

        let timed = self
            .concurrency
            .run(tokio::time::timeout(limit, self.gateway.handle(name, args)))
            .await;
        let timed = match timed {
            Ok(t) => t,
            Err(e) => {
                let err = GateError::Internal(format!("concurrency limiter: {e}"));
                tracing::error!(error = %err, "no slot for tool call");
                return (ToolResult::error(err.to_string()), "error");
            }
        };
        match timed {
            Ok(result) => {
                let outcome = if result.is_error { "error" } else { "ok" };
                (result, outcome)
            }
            Err(_) => {
                if let Some(op) = name.op_kind() {
                    self.gateway.breakers().get(op).failure();
                }
                let err = GateError::Timeout(limit.as_millis() as u64);
                (ToolResult::error(err.to_string()), "timeout")
            }
        }
    }
}
