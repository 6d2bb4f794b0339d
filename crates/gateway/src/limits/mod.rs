// # -----------------------------
// # crates/gateway/src/limits/mod.rs
// # -----------------------------
//! Admission control: token bucket, per-operation circuit breakers, global concurrency gate.

mod breaker;
mod concurrency;
mod rate;

pub use breaker::{BreakerState, Breakers, CircuitBreaker, OpKind};
pub use concurrency::ConcurrencyLimiter;
pub use rate::RateLimiter;

/// Recovers the guard from a poisoned lock; the protected state is plain counters.
fn relock<T>(r: std::sync::LockResult<T>) -> T {
    r.unwrap_or_else(std::sync::PoisonError::into_inner)
}
