use fsgate_common::BreakerCfg;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Operation kinds that carry their own breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Read,
    List,
    Search,
}

impl OpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Read => "read",
            OpKind::List => "list",
            OpKind::Search => "search",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    half_open_pass: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(cfg: BreakerCfg) -> Self {
        Self {
            threshold: cfg.threshold.max(1),
            cooldown: Duration::from_millis(cfg.cooldown_ms),
            half_open_pass: cfg.half_open_pass.max(1),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        super::relock(self.inner.lock()).state
    }

    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Open breakers move to half-open here, lazily, once the cooldown has elapsed.
    pub fn allow_at(&self, now: Instant) -> bool {
        let mut s = super::relock(self.inner.lock());
        if s.state != BreakerState::Open {
            return true;
        }
        let cooled = s
            .opened_at
            .map_or(true, |at| now.saturating_duration_since(at) >= self.cooldown);
        if cooled {
            s.state = BreakerState::HalfOpen;
            s.failures = 0;
            s.successes = 0;
            tracing::info!("circuit half-open");
        }
        cooled
    }

    pub fn success(&self) {
        let mut s = super::relock(self.inner.lock());
        match s.state {
            BreakerState::HalfOpen => {
                s.successes += 1;
                if s.successes >= self.half_open_pass {
                    s.state = BreakerState::Closed;
                    s.failures = 0;
                    s.successes = 0;
                    s.opened_at = None;
                    tracing::info!("circuit closed");
                }
            }
            _ => s.failures = 0,
        }
    }

    pub fn failure(&self) {
        self.failure_at(Instant::now())
    }

    pub fn failure_at(&self, now: Instant) {
        let mut s = super::relock(self.inner.lock());
        let trip = match s.state {
            BreakerState::HalfOpen => true,
            BreakerState::Closed => {
                s.failures += 1;
                s.failures >= self.threshold
            }
            // a late failure from a call admitted before the trip
            BreakerState::Open => false,
        };
        if trip {
            s.state = BreakerState::Open;
            s.opened_at = Some(now);
            s.failures = 0;
            s.successes = 0;
            tracing::warn!(cooldown_ms = self.cooldown.as_millis() as u64, "circuit open");
        }
    }
}

/// One independent breaker per [`OpKind`].
#[derive(Debug)]
pub struct Breakers {
    read: CircuitBreaker,
    list: CircuitBreaker,
    search: CircuitBreaker,
}

impl Breakers {
    pub fn new(cfg: BreakerCfg) -> Self {
        Self {
            read: CircuitBreaker::new(cfg),
            list: CircuitBreaker::new(cfg),
            search: CircuitBreaker::new(cfg),
        }
    }

    pub fn get(&self, op: OpKind) -> &CircuitBreaker {
        match op {
            OpKind::Read => &self.read,
            OpKind::List => &self.list,
            OpKind::Search => &self.search,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> BreakerCfg {
        BreakerCfg {
            threshold: 3,
            cooldown_ms: 1000,
            half_open_pass: 2,
        }
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let t0 = Instant::now();
        let cb = CircuitBreaker::new(cfg());
        cb.failure_at(t0);
        cb.failure_at(t0);
        cb.success();
        cb.failure_at(t0);
        cb.failure_at(t0);
        assert_eq!(cb.state(), BreakerState::Closed);
        cb.failure_at(t0);
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.allow_at(t0 + Duration::from_millis(999)));
    }

    #[test]
    fn half_open_closes_after_enough_successes() {
        let t0 = Instant::now();
        let cb = CircuitBreaker::new(cfg());
        for _ in 0..3 {
            cb.failure_at(t0);
        }
        let later = t0 + Duration::from_millis(1000);
        assert!(cb.allow_at(later));
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        cb.success();
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        cb.success();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let t0 = Instant::now();
        let cb = CircuitBreaker::new(cfg());
        for _ in 0..3 {
            cb.failure_at(t0);
        }
        let t1 = t0 + Duration::from_millis(1500);
        assert!(cb.allow_at(t1));
        cb.failure_at(t1);
        assert_eq!(cb.state(), BreakerState::Open);
        // cooldown restarts from the reopen
        assert!(!cb.allow_at(t1 + Duration::from_millis(500)));
        assert!(cb.allow_at(t1 + Duration::from_millis(1000)));
    }

    #[test]
    fn breakers_are_independent() {
        let b = Breakers::new(cfg());
        for _ in 0..3 {
            b.get(OpKind::Read).failure();
        }
        assert_eq!(b.get(OpKind::Read).state(), BreakerState::Open);
        assert_eq!(b.get(OpKind::List).state(), BreakerState::Closed);
        assert!(b.get(OpKind::Search).allow());
    }
}
