use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Token bucket with lazy refill: every full interval since the last refill
/// adds `capacity` tokens, capped at `capacity`.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    interval: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(capacity: u32, interval: Duration) -> Self {
        Self::starting_at(capacity, interval, Instant::now())
    }

    pub fn starting_at(capacity: u32, interval: Duration, now: Instant) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            interval: interval.max(Duration::from_millis(1)),
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: now,
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut b = super::relock(self.bucket.lock());
        let elapsed = now.saturating_duration_since(b.last_refill);
        let periods = elapsed.as_nanos() / self.interval.as_nanos();
        if periods > 0 {
            let added = u128::from(self.capacity).saturating_mul(periods);
            b.tokens = (u128::from(b.tokens) + added).min(u128::from(self.capacity)) as u32;
            // advance by whole intervals only, so partial progress is kept
            let step = self.interval.as_nanos().saturating_mul(periods);
            b.last_refill += Duration::from_nanos(u64::try_from(step).unwrap_or(u64::MAX));
        }
        if b.tokens > 0 {
            b.tokens -= 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_capacity_admissions_per_window() {
        let t0 = Instant::now();
        let rl = RateLimiter::starting_at(3, Duration::from_millis(1000), t0);
        let within = t0 + Duration::from_millis(999);
        assert!(rl.try_acquire_at(t0));
        assert!(rl.try_acquire_at(t0));
        assert!(rl.try_acquire_at(within));
        assert!(!rl.try_acquire_at(within));
        assert!(rl.try_acquire_at(t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn refill_is_capped_and_keeps_phase() {
        let t0 = Instant::now();
        let rl = RateLimiter::starting_at(2, Duration::from_millis(100), t0);
        assert!(rl.try_acquire_at(t0));
        assert!(rl.try_acquire_at(t0));
        // ten idle intervals still only refill to capacity
        let later = t0 + Duration::from_millis(1050);
        assert!(rl.try_acquire_at(later));
        assert!(rl.try_acquire_at(later));
        assert!(!rl.try_acquire_at(later));
        // last refill sits at t0+1000, so t0+1100 is the next boundary
        assert!(!rl.try_acquire_at(t0 + Duration::from_millis(1099)));
        assert!(rl.try_acquire_at(t0 + Duration::from_millis(1100)));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let rl = RateLimiter::new(0, Duration::from_secs(10));
        assert_eq!(rl.capacity(), 1);
        assert!(rl.try_acquire());
        assert!(!rl.try_acquire());
    }

    #[test]
    fn stale_instants_do_not_refill() {
        let t0 = Instant::now() + Duration::from_secs(5);
        let rl = RateLimiter::starting_at(1, Duration::from_millis(10), t0);
        assert!(rl.try_acquire_at(t0));
        assert!(!rl.try_acquire_at(t0 - Duration::from_secs(1)));
    }
}
