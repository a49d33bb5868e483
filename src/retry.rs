//! Generic bounded-retry primitive shared by submit, status, and kill.
//!
//! The schedule starts at a 2s interval and doubles after each failed
//! attempt, sleeping only while there is still enough timeout budget left
//! for the sleep to complete. A small random jitter is added on top of each
//! sleep to desynchronize concurrent callers retrying the same command.

use std::time::Duration;

/// Pure description of a retry/backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedule {
    pub initial_interval: Duration,
    pub factor: u32,
    pub timeout: Duration,
    pub jitter_cap: Duration,
}

impl RetrySchedule {
    /// The schedule used by every command in this driver: 2s initial
    /// interval, doubling, up to `jitter_cap` of desync jitter per retry.
    pub fn new(timeout: Duration) -> Self {
        Self {
            initial_interval: Duration::from_secs(2),
            factor: 2,
            timeout,
            jitter_cap: Duration::from_secs(2),
        }
    }
}

/// Abstracts "sleep for this long" so tests can run a full backoff sequence
/// without actually waiting. Production code uses `ThreadSleeper`.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the calling thread using `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Produces the uniform `0..jitter_cap` desync delay. Production code draws
/// from `rand::thread_rng`; tests can inject a deterministic source.
pub trait Jitter: Send + Sync {
    fn jitter(&self, cap: Duration) -> Duration;
}

/// Draws jitter from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandJitter;

impl Jitter for RandJitter {
    fn jitter(&self, cap: Duration) -> Duration {
        if cap.is_zero() {
            return Duration::ZERO;
        }
        let micros = rand::Rng::gen_range(&mut rand::thread_rng(), 0..=cap.as_micros());
        Duration::from_micros(micros as u64)
    }
}

/// Outcome of a retry loop: the last attempt's value plus bookkeeping useful
/// for logging (how many attempts, how long we slept in total).
#[derive(Debug, Clone)]
pub struct RetryOutcome<T> {
    pub value: T,
    pub attempts: u32,
    pub slept: Duration,
}

/// Runs `attempt` until it reports success or the schedule's timeout budget
/// is exhausted. `attempt` receives the 1-based attempt number and returns
/// `(value, success)`. Returns the last outcome either way; callers decide
/// what "exhausted" means for their own error reporting.
pub fn retry<T>(
    schedule: &RetrySchedule,
    sleeper: &dyn Sleeper,
    jitter: &dyn Jitter,
    mut attempt: impl FnMut(u32) -> (T, bool),
) -> RetryOutcome<T> {
    let mut interval = schedule.initial_interval;
    let mut slept = Duration::ZERO;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let (value, success) = attempt(attempts);
        if success {
            return RetryOutcome {
                value,
                attempts,
                slept,
            };
        }
        if slept + interval <= schedule.timeout {
            sleeper.sleep(interval);
            sleeper.sleep(jitter.jitter(schedule.jitter_cap));
            slept += interval;
            interval *= schedule.factor;
        } else {
            return RetryOutcome {
                value,
                attempts,
                slept,
            };
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
