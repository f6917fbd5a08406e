//! Bounded fixed-interval polling.
//!
//! Every wait in the startup sequence (network reachability, process
//! existence, window availability) is the same loop: probe, sleep a
//! fixed interval, try again, give up after a fixed number of attempts.
//! `poll_until` is that loop once, with the probe injected so tests can
//! count invocations exactly.

use std::thread;
use std::time::Duration;

/// Attempt ceiling and sleep interval for one wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of probe invocations before giving up
    pub max_attempts: u32,
    /// Fixed sleep between attempts
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            interval,
        }
    }
}

/// Result of a bounded poll. Timing out is an outcome, not an error;
/// callers decide whether it is fatal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The probe produced a value on some attempt
    Succeeded(T),
    /// Every attempt came back empty
    TimedOut,
}

/// Run `probe` until it yields a value or the policy is exhausted.
///
/// The first attempt happens immediately. The probe receives the
/// 1-based attempt number (for per-attempt log lines at the call
/// site). Sleeps happen between attempts only; after the final failed
/// attempt the loop returns without sleeping. A policy with
/// `max_attempts == 0` never invokes the probe.
pub fn poll_until<T, F>(policy: RetryPolicy, mut probe: F) -> PollOutcome<T>
where
    F: FnMut(u32) -> Option<T>,
{
    for attempt in 1..=policy.max_attempts {
        if let Some(value) = probe(attempt) {
            return PollOutcome::Succeeded(value);
        }
        if attempt < policy.max_attempts && !policy.interval.is_zero() {
            thread::sleep(policy.interval);
        }
    }
    PollOutcome::TimedOut
}
