//! Network reachability wait.
//!
//! The simulator authenticates against its licensing service at boot,
//! so the sequence holds until the LAN's uplink actually works. The
//! check is one ICMP echo per attempt against a public anycast host,
//! shelled out to the system `ping` binary (raw ICMP sockets would need
//! elevation on Windows, the stock command does not).

use std::process::Command;
use std::time::Duration;

use tracing::{debug, info};

use crate::poll::{poll_until, PollOutcome, RetryPolicy};

/// Host probed for reachability. Google public DNS answers ICMP from
/// anywhere a rig could plausibly be installed.
const PROBE_HOST: &str = "8.8.8.8";

/// A yes/no connectivity check, injectable for tests.
pub trait Connectivity {
    fn is_online(&mut self) -> bool;
}

/// One `ping` invocation per probe, output discarded, exit status is
/// the answer.
pub struct PingProbe {
    timeout: Duration,
}

impl PingProbe {
    pub fn new(timeout: Duration) -> Self {
        PingProbe { timeout }
    }

    // Windows ping takes the echo timeout in milliseconds via -w
    #[cfg(windows)]
    fn ping_args(&self) -> Vec<String> {
        let ms = self.timeout.as_millis().max(1000);
        vec![
            "-n".into(),
            "1".into(),
            "-w".into(),
            ms.to_string(),
            PROBE_HOST.into(),
        ]
    }

    // Unix ping takes the echo timeout in whole seconds via -W
    #[cfg(not(windows))]
    fn ping_args(&self) -> Vec<String> {
        let secs = self.timeout.as_secs().max(1);
        vec![
            "-c".into(),
            "1".into(),
            "-W".into(),
            secs.to_string(),
            PROBE_HOST.into(),
        ]
    }
}

impl Connectivity for PingProbe {
    fn is_online(&mut self) -> bool {
        match Command::new("ping").args(self.ping_args()).output() {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!("ping invocation failed: {}", e);
                false
            }
        }
    }
}

/// Block until the network answers or the retry budget runs out.
pub fn wait_for_network(net: &mut dyn Connectivity, policy: RetryPolicy) -> PollOutcome<()> {
    poll_until(policy, |attempt| {
        if net.is_online() {
            info!("Network is reachable");
            Some(())
        } else {
            info!(
                "Network not reachable yet (attempt {}/{})",
                attempt, policy.max_attempts
            );
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedNet {
        answers: VecDeque<bool>,
        calls: u32,
    }

    impl ScriptedNet {
        fn new(answers: &[bool]) -> Self {
            ScriptedNet {
                answers: answers.iter().copied().collect(),
                calls: 0,
            }
        }
    }

    impl Connectivity for ScriptedNet {
        fn is_online(&mut self) -> bool {
            self.calls += 1;
            self.answers.pop_front().unwrap_or(false)
        }
    }

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[test]
    fn test_wait_succeeds_once_online() {
        let mut net = ScriptedNet::new(&[false, false, true]);
        let outcome = wait_for_network(&mut net, instant(10));
        assert_eq!(outcome, PollOutcome::Succeeded(()));
        assert_eq!(net.calls, 3);
    }

    #[test]
    fn test_wait_exhausts_budget_offline() {
        let mut net = ScriptedNet::new(&[]);
        let outcome = wait_for_network(&mut net, instant(4));
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(net.calls, 4);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_ping_args_unix() {
        let probe = PingProbe::new(Duration::from_secs(2));
        assert_eq!(probe.ping_args(), vec!["-c", "1", "-W", "2", "8.8.8.8"]);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_ping_args_minimum_one_second() {
        let probe = PingProbe::new(Duration::ZERO);
        assert_eq!(probe.ping_args(), vec!["-c", "1", "-W", "1", "8.8.8.8"]);
    }

    #[cfg(windows)]
    #[test]
    fn test_ping_args_windows() {
        let probe = PingProbe::new(Duration::from_secs(2));
        assert_eq!(probe.ping_args(), vec!["-n", "1", "-w", "2000", "8.8.8.8"]);
    }
}
