// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Run-wide execution policy and the wall-clock watchdog.
//!
//! The interpreter enforces the step budget, output ceiling and capability
//! allow-list itself. Wall-clock limits and whole-run cancellation reach it
//! through an [`Interrupt`] set from a watchdog thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use litmus_interp::{CapabilitySet, Interrupt, InterruptReason, SandboxConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Limits applied to every block of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub timeout_ms: u64,
    /// `None` disables the step budget.
    pub max_steps: Option<u64>,
    pub allow: CapabilitySet,
    pub max_output_bytes: Option<usize>,
    pub max_call_depth: usize,
    pub random_seed: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_steps: Some(1_000_000),
            allow: CapabilitySet::default(),
            max_output_bytes: Some(1024 * 1024),
            max_call_depth: 500,
            random_seed: 0x5EED,
        }
    }
}

impl PolicyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Sandbox settings for one new context. Each context gets its own
    /// interrupt; the allow-list is shared.
    pub fn sandbox_config(&self, capabilities: Arc<CapabilitySet>) -> SandboxConfig {
        SandboxConfig {
            capabilities,
            max_steps: self.max_steps,
            max_output_bytes: self.max_output_bytes,
            max_call_depth: self.max_call_depth,
            random_seed: self.random_seed,
            interrupt: Interrupt::new(),
        }
    }
}

/// Whole-run cancellation flag, cheap to clone across workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Watches one block evaluation. Fires the interrupt when the deadline
/// passes or the run is cancelled; dropping it stops the watch.
pub struct Watchdog {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn arm(interrupt: Interrupt, timeout: Duration, cancel: CancelToken) -> Self {
        let (stop, stopped) = mpsc::channel::<()>();
        let deadline = Instant::now() + timeout;
        let spawned = thread::Builder::new()
            .name("litmus-watchdog".to_string())
            .spawn(move || loop {
                if cancel.is_cancelled() {
                    interrupt.trigger(InterruptReason::Cancelled);
                    return;
                }
                let now = Instant::now();
                if now >= deadline {
                    debug!(timeout_ms = timeout.as_millis() as u64, "deadline passed");
                    interrupt.trigger(InterruptReason::Timeout);
                    return;
                }
                match stopped.recv_timeout(POLL_INTERVAL.min(deadline - now)) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            });
        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Still bounded by the step budget.
                warn!(error = %e, "could not start watchdog thread");
                None
            }
        };
        Self {
            stop: Some(stop),
            handle,
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litmus_interp::Capability;

    #[test]
    fn test_defaults_deny_host_capabilities() {
        let policy = PolicyConfig::default();
        assert!(policy.allow.allows(Capability::Print));
        assert!(policy.allow.allows(Capability::Assert));
        for cap in [
            Capability::Fs,
            Capability::Net,
            Capability::Process,
            Capability::Timers,
            Capability::Random,
            Capability::Clock,
        ] {
            assert!(!policy.allow.allows(cap), "{} allowed by default", cap);
        }
    }

    #[test]
    fn test_sandbox_config_carries_limits() {
        let policy = PolicyConfig {
            max_steps: Some(42),
            max_call_depth: 7,
            ..PolicyConfig::default()
        };
        let caps = Arc::new(policy.allow.clone());
        let sandbox = policy.sandbox_config(caps.clone());
        assert_eq!(sandbox.max_steps, Some(42));
        assert_eq!(sandbox.max_call_depth, 7);
        assert!(Arc::ptr_eq(&sandbox.capabilities, &caps));
        assert_eq!(sandbox.interrupt.reason(), None);
    }

    #[test]
    fn test_watchdog_fires_after_deadline() {
        let interrupt = Interrupt::new();
        let watchdog = Watchdog::arm(interrupt.clone(), Duration::from_millis(20), CancelToken::new());
        let start = Instant::now();
        while interrupt.reason().is_none() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        drop(watchdog);
        assert_eq!(interrupt.reason(), Some(InterruptReason::Timeout));
    }

    #[test]
    fn test_watchdog_dropped_early_leaves_interrupt_clear() {
        let interrupt = Interrupt::new();
        drop(Watchdog::arm(interrupt.clone(), Duration::from_secs(60), CancelToken::new()));
        assert_eq!(interrupt.reason(), None);
    }

    #[test]
    fn test_watchdog_reports_cancellation() {
        let interrupt = Interrupt::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let watchdog = Watchdog::arm(interrupt.clone(), Duration::from_secs(60), cancel);
        let start = Instant::now();
        while interrupt.reason().is_none() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        drop(watchdog);
        assert_eq!(interrupt.reason(), Some(InterruptReason::Cancelled));
    }

    #[test]
    fn test_policy_from_toml_keys() {
        let policy: PolicyConfig =
            toml::from_str("timeout_ms = 250\nallow = [\"print\", \"timers\"]\n").unwrap();
        assert_eq!(policy.timeout(), Duration::from_millis(250));
        assert!(policy.allow.allows(Capability::Timers));
        assert!(!policy.allow.allows(Capability::Assert));
        assert_eq!(policy.max_steps, Some(1_000_000));
    }
}
