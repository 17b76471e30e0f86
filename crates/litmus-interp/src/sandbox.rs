// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Policy enforcement inside the interpreter.
//!
//! The interpreter charges one step per statement, loop iteration and call,
//! and checks the interrupt flag on every step, so a runaway snippet is
//! stopped without any cooperation from the script. Host primitives are
//! gated by a capability allow-list.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// A class of host primitives a snippet may be allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Print,
    Assert,
    Fs,
    Net,
    Process,
    Timers,
    Random,
    Clock,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::Print,
        Capability::Assert,
        Capability::Fs,
        Capability::Net,
        Capability::Process,
        Capability::Timers,
        Capability::Random,
        Capability::Clock,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Print => "print",
            Capability::Assert => "assert",
            Capability::Fs => "fs",
            Capability::Net => "net",
            Capability::Process => "process",
            Capability::Timers => "timers",
            Capability::Random => "random",
            Capability::Clock => "clock",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capability '{0}' (expected one of: print, assert, fs, net, process, timers, random, clock)")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| UnknownCapability(s.trim().to_string()))
    }
}

/// The immutable allow-list, shared read-only across workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    allowed: BTreeSet<Capability>,
}

impl CapabilitySet {
    pub fn new(caps: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            allowed: caps.into_iter().collect(),
        }
    }

    pub fn allows(&self, cap: Capability) -> bool {
        self.allowed.contains(&cap)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.allowed.iter().copied()
    }
}

impl Default for CapabilitySet {
    /// Print and assert primitives only.
    fn default() -> Self {
        Self::new([Capability::Print, Capability::Assert])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptReason {
    Timeout,
    Cancelled,
}

/// Forced-cancellation flag set by a watchdog or a run-wide cancel and
/// observed by the interpreter on every step.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicU8>);

impl Interrupt {
    const NONE: u8 = 0;
    const TIMEOUT: u8 = 1;
    const CANCELLED: u8 = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// The first reason wins; later triggers are ignored.
    pub fn trigger(&self, reason: InterruptReason) {
        let code = match reason {
            InterruptReason::Timeout => Self::TIMEOUT,
            InterruptReason::Cancelled => Self::CANCELLED,
        };
        let _ = self
            .0
            .compare_exchange(Self::NONE, code, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn reason(&self) -> Option<InterruptReason> {
        match self.0.load(Ordering::Relaxed) {
            Self::TIMEOUT => Some(InterruptReason::Timeout),
            Self::CANCELLED => Some(InterruptReason::Cancelled),
            _ => None,
        }
    }

    pub fn reset(&self) {
        self.0.store(Self::NONE, Ordering::SeqCst);
    }
}

/// Why evaluation was aborted. Halts are not catchable by `try`/`catch`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Halt {
    #[error("step budget of {0} exhausted")]
    StepBudget(u64),
    #[error("evaluation timed out")]
    Timeout,
    #[error("run cancelled")]
    Cancelled,
    #[error("capability '{0}' is not allowed")]
    CapabilityDenied(Capability),
    #[error("output exceeded {0} bytes")]
    OutputLimit(usize),
}

impl Halt {
    /// Machine-readable reason recorded in reports.
    pub fn reason(&self) -> String {
        match self {
            Halt::StepBudget(_) => "step-budget".to_string(),
            Halt::Timeout => "timeout".to_string(),
            Halt::Cancelled => "cancelled".to_string(),
            Halt::CapabilityDenied(cap) => format!("capability-denied:{}", cap),
            Halt::OutputLimit(_) => "output-limit".to_string(),
        }
    }

    /// Budget and clock halts count as timeouts; the rest are policy violations.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Halt::StepBudget(_) | Halt::Timeout | Halt::Cancelled)
    }
}

/// Per-context sandbox settings.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub capabilities: Arc<CapabilitySet>,
    pub max_steps: Option<u64>,
    pub max_output_bytes: Option<usize>,
    pub max_call_depth: usize,
    pub random_seed: u64,
    pub interrupt: Interrupt,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            capabilities: Arc::new(CapabilitySet::default()),
            max_steps: Some(1_000_000),
            max_output_bytes: Some(1024 * 1024),
            max_call_depth: 500,
            random_seed: 0x5EED,
            interrupt: Interrupt::new(),
        }
    }
}

/// Step counter with interrupt polling.
#[derive(Debug)]
pub(crate) struct Meter {
    used: u64,
    max: Option<u64>,
    interrupt: Interrupt,
}

impl Meter {
    pub(crate) fn new(max: Option<u64>, interrupt: Interrupt) -> Self {
        Self { used: 0, max, interrupt }
    }

    pub(crate) fn charge(&mut self, steps: u64) -> Result<(), Halt> {
        self.used = self.used.saturating_add(steps);
        match self.interrupt.reason() {
            Some(InterruptReason::Timeout) => return Err(Halt::Timeout),
            Some(InterruptReason::Cancelled) => return Err(Halt::Cancelled),
            None => {}
        }
        match self.max {
            Some(max) if self.used > max => Err(Halt::StepBudget(max)),
            _ => Ok(()),
        }
    }

    pub(crate) fn used(&self) -> u64 {
        self.used
    }

    pub(crate) fn reset(&mut self) {
        self.used = 0;
    }
}

/// Captured print lines with a byte ceiling.
#[derive(Debug, Default)]
pub(crate) struct OutputSink {
    lines: Vec<String>,
    bytes: usize,
    limit: Option<usize>,
}

impl OutputSink {
    pub(crate) fn new(limit: Option<usize>) -> Self {
        Self {
            lines: Vec::new(),
            bytes: 0,
            limit,
        }
    }

    /// Record one line. A line that would cross the limit halts the block
    /// with [`Halt::OutputLimit`]; lines captured before it are kept.
    pub(crate) fn push(&mut self, line: String) -> Result<(), Halt> {
        let size = line.len() + 1;
        if let Some(limit) = self.limit {
            if self.bytes + size > limit {
                return Err(Halt::OutputLimit(limit));
            }
        }
        self.bytes += size;
        self.lines.push(line);
        Ok(())
    }

    pub(crate) fn take(&mut self) -> Vec<String> {
        self.bytes = 0;
        std::mem::take(&mut self.lines)
    }
}

/// Seeded generator behind `Math.random`; the same seed replays the
/// same sequence.
#[derive(Debug, Clone)]
pub(crate) struct SeededRng {
    rng: StdRng,
}

impl SeededRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform in `[0, 1)`.
    pub(crate) fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_parsing() {
        assert_eq!("fs".parse::<Capability>(), Ok(Capability::Fs));
        assert_eq!(" timers ".parse::<Capability>(), Ok(Capability::Timers));
        assert!("disk".parse::<Capability>().is_err());
    }

    #[test]
    fn default_allow_list_is_print_and_assert() {
        let caps = CapabilitySet::default();
        assert!(caps.allows(Capability::Print));
        assert!(caps.allows(Capability::Assert));
        for cap in [Capability::Fs, Capability::Net, Capability::Process, Capability::Timers, Capability::Random, Capability::Clock] {
            assert!(!caps.allows(cap), "{} should be denied", cap);
        }
    }

    #[test]
    fn halt_reasons() {
        assert_eq!(Halt::StepBudget(10).reason(), "step-budget");
        assert_eq!(Halt::CapabilityDenied(Capability::Net).reason(), "capability-denied:net");
        assert!(Halt::Timeout.is_timeout());
        assert!(!Halt::OutputLimit(5).is_timeout());
    }

    #[test]
    fn meter_enforces_budget_and_interrupt() {
        let interrupt = Interrupt::new();
        let mut meter = Meter::new(Some(3), interrupt.clone());
        assert!(meter.charge(3).is_ok());
        assert_eq!(meter.charge(1), Err(Halt::StepBudget(3)));

        let mut meter = Meter::new(None, interrupt.clone());
        interrupt.trigger(InterruptReason::Timeout);
        interrupt.trigger(InterruptReason::Cancelled);
        assert_eq!(meter.charge(1), Err(Halt::Timeout));
        interrupt.reset();
        assert!(meter.charge(1).is_ok());
    }

    #[test]
    fn output_sink_limit() {
        let mut sink = OutputSink::new(Some(8));
        assert!(sink.push("abc".into()).is_ok());
        assert_eq!(sink.push("abcd".into()), Err(Halt::OutputLimit(8)));
        assert_eq!(sink.take(), vec!["abc".to_string()]);
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let mut a = SeededRng::new(42);
        let mut b = SeededRng::new(42);
        for _ in 0..10 {
            let x = a.next_f64();
            assert_eq!(x, b.next_f64());
            assert!((0.0..1.0).contains(&x));
        }
        assert_ne!(SeededRng::new(1).next_f64(), SeededRng::new(2).next_f64());
    }
}
