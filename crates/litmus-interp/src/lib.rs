// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Tree-walk interpreter for the Litmus scripting language.
//!
//! Executes snippet ASTs directly inside a sandbox: every evaluation is
//! metered, capability-checked and has its printed output captured.

mod value;
mod env;
mod coerce;
mod format;
mod sandbox;
mod interp;
mod builtins;

pub use coerce::number_to_string;
pub use format::{display, error_parts, inspect};
pub use interp::{Evaluation, Interpreter, Outcome, RuntimeError};
pub use sandbox::{
    Capability, CapabilitySet, Halt, Interrupt, InterruptReason, SandboxConfig, UnknownCapability,
};
pub use value::Value;
