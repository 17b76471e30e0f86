// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Execute one code block inside an execution context.

use std::time::Instant;

use litmus_interp::{error_parts, inspect, Outcome};
use tracing::debug;

use crate::context::ExecutionContext;
use crate::extract::CodeBlock;
use crate::policy::Watchdog;
use crate::report::{BlockOutcome, ExecutionResult};

/// Evaluate `block` in `context` under the run's wall-clock limit.
///
/// Never fails: throws and policy halts become the block's outcome, and
/// the context stays usable for the blocks that follow.
pub fn execute(block: &CodeBlock, context: &mut ExecutionContext) -> ExecutionResult {
    let interrupt = context.interp.config().interrupt.clone();
    interrupt.reset();

    let started = Instant::now();
    let evaluation = {
        let _watchdog = Watchdog::arm(interrupt, context.timeout, context.cancel.clone());
        context.interp.eval(&block.source)
    };
    let duration = started.elapsed();

    let outcome = match &evaluation.outcome {
        Outcome::Completed(value) => BlockOutcome::Completed {
            value: inspect(value),
        },
        Outcome::Thrown(value) => {
            let (name, message) = error_parts(value);
            BlockOutcome::Thrown { name, message }
        }
        Outcome::Halted(halt) if halt.is_timeout() => BlockOutcome::TimedOut {
            reason: halt.reason(),
        },
        Outcome::Halted(halt) => BlockOutcome::PolicyViolation {
            reason: halt.reason(),
        },
    };

    debug!(
        line = block.start_line,
        status = outcome.status(),
        steps = evaluation.steps,
        elapsed_us = duration.as_micros() as u64,
        "block executed"
    );

    ExecutionResult {
        line: block.start_line,
        outcome,
        output: evaluation.output,
        soft_failures: evaluation.soft_failures,
        expected_output: block.expected_output.clone(),
        expect_error: block.annotations.expect_error.clone(),
        duration,
        steps: evaluation.steps,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::ContextManager;
    use crate::extract::extract;
    use crate::policy::{CancelToken, PolicyConfig};

    fn run_blocks(policy: PolicyConfig, markdown: &str) -> Vec<ExecutionResult> {
        let doc = extract("doc.md", markdown).unwrap();
        let caps = Arc::new(policy.allow.clone());
        let manager = ContextManager::new(&policy, caps, CancelToken::new());
        let mut run = manager.begin(&doc);
        doc.runnable_blocks()
            .map(|block| execute(block, run.context_for(block)))
            .collect()
    }

    #[test]
    fn test_completed_block_captures_output_and_value() {
        let results = run_blocks(
            PolicyConfig::default(),
            "```js runnable\nconsole.log('hi', 1 + 1);\n'done'\n```\n",
        );
        assert_eq!(results[0].output, vec!["hi 2"]);
        assert_eq!(
            results[0].outcome,
            BlockOutcome::Completed {
                value: "'done'".to_string()
            }
        );
        assert!(results[0].steps > 0);
    }

    #[test]
    fn test_throw_is_rendered() {
        let results = run_blocks(
            PolicyConfig::default(),
            "```js runnable\nnull.x\n```\n",
        );
        match &results[0].outcome {
            BlockOutcome::Thrown { name, .. } => assert_eq!(name, "TypeError"),
            other => panic!("expected a throw, got {:?}", other),
        }
    }

    #[test]
    fn test_halts_map_to_timeouts_and_violations() {
        let policy = PolicyConfig {
            max_steps: Some(1_000),
            ..PolicyConfig::default()
        };
        let results = run_blocks(
            policy,
            "```js runnable\nwhile (true) {}\n```\n```js runnable\nMath.random()\n```\n",
        );
        assert_eq!(
            results[0].outcome,
            BlockOutcome::TimedOut {
                reason: "step-budget".to_string()
            }
        );
        assert_eq!(
            results[1].outcome,
            BlockOutcome::PolicyViolation {
                reason: "capability-denied:random".to_string()
            }
        );
    }

    #[test]
    fn test_wall_clock_timeout() {
        let policy = PolicyConfig {
            timeout_ms: 50,
            max_steps: None,
            ..PolicyConfig::default()
        };
        let results = run_blocks(policy, "```js runnable\nfor (;;) {}\n```\n");
        assert_eq!(
            results[0].outcome,
            BlockOutcome::TimedOut {
                reason: "timeout".to_string()
            }
        );
    }
}
