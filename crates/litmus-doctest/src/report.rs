// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Per-block results and document-level reports.

use std::time::Duration;

use serde::Serialize;

use crate::config::ExpectErrorPolicy;
use crate::extract::{CodeBlock, Document, ExpectError, ParseError};

/// Terminal state of one block, with values and errors in rendered form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum BlockOutcome {
    Completed { value: String },
    Thrown { name: String, message: String },
    TimedOut { reason: String },
    PolicyViolation { reason: String },
    /// Not executed because the run was cancelled.
    Skipped,
}

impl BlockOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            BlockOutcome::Completed { .. } => "completed",
            BlockOutcome::Thrown { .. } => "thrown",
            BlockOutcome::TimedOut { .. } => "timed-out",
            BlockOutcome::PolicyViolation { .. } => "policy-violation",
            BlockOutcome::Skipped => "skipped",
        }
    }
}

/// The result of one runnable block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Start line of the block's opening fence.
    pub line: usize,
    pub outcome: BlockOutcome,
    pub output: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub soft_failures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expect_error: Option<ExpectError>,
    #[serde(rename = "duration_ms", serialize_with = "duration_ms")]
    pub duration: Duration,
    pub steps: u64,
}

impl ExecutionResult {
    pub fn skipped(block: &CodeBlock) -> Self {
        Self {
            line: block.start_line,
            outcome: BlockOutcome::Skipped,
            output: Vec::new(),
            soft_failures: Vec::new(),
            expected_output: block.expected_output.clone(),
            expect_error: block.annotations.expect_error.clone(),
            duration: Duration::ZERO,
            steps: 0,
        }
    }

    /// Failure reason under `policy`, or `None` when the block passed.
    pub fn verdict(&self, policy: ExpectErrorPolicy) -> Option<String> {
        if let BlockOutcome::Skipped = self.outcome {
            return Some("skipped".to_string());
        }
        if let Some(expected) = &self.expect_error {
            return match (&self.outcome, expected) {
                (BlockOutcome::Thrown { name, .. }, ExpectError::Named(declared))
                    if policy == ExpectErrorPolicy::MatchDeclared && name != declared =>
                {
                    Some(format!("wrong-error:{}", name))
                }
                (BlockOutcome::Thrown { .. }, _) => None,
                (BlockOutcome::Completed { .. }, _) => Some("expected-error".to_string()),
                (BlockOutcome::TimedOut { reason }, _)
                | (BlockOutcome::PolicyViolation { reason }, _) => Some(reason.clone()),
                (BlockOutcome::Skipped, _) => Some("skipped".to_string()),
            };
        }
        match &self.outcome {
            BlockOutcome::Thrown { name, .. } => return Some(format!("thrown:{}", name)),
            BlockOutcome::TimedOut { reason } | BlockOutcome::PolicyViolation { reason } => {
                return Some(reason.clone())
            }
            BlockOutcome::Completed { .. } | BlockOutcome::Skipped => {}
        }
        if !self.soft_failures.is_empty() {
            return Some("assertion-failed".to_string());
        }
        match &self.expected_output {
            Some(expected) if *expected != self.output => Some("output-mismatch".to_string()),
            _ => None,
        }
    }
}

fn duration_ms<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_micros() as f64 / 1000.0)
}

/// A failed block: where it starts and why it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub line: usize,
    pub reason: String,
}

/// Ordered results of one document run with aggregate counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReport {
    pub id: String,
    pub results: Vec<ExecutionResult>,
    /// Code blocks in the document, runnable or not.
    pub total: usize,
    /// Blocks actually executed.
    pub run: usize,
    /// Blocks whose verdict is a failure.
    pub failed: usize,
    pub failures: Vec<Failure>,
    /// Set when the document could not be extracted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentReport {
    pub fn is_failed(&self) -> bool {
        self.failed > 0 || self.error.is_some()
    }

    pub fn extraction_failed(id: &str, err: &ParseError) -> Self {
        Self {
            id: id.to_string(),
            results: Vec::new(),
            total: 0,
            run: 0,
            failed: 1,
            failures: vec![Failure {
                line: err.line,
                reason: "unterminated-fence".to_string(),
            }],
            error: Some(err.to_string()),
        }
    }
}

/// Collect the results of one document run, in source order.
pub fn aggregate(document: &Document, results: Vec<ExecutionResult>, policy: ExpectErrorPolicy) -> DocumentReport {
    let failures: Vec<Failure> = results
        .iter()
        .filter_map(|r| {
            r.verdict(policy).map(|reason| Failure {
                line: r.line,
                reason,
            })
        })
        .collect();
    DocumentReport {
        id: document.id.clone(),
        total: document.code_blocks().count(),
        run: results
            .iter()
            .filter(|r| r.outcome != BlockOutcome::Skipped)
            .count(),
        failed: failures.len(),
        failures,
        results,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    fn result(outcome: BlockOutcome) -> ExecutionResult {
        ExecutionResult {
            line: 1,
            outcome,
            output: Vec::new(),
            soft_failures: Vec::new(),
            expected_output: None,
            expect_error: None,
            duration: Duration::from_millis(3),
            steps: 10,
        }
    }

    fn thrown(name: &str) -> BlockOutcome {
        BlockOutcome::Thrown {
            name: name.to_string(),
            message: "boom".to_string(),
        }
    }

    fn completed() -> BlockOutcome {
        BlockOutcome::Completed {
            value: "undefined".to_string(),
        }
    }

    #[test]
    fn test_plain_block_verdicts() {
        let policy = ExpectErrorPolicy::MatchDeclared;
        assert_eq!(result(completed()).verdict(policy), None);
        assert_eq!(result(thrown("TypeError")).verdict(policy), Some("thrown:TypeError".into()));
        let timed_out = BlockOutcome::TimedOut {
            reason: "step-budget".into(),
        };
        assert_eq!(result(timed_out).verdict(policy), Some("step-budget".into()));
        assert_eq!(result(BlockOutcome::Skipped).verdict(policy), Some("skipped".into()));

        let mut soft = result(completed());
        soft.soft_failures.push("Assertion failed".into());
        assert_eq!(soft.verdict(policy), Some("assertion-failed".into()));
    }

    #[test]
    fn test_expected_output() {
        let mut r = result(completed());
        r.output = vec!["1".into(), "2".into()];
        r.expected_output = Some(vec!["1".into(), "2".into()]);
        assert_eq!(r.verdict(ExpectErrorPolicy::MatchDeclared), None);
        r.expected_output = Some(vec!["1".into()]);
        assert_eq!(r.verdict(ExpectErrorPolicy::MatchDeclared), Some("output-mismatch".into()));
    }

    #[test]
    fn test_expect_error_verdicts() {
        let mut r = result(thrown("RangeError"));
        r.expect_error = Some(ExpectError::Any);
        assert_eq!(r.verdict(ExpectErrorPolicy::MatchDeclared), None);

        r.expect_error = Some(ExpectError::Named("TypeError".into()));
        assert_eq!(
            r.verdict(ExpectErrorPolicy::MatchDeclared),
            Some("wrong-error:RangeError".into())
        );
        assert_eq!(r.verdict(ExpectErrorPolicy::AnyThrow), None);

        let mut c = result(completed());
        c.expect_error = Some(ExpectError::Any);
        assert_eq!(c.verdict(ExpectErrorPolicy::AnyThrow), Some("expected-error".into()));
    }

    #[test]
    fn test_aggregate_counts() {
        let doc = extract(
            "guide.md",
            "```js runnable\n1\n```\n```js\nnot run\n```\n```js runnable\nx\n```\n",
        )
        .unwrap();
        let mut failing = result(thrown("ReferenceError"));
        failing.line = 7;
        let report = aggregate(
            &doc,
            vec![result(completed()), failing],
            ExpectErrorPolicy::default(),
        );
        assert_eq!(report.total, 3);
        assert_eq!(report.run, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(
            report.failures,
            vec![Failure {
                line: 7,
                reason: "thrown:ReferenceError".into()
            }]
        );
        assert!(report.is_failed());
    }

    #[test]
    fn test_unterminated_fence_counts_as_one_failure() {
        let err = extract("broken.md", "```js runnable\nlet a = 1;\n").unwrap_err();
        let report = DocumentReport::extraction_failed("broken.md", &err);
        assert_eq!(report.failed, report.failures.len());
        assert_eq!(report.failed, 1);
        assert!(report.is_failed());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(result(thrown("TypeError"))).unwrap();
        assert_eq!(json["outcome"]["status"], "thrown");
        assert_eq!(json["outcome"]["name"], "TypeError");
        assert_eq!(json["duration_ms"], 3.0);
        assert!(json.get("expect_error").is_none());
    }
}
