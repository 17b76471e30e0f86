// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! End-to-end document runs through the batch runner.

use litmus_doctest::{
    exit_code, run, run_with_cancel, BlockOutcome, CancelToken, DocumentSource, ExpectErrorPolicy,
    PolicyConfig, RunConfig,
};

fn doc(id: &str, text: &str) -> DocumentSource {
    DocumentSource::new(id, text)
}

fn completed(value: &str) -> BlockOutcome {
    BlockOutcome::Completed {
        value: value.to_string(),
    }
}

const NARRATIVE: &str = r#"# Summing

Start with an accumulator.

```js runnable
let sum = 0;
```

Illustrative only:

```js
sum = 1000;
```

Then add each element.

```js runnable
for (const n of [1, 2, 3, 4]) {
  sum += n;
}
sum
```
"#;

#[test]
fn test_one_result_per_runnable_block_in_order() {
    let reports = run(&[doc("narrative.md", NARRATIVE)], &RunConfig::default());
    let report = &reports[0];
    assert_eq!(report.id, "narrative.md");
    assert_eq!(report.total, 3);
    assert_eq!(report.run, 2);
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].line, 5);
    assert_eq!(report.results[1].line, 17);
    assert_eq!(report.results[1].outcome, completed("10"));
    assert!(!report.is_failed());
    assert_eq!(exit_code(&reports), 0);
}

#[test]
fn test_default_parameters() {
    let text = "```js runnable\nfunction multiply(a, b = a) { return a * b; }\n```\n\n```js runnable\n[multiply(5), multiply(3, 4)]\n```\n";
    let reports = run(&[doc("params.md", text)], &RunConfig::default());
    assert_eq!(reports[0].results[1].outcome, completed("[ 25, 12 ]"));
}

#[test]
fn test_expect_error_annotation() {
    let annotated = "```js runnable expect-error\nundefinedFunction();\n```\n";
    let plain = "```js runnable\nundefinedFunction();\n```\n";
    let reports = run(
        &[doc("annotated.md", annotated), doc("plain.md", plain)],
        &RunConfig::default(),
    );
    assert!(!reports[0].is_failed());
    assert!(reports[1].is_failed());
    assert_eq!(reports[1].failures[0].reason, "thrown:ReferenceError");
    assert_eq!(exit_code(&reports), 1);
}

#[test]
fn test_declared_error_name() {
    let text = "```js runnable expect-error=TypeError\nnull.length\n```\n\n```js runnable expect-error=RangeError\nnull.length\n```\n\n```js runnable expect-error\n1 + 1\n```\n";
    let reports = run(&[doc("errors.md", text)], &RunConfig::default());
    let reasons: Vec<(usize, &str)> = reports[0]
        .failures
        .iter()
        .map(|f| (f.line, f.reason.as_str()))
        .collect();
    assert_eq!(reasons, vec![(5, "wrong-error:TypeError"), (9, "expected-error")]);

    let lenient = RunConfig {
        expect_error: ExpectErrorPolicy::AnyThrow,
        ..RunConfig::default()
    };
    let reports = run(&[doc("errors.md", text)], &lenient);
    assert_eq!(reports[0].failed, 1);
}

#[test]
fn test_isolated_blocks_contrast_scoping() {
    let text = r#"```js runnable isolated
var x = 1;
{ var x = 2; }
x
```

```js runnable isolated
let x = 1;
{ let x = 2; }
x
```

```js runnable isolated
typeof x
```
"#;
    let reports = run(&[doc("scoping.md", text)], &RunConfig::default());
    let outcomes: Vec<&BlockOutcome> = reports[0].results.iter().map(|r| &r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![&completed("2"), &completed("1"), &completed("'undefined'")]
    );
}

#[test]
fn test_runaway_block_times_out_and_the_run_continues() {
    let text = "```js runnable\nwhile (true) {}\n```\n\n```js runnable\nconsole.log('after')\n```\n";
    let config = RunConfig {
        policy: PolicyConfig {
            max_steps: Some(10_000),
            ..PolicyConfig::default()
        },
        ..RunConfig::default()
    };
    let reports = run(&[doc("loop.md", text)], &config);
    let report = &reports[0];
    assert_eq!(
        report.results[0].outcome,
        BlockOutcome::TimedOut {
            reason: "step-budget".to_string()
        }
    );
    assert_eq!(report.results[1].output, vec!["after"]);
    assert_eq!(report.failed, 1);
}

#[test]
fn test_capability_violation() {
    let text = "```js runnable\nconst fs = require('fs');\n```\n";
    let reports = run(&[doc("fs.md", text)], &RunConfig::default());
    assert_eq!(
        reports[0].results[0].outcome,
        BlockOutcome::PolicyViolation {
            reason: "capability-denied:fs".to_string()
        }
    );
    assert_eq!(reports[0].failures[0].reason, "capability-denied:fs");
}

#[test]
fn test_parse_error_only_affects_its_document() {
    let broken = "intro\n\n```js runnable\nlet a = 1;\n";
    let reports = run(
        &[doc("broken.md", broken), doc("narrative.md", NARRATIVE)],
        &RunConfig::default(),
    );
    assert!(reports[0].is_failed());
    assert_eq!(reports[0].failed, 1);
    assert_eq!(reports[0].failures.len(), 1);
    assert_eq!(reports[0].failures[0].line, 3);
    assert!(reports[0].error.is_some());
    assert!(!reports[1].is_failed());
}

#[test]
fn test_deeply_nested_source_is_a_syntax_error() {
    let depth = 300_000;
    let deep = format!(
        "```js runnable
{}1{}
```

```js runnable
1 + 1
```
",
        "[".repeat(depth),
        "]".repeat(depth)
    );
    let reports = run(
        &[doc("deep.md", &deep), doc("narrative.md", NARRATIVE)],
        &RunConfig::default(),
    );
    assert_eq!(reports.len(), 2);
    let results = &reports[0].results;
    assert_eq!(
        results[0].outcome,
        BlockOutcome::Thrown {
            name: "SyntaxError".to_string(),
            message: "too much nesting".to_string(),
        }
    );
    assert_eq!(results[1].outcome, completed("2"));
    assert_eq!(reports[0].failed, 1);
    assert_eq!(reports[1].id, "narrative.md");
    assert_eq!(reports[1].results[1].outcome, completed("10"));
    assert!(!reports[1].is_failed());
}

#[test]
fn test_output_blocks() {
    let text = "```js runnable\nconsole.log('a');\nconsole.log([1, 2]);\n```\n\n```output\na\n[ 1, 2 ]\n```\n\n```js runnable\nconsole.log('b')\n```\n\n```output\nc\n```\n";
    let reports = run(&[doc("output.md", text)], &RunConfig::default());
    let report = &reports[0];
    assert_eq!(report.total, 4);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].line, 11);
    assert_eq!(report.failures[0].reason, "output-mismatch");
}

#[test]
fn test_soft_assertion_failure_marks_the_document_failed() {
    let text = "```js runnable\nconsole.assert(1 === 2, 'math is broken');\n```\n";
    let reports = run(&[doc("assert.md", text)], &RunConfig::default());
    assert_eq!(reports[0].failures[0].reason, "assertion-failed");
}

#[test]
fn test_cancelled_run_skips_blocks() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let reports = run_with_cancel(&[doc("narrative.md", NARRATIVE)], &RunConfig::default(), &cancel);
    let report = &reports[0];
    assert_eq!(report.results.len(), 2);
    assert!(report
        .results
        .iter()
        .all(|r| r.outcome == BlockOutcome::Skipped));
    assert_eq!(report.run, 0);
    assert!(report.is_failed());
}

#[test]
fn test_reruns_are_identical_and_parallel_order_is_stable() {
    let documents: Vec<DocumentSource> = (0..8)
        .map(|i| {
            doc(
                &format!("doc-{}.md", i),
                &format!("```js runnable\nfor (let k = 0; k < 3; k++) console.log({} * k);\n```\n", i),
            )
        })
        .collect();
    let config = RunConfig {
        jobs: Some(4),
        ..RunConfig::default()
    };
    let first = run(&documents, &config);
    let second = run(&documents, &config);
    let ids: Vec<&str> = first.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, documents.iter().map(|d| d.id.as_str()).collect::<Vec<_>>());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.results[0].output, b.results[0].output);
    }
    assert_eq!(first[3].results[0].output, vec!["0", "3", "6"]);
}

#[test]
fn test_json_report() {
    let reports = run(&[doc("narrative.md", NARRATIVE)], &RunConfig::default());
    let json = serde_json::to_value(&reports).unwrap();
    assert_eq!(json[0]["id"], "narrative.md");
    assert_eq!(json[0]["results"][1]["outcome"]["status"], "completed");
    assert_eq!(json[0]["results"][1]["outcome"]["value"], "10");
}
