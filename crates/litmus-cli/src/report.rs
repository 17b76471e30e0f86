// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Text rendering of document reports.

use colored::Colorize;
use litmus_doctest::{BlockOutcome, DocumentReport, ExecutionResult, ExpectErrorPolicy};

use crate::output;

pub fn print(reports: &[DocumentReport], policy: ExpectErrorPolicy) {
    for report in reports {
        println!("{}", output::file_path(&report.id));
        if let Some(error) = &report.error {
            println!("  {} {}", output::status_fail(), output::reason(error));
        }
        for result in &report.results {
            print_result(result, policy);
        }
        println!();
    }

    let run: usize = reports.iter().map(|r| r.run).sum();
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    let documents_failed = reports.iter().filter(|r| r.is_failed()).count();
    println!("{}", output::separator(50));
    println!(
        "{} documents, {} blocks run, {}, {}",
        reports.len(),
        run,
        output::passed_count(run.saturating_sub(failed)),
        output::failed_count(failed)
    );

    if documents_failed > 0 {
        println!("\n{}", output::section_header("Failed blocks:"));
        for report in reports.iter().filter(|r| r.is_failed()) {
            for failure in &report.failures {
                println!(
                    "  {} {}:{} - {}",
                    output::status_fail(),
                    output::file_path(&report.id),
                    failure.line,
                    failure.reason
                );
            }
        }
    }
}

fn print_result(result: &ExecutionResult, policy: ExpectErrorPolicy) {
    let verdict = result.verdict(policy);
    let status = match verdict {
        None => output::status_pass(),
        Some(_) => output::status_fail(),
    };
    println!(
        "  {} line {}: {}",
        status,
        output::line_number(result.line),
        describe(&result.outcome)
    );
    if let Some(reason) = verdict {
        println!("      {}", output::reason(&reason));
        for line in &result.output {
            println!("      {} {}", "|".dimmed(), output::captured(line));
        }
    }
}

fn describe(outcome: &BlockOutcome) -> String {
    match outcome {
        BlockOutcome::Completed { value } => format!("completed => {}", value),
        BlockOutcome::Thrown { name, message } if message.is_empty() => format!("threw {}", name),
        BlockOutcome::Thrown { name, message } => format!("threw {}: {}", name, message),
        BlockOutcome::TimedOut { reason } => format!("timed out ({})", reason),
        BlockOutcome::PolicyViolation { reason } => format!("policy violation ({})", reason),
        BlockOutcome::Skipped => "skipped".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let thrown = BlockOutcome::Thrown {
            name: "TypeError".into(),
            message: "x is not a function".into(),
        };
        assert_eq!(describe(&thrown), "threw TypeError: x is not a function");
        let timed_out = BlockOutcome::TimedOut {
            reason: "timeout".into(),
        };
        assert_eq!(describe(&timed_out), "timed out (timeout)");
    }
}
