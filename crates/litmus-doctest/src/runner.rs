// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Batch runs over many documents.
//!
//! Documents are independent, so they are spread over a pool of worker
//! threads. Blocks within one document always run in order on the worker
//! that owns the document.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{info, info_span, warn};

use crate::config::RunConfig;
use crate::context::ContextManager;
use crate::executor::execute;
use crate::extract::{DocumentSource, Extractor};
use crate::policy::CancelToken;
use crate::report::{aggregate, DocumentReport, ExecutionResult, Failure};

/// Deeply recursive snippets need more than the default thread stack.
const WORKER_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Run every document and return the reports in input order.
pub fn run(documents: &[DocumentSource], config: &RunConfig) -> Vec<DocumentReport> {
    run_with_cancel(documents, config, &CancelToken::new())
}

/// Like [`run`], but stops executing blocks once `cancel` is triggered.
/// Blocks that never started are reported as skipped.
pub fn run_with_cancel(documents: &[DocumentSource], config: &RunConfig, cancel: &CancelToken) -> Vec<DocumentReport> {
    if documents.is_empty() {
        return Vec::new();
    }
    let jobs = config
        .jobs
        .unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
        .clamp(1, documents.len());

    let capabilities = Arc::new(config.policy.allow.clone());
    let extractor = Extractor::new(&config.language_tags);
    let next = AtomicUsize::new(0);

    let worker = || {
        let manager = ContextManager::new(&config.policy, capabilities.clone(), cancel.clone());
        let mut done = Vec::new();
        loop {
            let index = next.fetch_add(1, Ordering::SeqCst);
            let Some(source) = documents.get(index) else {
                break;
            };
            done.push((index, run_document(source, &extractor, &manager, config)));
        }
        done
    };

    let mut finished: Vec<(usize, DocumentReport)> = Vec::with_capacity(documents.len());
    thread::scope(|s| {
        let mut handles = Vec::new();
        for i in 0..jobs {
            let spawned = thread::Builder::new()
                .name(format!("litmus-worker-{}", i))
                .stack_size(WORKER_STACK_SIZE)
                .spawn_scoped(s, worker);
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!(error = %e, "could not start worker thread");
                    break;
                }
            }
        }
        if handles.is_empty() {
            finished.extend(worker());
        }
        for handle in handles {
            match handle.join() {
                Ok(reports) => finished.extend(reports),
                Err(_) => warn!("worker thread panicked"),
            }
        }
    });

    finished.sort_by_key(|(index, _)| *index);
    let mut reports = Vec::with_capacity(documents.len());
    let mut finished = finished.into_iter().peekable();
    for (index, source) in documents.iter().enumerate() {
        match finished.next_if(|(i, _)| *i == index) {
            Some((_, report)) => reports.push(report),
            None => reports.push(DocumentReport {
                id: source.id.clone(),
                results: Vec::new(),
                total: 0,
                run: 0,
                failed: 1,
                failures: vec![Failure {
                    line: 0,
                    reason: "worker-panicked".to_string(),
                }],
                error: Some("worker thread panicked".to_string()),
            }),
        }
    }
    reports
}

/// Extract and execute a single document in its own context.
pub fn run_document(
    source: &DocumentSource,
    extractor: &Extractor,
    manager: &ContextManager,
    config: &RunConfig,
) -> DocumentReport {
    let span = info_span!("document", id = %source.id);
    let _enter = span.enter();

    let document = match extractor.extract(&source.id, &source.text) {
        Ok(document) => document,
        Err(err) => {
            warn!(error = %err, "document not extracted");
            return DocumentReport::extraction_failed(&source.id, &err);
        }
    };

    let mut run = manager.begin(&document);
    let mut results = Vec::new();
    for block in document.runnable_blocks() {
        if manager.is_cancelled() {
            results.push(ExecutionResult::skipped(block));
            continue;
        }
        results.push(execute(block, run.context_for(block)));
    }
    run.end();

    let report = aggregate(&document, results, config.expect_error);
    info!(
        total = report.total,
        run = report.run,
        failed = report.failed,
        "document finished"
    );
    report
}

/// 0 when every report passed, 1 otherwise.
pub fn exit_code(reports: &[DocumentReport]) -> i32 {
    if reports.iter().any(DocumentReport::is_failed) {
        1
    } else {
        0
    }
}
