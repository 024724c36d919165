//! The execution engine
//!
//! Fans discovered cases out over a bounded subprocess pool, classifies
//! each result by its captured standard output, routes it through the
//! success/failure hooks, and folds everything into a [`RunReport`].
//! Every item runs regardless of earlier failures; the batch-level flag
//! only tells the operator whether to open the log.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use tracing::{error, warn};

use gridcase_core::{CaseFile, Config, ExecutionRecord, Outcome, RunReport};
use gridcase_hooks::{HookData, HookPoint, HookRegistry};

use crate::runner::{CaseRunner, ModelRunner};

/// Classify one execution by its captured standard output
///
/// Anything on stdout beyond the trailing newline counts as reported
/// failures — the exit status is deliberately not consulted, matching
/// how the external model signals interpretable errors.
#[must_use]
pub fn classify(record: &ExecutionRecord) -> Outcome {
    let error_lines = record.stdout.split('\n').count() - 1;
    if error_lines > 0 {
        Outcome::Failure
    } else {
        Outcome::Success
    }
}

/// Run every case with the configured model binary
pub async fn execute(
    config: &Config,
    hooks: &HookRegistry,
    cases: Vec<CaseFile>,
    cancel: &AtomicBool,
) -> RunReport {
    let runner = ModelRunner::from_config(config);
    execute_with(&runner, config, hooks, cases, cancel).await
}

/// Run every case with an explicit runner
///
/// The pool is bounded by `runWorkers`; results arrive unordered. The
/// cancellation flag stops submission of further cases while in-flight
/// subprocesses finish.
pub async fn execute_with(
    runner: &dyn CaseRunner,
    config: &Config,
    hooks: &HookRegistry,
    cases: Vec<CaseFile>,
    cancel: &AtomicBool,
) -> RunReport {
    let workers = config.effective_run_workers().max(1);
    let quiet = config.quiet;
    let mut report = RunReport::default();

    let mut results = stream::iter(cases)
        .take_while(|_| futures::future::ready(!cancel.load(Ordering::SeqCst)))
        .map(|case| async move { runner.run(&case).await })
        .buffer_unordered(workers);

    while let Some(result) = results.next().await {
        match result {
            Ok(record) => {
                let outcome = classify(&record);
                let point = match outcome {
                    Outcome::Success => HookPoint::PostRunSuccess,
                    Outcome::Failure => HookPoint::PostRunFailure,
                };
                let record = hooks
                    .run(point, HookData::Execution(record.clone()))
                    .into_execution()
                    .unwrap_or(record);
                if outcome == Outcome::Failure {
                    warn!(
                        dir = %record.dir.display(),
                        file = %record.file,
                        "check the model summary in this directory\n{}",
                        record.stdout.trim_end_matches('\n')
                    );
                }
                progress(quiet, outcome);
                report.record(outcome);
            }
            Err(err) => {
                error!(error = %err, "case invocation failed");
                progress(quiet, Outcome::Failure);
                report.record(Outcome::Failure);
            }
        }
    }

    let report = match hooks.run(HookPoint::PostRunBatch, HookData::Batch(report.clone())) {
        HookData::Batch(rewritten) => rewritten,
        _ => report,
    };

    if !quiet {
        println!();
        if report.any_failed() {
            println!("If you see an X above, please check the log for more details");
        }
    }
    report
}

fn progress(quiet: bool, outcome: Outcome) {
    if quiet {
        return;
    }
    let marker = match outcome {
        Outcome::Success => ".",
        Outcome::Failure => "X",
    };
    print!("{marker}");
    let _ = std::io::stdout().flush();
}
