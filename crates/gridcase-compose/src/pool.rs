//! The setup worker pool
//!
//! Context build and composition are embarrassingly parallel across
//! sites: each context is owned by exactly one worker and nothing
//! mutable is shared. A bounded pool of threads consumes a queue of
//! site records; results are collected unordered. One site's failure is
//! recorded and the batch continues.
//!
//! Cancellation stops submission of new sites; whatever is in flight
//! finishes normally.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel;
use parking_lot::Mutex;
use tracing::{error, warn};

use gridcase_core::{CaseFile, SiteRecord};

use crate::compose::{ComposeOutcome, Composer};

/// Aggregate outcome of one scenario's composition
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ComposeSummary {
    /// Sites that produced at least one case
    pub composed: usize,
    /// Sites skipped by resolution failure or veto
    pub skipped: usize,
    /// Sites that hit a filesystem or template error
    pub failed: usize,
    /// Every case written, unordered
    pub cases: Vec<CaseFile>,
}

impl ComposeSummary {
    fn record(&mut self, result: &Result<ComposeOutcome, crate::error::ComposeError>) {
        match result {
            Ok(ComposeOutcome::Composed(cases)) => {
                self.composed += 1;
                self.cases.extend(cases.iter().cloned());
            }
            Ok(ComposeOutcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Fan site records out over a bounded worker pool
///
/// `workers` is clamped to at least one. The cancellation flag is
/// checked before each submission; set it to stop feeding the queue
/// while letting in-flight sites finish.
#[must_use]
pub fn run_pool(
    composer: &Composer<'_>,
    sites: Vec<SiteRecord>,
    workers: usize,
    cancel: &AtomicBool,
) -> ComposeSummary {
    let workers = workers.max(1);
    let (tx, rx) = channel::bounded::<SiteRecord>(workers * 2);
    let summary = Mutex::new(ComposeSummary::default());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let rx = rx.clone();
            let summary = &summary;
            scope.spawn(move || {
                while let Ok(site) = rx.recv() {
                    let result = composer.compose_site(&site);
                    if let Err(err) = &result {
                        error!(
                            lat = site.lat,
                            lng = site.lng,
                            error = %err,
                            "site composition failed"
                        );
                    }
                    summary.lock().record(&result);
                }
            });
        }

        for site in sites {
            if cancel.load(Ordering::SeqCst) {
                warn!("cancellation requested; no further sites submitted");
                break;
            }
            if tx.send(site).is_err() {
                break;
            }
        }
        drop(tx);
    });

    summary.into_inner()
}
