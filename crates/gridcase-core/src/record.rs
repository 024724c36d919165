//! Records that flow between pipeline stages

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{merge_fields, FieldMap};

/// One surviving sample point
///
/// Produced by the site sampler: coordinates plus one sampled value per
/// required layer. A record only exists if every layer yielded data.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRecord {
    /// Latitude in layer units
    pub lat: f64,
    /// Longitude in layer units
    pub lng: f64,
    /// Sampled value per layer, keyed by layer name
    pub layers: FieldMap,
}

impl SiteRecord {
    /// Create a record with no layer values yet
    #[inline]
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            layers: FieldMap::new(),
        }
    }

    /// Fields this site contributes to a fresh context
    ///
    /// `lat`/`lng` plus the plotting aliases `xcrd` (longitude) and
    /// `ycrd` (latitude), then every sampled layer value.
    #[must_use]
    pub fn seed_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("lat".to_string(), self.lat.into());
        fields.insert("lng".to_string(), self.lng.into());
        fields.insert("xcrd".to_string(), self.lng.into());
        fields.insert("ycrd".to_string(), self.lat.into());
        merge_fields(&mut fields, self.layers.clone());
        fields
    }
}

/// Terminal state of per-site context resolution
///
/// `Resolved` carries the full context; `Skipped` means a verb signalled
/// failure (or a hook vetoed) and the site composes nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextState {
    /// Every field resolved; the context is ready for composition
    Resolved(FieldMap),
    /// Resolution failed or was vetoed; no case will be composed
    Skipped,
}

impl ContextState {
    /// Whether this context reached the resolved state
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// The resolved fields, if any
    #[inline]
    #[must_use]
    pub fn fields(&self) -> Option<&FieldMap> {
        match self {
            Self::Resolved(fields) => Some(fields),
            Self::Skipped => None,
        }
    }

    /// Consume into the resolved fields, if any
    #[inline]
    #[must_use]
    pub fn into_fields(self) -> Option<FieldMap> {
        match self {
            Self::Resolved(fields) => Some(fields),
            Self::Skipped => None,
        }
    }
}

/// One generated, ready-to-run simulation input
///
/// Never mutated after composition; only the external binary writes into
/// its directory afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseFile {
    /// Case directory
    pub dir: PathBuf,
    /// Case file name within the directory
    pub file: String,
}

impl CaseFile {
    /// Create a case reference
    #[inline]
    pub fn new(dir: impl Into<PathBuf>, file: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file: file.into(),
        }
    }

    /// Full path to the case file
    #[inline]
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }

    /// The case directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Captured result of one external-binary invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    /// Directory the binary ran in
    pub dir: PathBuf,
    /// Case or batch file passed to the binary
    pub file: String,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Process exit code, if the process terminated normally
    pub exit_code: Option<i32>,
}

/// Classification of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Output was clean
    Success,
    /// Output reported failures; details are in the log
    Failure,
}

/// Aggregate result of an execution batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Invocations attempted
    pub attempted: usize,
    /// Invocations classified as success
    pub succeeded: usize,
    /// Invocations classified as failure
    pub failed: usize,
}

impl RunReport {
    /// Fold one classified invocation into the report
    pub fn record(&mut self, outcome: Outcome) {
        self.attempted += 1;
        match outcome {
            Outcome::Success => self.succeeded += 1,
            Outcome::Failure => self.failed += 1,
        }
    }

    /// Whether any invocation failed
    #[inline]
    #[must_use]
    pub fn any_failed(&self) -> bool {
        self.failed > 0
    }

    /// Operator-facing one-liner
    #[must_use]
    pub fn summary_line(&self) -> String {
        if self.any_failed() {
            format!(
                "{} of {} runs reported failures; check the log for details",
                self.failed, self.attempted
            )
        } else {
            format!("all {} runs completed", self.attempted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seed_fields_aliases_coordinates() {
        let mut site = SiteRecord::new(7.25, -3.5);
        site.layers.insert("soilClass".to_string(), json!(12));

        let fields = site.seed_fields();

        assert_eq!(fields["lat"], json!(7.25));
        assert_eq!(fields["lng"], json!(-3.5));
        assert_eq!(fields["xcrd"], json!(-3.5));
        assert_eq!(fields["ycrd"], json!(7.25));
        assert_eq!(fields["soilClass"], json!(12));
    }

    #[test]
    fn context_state_accessors() {
        let resolved = ContextState::Resolved(FieldMap::new());
        assert!(resolved.is_resolved());
        assert!(resolved.fields().is_some());

        let skipped = ContextState::Skipped;
        assert!(!skipped.is_resolved());
        assert!(skipped.into_fields().is_none());
    }

    #[test]
    fn run_report_aggregates() {
        let mut report = RunReport::default();
        report.record(Outcome::Success);
        report.record(Outcome::Failure);
        report.record(Outcome::Success);

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(report.any_failed());
        assert!(report.summary_line().contains("check the log"));
    }
}
