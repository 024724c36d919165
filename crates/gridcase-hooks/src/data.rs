//! Hook accumulators
//!
//! One accumulator shape per hook point. The fold contract is uniform:
//! a callable receives the accumulator and returns a contribution, and
//! [`HookData::merge`] decides how the contribution lands.

use gridcase_core::{merge_fields, CaseFile, ContextState, ExecutionRecord, FieldMap, RunReport};
use tracing::warn;

/// Per-point accumulator
#[derive(Debug, Clone, PartialEq)]
pub enum HookData {
    /// `post_config`: the full configuration field view
    Config(FieldMap),
    /// `pre_build_context` / `post_build_context`: the site context
    Context(ContextState),
    /// `post_compose_success` / `post_compose_skip`: the composed case
    /// (for skips, the case that would have been composed)
    Case(CaseFile),
    /// `post_run_success` / `post_run_failure`: one execution record
    Execution(ExecutionRecord),
    /// `post_run_batch`: the aggregate report
    Batch(RunReport),
}

impl HookData {
    /// Variant name for diagnostics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Context(_) => "context",
            Self::Case(_) => "case",
            Self::Execution(_) => "execution",
            Self::Batch(_) => "batch",
        }
    }

    /// Fold one callable's contribution into the accumulator
    ///
    /// Field maps merge key-wise with the contribution winning;
    /// `Skipped` absorbs (a veto cannot be un-vetoed); record payloads
    /// replace wholesale. A contribution of the wrong variant is
    /// dropped with a warning rather than corrupting the fold.
    #[must_use]
    pub fn merge(self, contribution: HookData) -> HookData {
        match (self, contribution) {
            (Self::Config(mut acc), Self::Config(more)) => {
                merge_fields(&mut acc, more);
                Self::Config(acc)
            }
            (Self::Context(ContextState::Skipped), Self::Context(_)) => {
                Self::Context(ContextState::Skipped)
            }
            (Self::Context(_), Self::Context(ContextState::Skipped)) => {
                Self::Context(ContextState::Skipped)
            }
            (
                Self::Context(ContextState::Resolved(mut acc)),
                Self::Context(ContextState::Resolved(more)),
            ) => {
                merge_fields(&mut acc, more);
                Self::Context(ContextState::Resolved(acc))
            }
            (Self::Case(_), Self::Case(more)) => Self::Case(more),
            (Self::Execution(_), Self::Execution(more)) => Self::Execution(more),
            (Self::Batch(_), Self::Batch(more)) => Self::Batch(more),
            (acc, other) => {
                warn!(
                    expected = acc.kind(),
                    returned = other.kind(),
                    "ignoring hook contribution of mismatched kind"
                );
                acc
            }
        }
    }

    /// The configuration fields, if this is a config accumulator
    #[inline]
    #[must_use]
    pub fn into_config(self) -> Option<FieldMap> {
        match self {
            Self::Config(fields) => Some(fields),
            _ => None,
        }
    }

    /// The context state, if this is a context accumulator
    #[inline]
    #[must_use]
    pub fn into_context(self) -> Option<ContextState> {
        match self {
            Self::Context(state) => Some(state),
            _ => None,
        }
    }

    /// The execution record, if this is an execution accumulator
    #[inline]
    #[must_use]
    pub fn into_execution(self) -> Option<ExecutionRecord> {
        match self {
            Self::Execution(record) => Some(record),
            _ => None,
        }
    }
}
