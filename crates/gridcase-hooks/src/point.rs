//! The fixed set of hook points

use std::fmt;

/// Extension points, in pipeline order
///
/// The set is closed: the pipeline fires exactly these, and plugins can
/// register at exactly these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookPoint {
    /// After the configuration is loaded, before anything runs
    PostConfig,
    /// Before a site's context is built
    PreBuildContext,
    /// After a site's context resolved (hooks may enrich or veto)
    PostBuildContext,
    /// After a case file was composed for a site
    PostComposeSuccess,
    /// After a site was skipped instead of composed
    PostComposeSkip,
    /// After one execution classified as success
    PostRunSuccess,
    /// After one execution classified as failure
    PostRunFailure,
    /// After the whole execution batch
    PostRunBatch,
}

impl HookPoint {
    /// Every hook point, in pipeline order
    pub const ALL: [HookPoint; 8] = [
        HookPoint::PostConfig,
        HookPoint::PreBuildContext,
        HookPoint::PostBuildContext,
        HookPoint::PostComposeSuccess,
        HookPoint::PostComposeSkip,
        HookPoint::PostRunSuccess,
        HookPoint::PostRunFailure,
        HookPoint::PostRunBatch,
    ];

    /// Stable name used in configuration and logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PostConfig => "post_config",
            Self::PreBuildContext => "pre_build_context",
            Self::PostBuildContext => "post_build_context",
            Self::PostComposeSuccess => "post_compose_success",
            Self::PostComposeSkip => "post_compose_skip",
            Self::PostRunSuccess => "post_run_success",
            Self::PostRunFailure => "post_run_failure",
            Self::PostRunBatch => "post_run_batch",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_points_ordered_and_distinct() {
        let mut seen = std::collections::HashSet::new();
        for point in HookPoint::ALL {
            assert!(seen.insert(point));
        }
        assert_eq!(seen.len(), 8);

        let mut sorted = HookPoint::ALL;
        sorted.sort();
        assert_eq!(sorted, HookPoint::ALL);
    }

    #[test]
    fn names_are_stable() {
        assert_eq!(HookPoint::PostConfig.name(), "post_config");
        assert_eq!(HookPoint::PostRunBatch.to_string(), "post_run_batch");
    }
}
