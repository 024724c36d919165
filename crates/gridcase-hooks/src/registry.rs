//! Hook registration and invocation

use std::collections::HashMap;
use std::sync::Arc;

use gridcase_core::FieldMap;
use tracing::{debug, warn};

use crate::data::HookData;
use crate::point::HookPoint;

/// A registered hook callable
///
/// Receives the plugin's own configuration and the current accumulator;
/// returns a contribution that [`HookData::merge`] folds back in.
pub type HookFn = Arc<dyn Fn(&FieldMap, HookData) -> HookData + Send + Sync>;

struct Registration {
    fun: HookFn,
    config: FieldMap,
}

/// Ordered hook registrations per point
///
/// Registration order is invocation order: callable *i* sees the
/// accumulator produced by callable *i−1*.
#[derive(Default)]
pub struct HookRegistry {
    table: HashMap<HookPoint, Vec<Registration>>,
}

impl HookRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callable at a hook point
    ///
    /// Registering the identical callable (same `Arc`) at the identical
    /// point is a no-op: it logs a warning and leaves the registry
    /// unchanged. Returns whether the registration was accepted.
    pub fn register(&mut self, point: HookPoint, fun: HookFn, config: FieldMap) -> bool {
        let entries = self.table.entry(point).or_default();
        if entries.iter().any(|r| Arc::ptr_eq(&r.fun, &fun)) {
            warn!(hook = %point, "ignoring duplicate hook registration");
            return false;
        }
        entries.push(Registration { fun, config });
        true
    }

    /// Fold every registration at a point over the seed accumulator
    ///
    /// With no registrations the seed comes back unchanged.
    #[must_use]
    pub fn run(&self, point: HookPoint, seed: HookData) -> HookData {
        let Some(entries) = self.table.get(&point) else {
            return seed;
        };
        debug!(hook = %point, count = entries.len(), "running hook chain");
        entries.iter().fold(seed, |acc, registration| {
            let contribution = (registration.fun)(&registration.config, acc.clone());
            acc.merge(contribution)
        })
    }

    /// Number of registrations at one point
    #[inline]
    #[must_use]
    pub fn count(&self, point: HookPoint) -> usize {
        self.table.get(&point).map_or(0, Vec::len)
    }

    /// Number of registrations across all points
    #[must_use]
    pub fn total(&self) -> usize {
        self.table.values().map(Vec::len).sum()
    }

    /// Whether nothing is registered anywhere
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts: Vec<_> = self
            .table
            .iter()
            .map(|(point, entries)| (point.name(), entries.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("HookRegistry").field("counts", &counts).finish()
    }
}
