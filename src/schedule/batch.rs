//! Frozen configuration snapshots.

use std::collections::BTreeMap;

use super::index::BatchIndex;
use crate::param::ParameterSet;
use crate::random::SeedPolicy;

/// An immutable snapshot of all module configurations for a block of runs.
///
/// Created from the Schedule's modules (see [`Schedule::snapshot`](super::Schedule::snapshot))
/// or assembled by hand, then queued on the Schedule. Settings are keyed by
/// module name.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Batch {
    index: BatchIndex,
    runs: u32,
    seed: SeedPolicy,
    settings: BTreeMap<String, ParameterSet>,
}

impl Batch {
    /// Creates a batch with no module settings.
    pub fn new(index: BatchIndex, runs: u32, seed: SeedPolicy) -> Self {
        Self {
            index,
            runs,
            seed,
            settings: BTreeMap::new(),
        }
    }

    /// Adds the settings of one module.
    pub fn with_settings(mut self, module: impl Into<String>, settings: ParameterSet) -> Self {
        self.settings.insert(module.into(), settings);
        self
    }

    /// Index of this batch.
    pub fn index(&self) -> BatchIndex {
        self.index
    }

    /// Number of runs in this batch.
    pub fn runs(&self) -> u32 {
        self.runs
    }

    /// Seeding policy for the runs of this batch.
    pub fn seed(&self) -> SeedPolicy {
        self.seed
    }

    /// Settings recorded for `module`.
    pub fn settings(&self, module: &str) -> Option<&ParameterSet> {
        self.settings.get(module)
    }

    /// Names of all modules with recorded settings.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.settings.keys().map(String::as_str)
    }

    pub(crate) fn renumbered(mut self, index: BatchIndex) -> Self {
        self.index = index;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParamValue;

    #[test]
    fn test_batch_snapshot() {
        let b = Batch::new(BatchIndex(0), 3, SeedPolicy::Fixed(1))
            .with_settings("island", ParameterSet::new().with("migrants", ParamValue::Int(2)));
        assert_eq!(b.runs(), 3);
        assert_eq!(b.seed(), SeedPolicy::Fixed(1));
        assert_eq!(b.settings("island").unwrap().usize("migrants").unwrap(), 2);
        assert!(b.settings("graph").is_none());
        assert_eq!(b.modules().collect::<Vec<_>>(), vec!["island"]);
    }
}
