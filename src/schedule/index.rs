//! Batch, run and generation indices.
//!
//! Each counter is scoped to its enclosing unit and restarts when that
//! unit restarts: run numbers restart per batch, generation numbers per run.

use std::fmt;

/// Index of a batch (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchIndex(pub u32);

/// Index of a run within its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunIndex {
    pub batch: BatchIndex,
    pub run: u32,
}

/// Index of a generation within its run. Generation 0 is the initial population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationIndex {
    pub run: RunIndex,
    pub generation: u64,
}

impl BatchIndex {
    /// First run of this batch.
    pub fn first_run(self) -> RunIndex {
        RunIndex { batch: self, run: 0 }
    }

    /// The following batch.
    pub fn next(self) -> BatchIndex {
        BatchIndex(self.0 + 1)
    }
}

impl RunIndex {
    /// Generation 0 of this run.
    pub fn first_generation(self) -> GenerationIndex {
        GenerationIndex {
            run: self,
            generation: 0,
        }
    }

    /// The following run in the same batch.
    pub fn next(self) -> RunIndex {
        RunIndex {
            batch: self.batch,
            run: self.run + 1,
        }
    }
}

impl GenerationIndex {
    /// The following generation in the same run.
    pub fn next(self) -> GenerationIndex {
        GenerationIndex {
            run: self.run,
            generation: self.generation + 1,
        }
    }
}

impl fmt::Display for BatchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

impl fmt::Display for RunIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/r{}", self.batch, self.run)
    }
}

impl fmt::Display for GenerationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/g{}", self.run, self.generation)
    }
}
