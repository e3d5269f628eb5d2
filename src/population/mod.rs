//! Population model.
//!
//! - [`Individual`]: a genotype with date of birth, tags and memoized
//!   phenotype/fitness
//! - [`IndividualList`]: ordered multiset of shared individuals with random
//!   sampling, tie-aware rank queries and proportional selection

mod individual;
mod list;
pub mod rank;
pub mod sampling;

pub use individual::{Individual, Inheritance, Tag, TagValue, Tags};
pub use list::{IndividualList, IndividualRef};

/// Bound every genotype type satisfies.
///
/// Individuals are shared across lists and may be handed to listeners on
/// other threads, so genotypes must be thread-safe.
pub trait Genotype: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Genotype for T {}
