//! Schedule configuration.
//!
//! [`ScheduleConfig`] holds the parameters that shape batches and runs.

use crate::random::SeedPolicy;

/// Configuration for the [`Schedule`](super::Schedule).
///
/// # Defaults
///
/// ```
/// use u_evoflow::schedule::ScheduleConfig;
/// use u_evoflow::random::SeedPolicy;
///
/// let config = ScheduleConfig::default();
/// assert_eq!(config.runs_per_batch, 1);
/// assert_eq!(config.seed, SeedPolicy::PerRun(42));
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_evoflow::schedule::ScheduleConfig;
///
/// let config = ScheduleConfig::default()
///     .with_runs_per_batch(10)
///     .with_seed(7)
///     .with_max_generations_guard(500);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleConfig {
    /// Runs in each batch created by [`Schedule::snapshot`](super::Schedule::snapshot).
    pub runs_per_batch: u32,

    /// How each run seeds the random source.
    pub seed: SeedPolicy,

    /// Hard cap on generations per run, applied after the stopping criteria.
    ///
    /// `None` leaves termination entirely to the criteria.
    pub max_generations_guard: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            runs_per_batch: 1,
            seed: SeedPolicy::default(),
            max_generations_guard: Some(100_000),
        }
    }
}

impl ScheduleConfig {
    /// Sets the number of runs per batch.
    pub fn with_runs_per_batch(mut self, runs: u32) -> Self {
        self.runs_per_batch = runs;
        self
    }

    /// Seeds run `k` with `base + k`.
    pub fn with_seed(mut self, base: u64) -> Self {
        self.seed = SeedPolicy::PerRun(base);
        self
    }

    /// Sets the seeding policy.
    pub fn with_seed_policy(mut self, policy: SeedPolicy) -> Self {
        self.seed = policy;
        self
    }

    /// Caps every run at `generations` generations.
    pub fn with_max_generations_guard(mut self, generations: u64) -> Self {
        self.max_generations_guard = Some(generations);
        self
    }

    /// Removes the generation cap.
    pub fn without_guard(mut self) -> Self {
        self.max_generations_guard = None;
        self
    }

    /// Validates the configuration.
    ///
    /// Returns `Err` with a description if any parameter is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.runs_per_batch == 0 {
            return Err("runs_per_batch must be at least 1".into());
        }
        if self.max_generations_guard == Some(0) {
            return Err("max_generations_guard must be positive or None".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScheduleConfig::default();
        assert_eq!(config.runs_per_batch, 1);
        assert_eq!(config.max_generations_guard, Some(100_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ScheduleConfig::default()
            .with_runs_per_batch(4)
            .with_seed_policy(SeedPolicy::Fixed(3))
            .without_guard();
        assert_eq!(config.runs_per_batch, 4);
        assert_eq!(config.seed, SeedPolicy::Fixed(3));
        assert!(config.max_generations_guard.is_none());
    }

    #[test]
    fn test_validate_zero_runs() {
        assert!(ScheduleConfig::default().with_runs_per_batch(0).validate().is_err());
    }

    #[test]
    fn test_validate_zero_guard() {
        let config = ScheduleConfig::default().with_max_generations_guard(0);
        assert!(config.validate().is_err());
    }
}
