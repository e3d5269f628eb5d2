//! Island model configuration.

/// What happens to a migrant on its home island.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MigrationMode {
    /// The sender gives the migrant up.
    #[default]
    Move,
    /// The sender keeps the migrant; the receiver trims back to its size
    /// by dropping an inverse-fitness-proportional selection.
    Copy,
}

/// Configuration for [`IslandModel`](super::IslandModel).
///
/// ```
/// use u_evoflow::manager::{IslandConfig, MigrationMode};
///
/// let config = IslandConfig::default()
///     .with_subpopulation_count(4)
///     .with_epoch_length(5)
///     .with_migrants_count(2)
///     .with_migration(MigrationMode::Copy);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IslandConfig {
    /// Number of islands the initial population is dealt into.
    pub subpopulation_count: usize,

    /// Generations between migrations. 0 disables migration.
    pub epoch_length: u64,

    /// Individuals each island sends per migration.
    pub migrants_count: usize,

    /// Move or copy migrants.
    pub migration: MigrationMode,
}

impl Default for IslandConfig {
    fn default() -> Self {
        Self {
            subpopulation_count: 2,
            epoch_length: 10,
            migrants_count: 1,
            migration: MigrationMode::Move,
        }
    }
}

impl IslandConfig {
    /// Sets the number of islands (at least 1).
    pub fn with_subpopulation_count(mut self, n: usize) -> Self {
        self.subpopulation_count = n.max(1);
        self
    }

    /// Sets the migration interval (0 to disable).
    pub fn with_epoch_length(mut self, generations: u64) -> Self {
        self.epoch_length = generations;
        self
    }

    /// Sets the number of migrants per island.
    pub fn with_migrants_count(mut self, n: usize) -> Self {
        self.migrants_count = n;
        self
    }

    /// Sets the migration mode.
    pub fn with_migration(mut self, mode: MigrationMode) -> Self {
        self.migration = mode;
        self
    }

    /// Validates the configuration.
    ///
    /// Returns `Err` with a description if any parameter is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.subpopulation_count == 0 {
            return Err("subpopulation_count must be at least 1".into());
        }
        if self.subpopulation_count == 1 && self.epoch_length > 0 && self.migrants_count > 0 {
            return Err("migration needs at least 2 subpopulations".into());
        }
        Ok(())
    }

    /// Returns `true` if migration ever happens.
    pub fn migrates(&self) -> bool {
        self.epoch_length > 0 && self.migrants_count > 0 && self.subpopulation_count > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IslandConfig::default();
        assert_eq!(config.subpopulation_count, 2);
        assert_eq!(config.epoch_length, 10);
        assert_eq!(config.migrants_count, 1);
        assert_eq!(config.migration, MigrationMode::Move);
        assert!(config.validate().is_ok());
        assert!(config.migrates());
    }

    #[test]
    fn test_subpopulation_count_clamps() {
        let config = IslandConfig::default().with_subpopulation_count(0);
        assert_eq!(config.subpopulation_count, 1);
    }

    #[test]
    fn test_single_island_cannot_migrate() {
        let config = IslandConfig::default().with_subpopulation_count(1);
        assert!(config.validate().is_err());
        assert!(config.with_epoch_length(0).validate().is_ok());
    }
}
