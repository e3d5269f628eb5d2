//! Search space and genotype/phenotype mapping contracts.

use crate::random::RandomSource;

/// The set of genotypes a run searches over.
pub trait SearchSpace<G>: Send + Sync {
    /// Returns a human-readable name for this search space.
    fn name(&self) -> &str;

    /// Draws a uniformly random genotype.
    fn random_genotype(&self, rng: &mut RandomSource) -> G;

    /// Number of distinct genotypes, if finite and known.
    fn size(&self) -> Option<u128> {
        None
    }
}

/// Maps genotypes to the phenotypes fitness functions look at.
///
/// The reverse direction is optional; mappers that cannot invert return `None`.
pub trait Mapper<G>: Send + Sync {
    /// Phenotype type produced by this mapper.
    type Phenotype: Send + Sync + 'static;

    /// Maps a genotype to its phenotype.
    fn genotype_to_phenotype(&self, genotype: &G) -> Self::Phenotype;

    /// Maps a phenotype back to a genotype, if supported.
    fn phenotype_to_genotype(&self, _phenotype: &Self::Phenotype) -> Option<G> {
        None
    }
}

/// Mapper whose phenotype is a copy of the genotype.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl<G: Clone + Send + Sync + 'static> Mapper<G> for IdentityMapper {
    type Phenotype = G;

    fn genotype_to_phenotype(&self, genotype: &G) -> G {
        genotype.clone()
    }

    fn phenotype_to_genotype(&self, phenotype: &G) -> Option<G> {
        Some(phenotype.clone())
    }
}

/// Search space over bit strings of fixed length.
///
/// Mostly useful for tests and benchmarks.
#[derive(Debug, Clone)]
pub struct BitStringSpace {
    length: usize,
}

impl BitStringSpace {
    /// Creates a space of bit strings with `length` bits.
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    /// Number of bits per genotype.
    pub fn length(&self) -> usize {
        self.length
    }
}

impl SearchSpace<Vec<bool>> for BitStringSpace {
    fn name(&self) -> &str {
        "BitString"
    }

    fn random_genotype(&self, rng: &mut RandomSource) -> Vec<bool> {
        (0..self.length).map(|_| rng.flip(0.5)).collect()
    }

    fn size(&self) -> Option<u128> {
        u32::try_from(self.length).ok().and_then(|n| 1u128.checked_shl(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_round_trip() {
        let m = IdentityMapper;
        let p = Mapper::<Vec<u8>>::genotype_to_phenotype(&m, &vec![1, 2, 3]);
        assert_eq!(p, vec![1, 2, 3]);
        assert_eq!(m.phenotype_to_genotype(&p), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_bit_string_space() {
        let space = BitStringSpace::new(8);
        let mut rng = RandomSource::new(1);
        let g = space.random_genotype(&mut rng);
        assert_eq!(g.len(), 8);
        assert_eq!(space.size(), Some(256));
        assert_eq!(BitStringSpace::new(200).size(), None);
    }

    #[test]
    fn test_bit_string_size_does_not_wrap() {
        assert_eq!(BitStringSpace::new(127).size(), Some(1u128 << 127));
        assert_eq!(BitStringSpace::new(128).size(), None);
        let huge = u32::MAX as usize + 2;
        assert_eq!(SearchSpace::<Vec<bool>>::size(&BitStringSpace::new(huge)), None);
    }
}
