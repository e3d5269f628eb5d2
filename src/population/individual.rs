//! Individuals and their tags.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use crate::space::Mapper;

/// Whether a tag is passed on to offspring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Inheritance {
    /// Copied to every offspring and clone.
    Inheritable,
    /// Stays with the individual that carries it.
    NotInheritable,
}

/// Value stored under a tag key.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TagValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

/// A tag value together with its inheritance mode.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag {
    pub value: TagValue,
    pub inheritance: Inheritance,
}

/// Key → tag map carried by an individual. Iteration order is by key.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tags {
    entries: BTreeMap<String, Tag>,
}

impl Tags {
    /// Creates an empty tag map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a tag, replacing any previous value under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: TagValue, inheritance: Inheritance) {
        self.entries.insert(key.into(), Tag { value, inheritance });
    }

    /// Looks up a tag.
    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.entries.get(key)
    }

    /// Removes a tag.
    pub fn remove(&mut self, key: &str) -> Option<Tag> {
        self.entries.remove(key)
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no tags.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(key, tag)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(k, t)| (k.as_str(), t))
    }

    /// Inheritable tags of all `parents`; for duplicate keys the first parent wins.
    pub fn inherited<'a, I>(parents: I) -> Self
    where
        I: IntoIterator<Item = &'a Tags>,
    {
        let mut out = Tags::new();
        for tags in parents {
            for (key, tag) in &tags.entries {
                if tag.inheritance == Inheritance::Inheritable && !out.entries.contains_key(key) {
                    out.entries.insert(key.clone(), tag.clone());
                }
            }
        }
        out
    }
}

/// A candidate solution.
///
/// The genotype is shared behind an [`Arc`] and never mutated in place once
/// the individual has been handed to a list. Phenotype and fitness are
/// memoized and dropped whenever [`set_genotype`](Self::set_genotype)
/// replaces the genotype.
///
/// [`Clone`] keeps the genotype reference and date of birth, copies only the
/// inheritable tags, and keeps the memoized phenotype and fitness (they
/// depend on the genotype alone).
pub struct Individual<G> {
    genotype: Arc<G>,
    born: u64,
    tags: Tags,
    phenotype: OnceLock<Arc<dyn Any + Send + Sync>>,
    fitness: Mutex<Option<Vec<f64>>>,
}

impl<G> Individual<G> {
    /// Creates an individual born in generation `born`.
    pub fn new(genotype: G, born: u64) -> Self {
        Self::from_shared(Arc::new(genotype), born)
    }

    /// Creates an individual around an already shared genotype.
    pub fn from_shared(genotype: Arc<G>, born: u64) -> Self {
        Self {
            genotype,
            born,
            tags: Tags::new(),
            phenotype: OnceLock::new(),
            fitness: Mutex::new(None),
        }
    }

    /// Creates an offspring of `parents` carrying their inheritable tags.
    pub fn offspring(parents: &[&Individual<G>], genotype: G, born: u64) -> Self {
        let mut child = Self::new(genotype, born);
        child.tags = Tags::inherited(parents.iter().map(|p| &p.tags));
        child
    }

    /// The genotype.
    pub fn genotype(&self) -> &G {
        &self.genotype
    }

    /// Shared handle to the genotype.
    pub fn shared_genotype(&self) -> &Arc<G> {
        &self.genotype
    }

    /// Replaces the genotype and drops cached phenotype and fitness.
    ///
    /// Only the creating operator should call this, before the individual
    /// is placed in a list.
    pub fn set_genotype(&mut self, genotype: G) {
        self.genotype = Arc::new(genotype);
        self.phenotype = OnceLock::new();
        *self.fitness_slot() = None;
    }

    /// Generation number in which this individual was created.
    pub fn date_of_birth(&self) -> u64 {
        self.born
    }

    /// Tags of this individual.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Mutable tags, for the creating operator.
    pub fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }

    /// Builder-style tag setter.
    pub fn with_tag(mut self, key: impl Into<String>, value: TagValue, inheritance: Inheritance) -> Self {
        self.tags.set(key, value, inheritance);
        self
    }

    /// Phenotype under `mapper`, computed on first use.
    ///
    /// The cache holds one phenotype; asking with a mapper of a different
    /// phenotype type maps again without caching.
    pub fn phenotype<M: Mapper<G>>(&self, mapper: &M) -> Arc<M::Phenotype> {
        if let Some(cached) = self.phenotype.get() {
            if let Ok(p) = Arc::clone(cached).downcast::<M::Phenotype>() {
                return p;
            }
            return Arc::new(mapper.genotype_to_phenotype(&self.genotype));
        }
        let p = Arc::new(mapper.genotype_to_phenotype(&self.genotype));
        let erased: Arc<dyn Any + Send + Sync> = p.clone();
        let _ = self.phenotype.set(erased);
        p
    }

    /// Latest recorded fitness vector.
    pub fn latest_fitness(&self) -> Option<Vec<f64>> {
        self.fitness_slot().clone()
    }

    /// Records the latest fitness vector.
    pub fn record_fitness(&self, value: Vec<f64>) {
        *self.fitness_slot() = Some(value);
    }

    fn fitness_slot(&self) -> std::sync::MutexGuard<'_, Option<Vec<f64>>> {
        self.fitness.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<G> Clone for Individual<G> {
    fn clone(&self) -> Self {
        let phenotype = OnceLock::new();
        if let Some(p) = self.phenotype.get() {
            let _ = phenotype.set(Arc::clone(p));
        }
        Self {
            genotype: Arc::clone(&self.genotype),
            born: self.born,
            tags: Tags::inherited([&self.tags]),
            phenotype,
            fitness: Mutex::new(self.latest_fitness()),
        }
    }
}

impl<G: fmt::Debug> fmt::Debug for Individual<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Individual")
            .field("genotype", &self.genotype)
            .field("born", &self.born)
            .field("tags", &self.tags)
            .field("fitness", &self.latest_fitness())
            .finish()
    }
}
