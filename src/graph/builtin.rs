//! Genotype-agnostic operators.
//!
//! Problem-specific mutation and recombination live with the genotype;
//! these cover initialization, selection and list plumbing, plus
//! [`FnOperator`] for wrapping a closure as a graph node.

use super::operator::{Context, Environment, Operator};
use crate::error::{EngineError, GraphError, PortDirection, Result};
use crate::param::{ParamValue, ParameterSet};
use crate::population::{Genotype, Individual, IndividualList};

/// Creates `size` random individuals from the search space (0 in, 1 out).
#[derive(Debug, Clone)]
pub struct RandomInitialization {
    size: usize,
}

impl RandomInitialization {
    /// Initialization producing `size` individuals.
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    /// Number of individuals produced.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl<G: Genotype> Operator<G> for RandomInitialization {
    fn name(&self) -> &str {
        "RandomInitialization"
    }

    fn in_ports(&self) -> usize {
        0
    }

    fn out_ports(&self) -> usize {
        1
    }

    fn check_syntax(&self) -> std::result::Result<(), GraphError> {
        if self.size == 0 {
            return Err(GraphError::Syntax {
                node: "RandomInitialization".into(),
                message: "size must be at least 1".into(),
            });
        }
        Ok(())
    }

    fn parameters(&self) -> ParameterSet {
        ParameterSet::new().with("size", ParamValue::Int(self.size as i64))
    }

    fn configure(&mut self, params: &ParameterSet) -> Result<()> {
        self.size = params.usize("size")?;
        Ok(())
    }

    fn process(&mut self, _inputs: Vec<IndividualList<G>>, ctx: &mut Context<'_, G>) -> Result<Vec<IndividualList<G>>> {
        let born = ctx.birth();
        let mut out = IndividualList::with_capacity(self.size);
        for _ in 0..self.size {
            let genotype = ctx.space.random_genotype(ctx.rng);
            out.push(Individual::new(genotype, born));
        }
        Ok(vec![out])
    }
}

/// Passes its input through unchanged (1 in, 1 out).
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<G: Genotype> Operator<G> for Identity {
    fn name(&self) -> &str {
        "Identity"
    }

    fn in_ports(&self) -> usize {
        1
    }

    fn out_ports(&self) -> usize {
        1
    }

    fn process(&mut self, inputs: Vec<IndividualList<G>>, _ctx: &mut Context<'_, G>) -> Result<Vec<IndividualList<G>>> {
        Ok(inputs)
    }
}

/// Keeps the `count` best individuals, walking tie blocks (1 in, 1 out).
#[derive(Debug, Clone)]
pub struct EliteSelection {
    count: usize,
}

impl EliteSelection {
    /// Elitist selection of `count` individuals.
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

impl<G: Genotype> Operator<G> for EliteSelection {
    fn name(&self) -> &str {
        "EliteSelection"
    }

    fn in_ports(&self) -> usize {
        1
    }

    fn out_ports(&self) -> usize {
        1
    }

    fn test_environment(&self, env: &Environment<'_, G>) -> Result<()> {
        rank_queries_supported("EliteSelection", env)
    }

    fn parameters(&self) -> ParameterSet {
        ParameterSet::new().with("count", ParamValue::Int(self.count as i64))
    }

    fn configure(&mut self, params: &ParameterSet) -> Result<()> {
        self.count = params.usize("count")?;
        Ok(())
    }

    fn process(&mut self, inputs: Vec<IndividualList<G>>, ctx: &mut Context<'_, G>) -> Result<Vec<IndividualList<G>>> {
        let input = first_input(inputs, "EliteSelection")?;
        if input.is_empty() {
            return Ok(vec![input]);
        }
        let elite = input.best_n(self.count, ctx.fitness, ctx.rng)?;
        Ok(vec![elite])
    }
}

/// Keeps the best `fraction` of the input and refills to the input size by
/// cycling through the survivors (1 in, 1 out).
#[derive(Debug, Clone)]
pub struct TruncationSelection {
    fraction: f64,
}

impl TruncationSelection {
    /// Truncation keeping `fraction` (clamped to `(0, 1]`).
    pub fn new(fraction: f64) -> Self {
        Self {
            fraction: fraction.clamp(f64::MIN_POSITIVE, 1.0),
        }
    }
}

impl<G: Genotype> Operator<G> for TruncationSelection {
    fn name(&self) -> &str {
        "TruncationSelection"
    }

    fn in_ports(&self) -> usize {
        1
    }

    fn out_ports(&self) -> usize {
        1
    }

    fn test_environment(&self, env: &Environment<'_, G>) -> Result<()> {
        rank_queries_supported("TruncationSelection", env)
    }

    fn parameters(&self) -> ParameterSet {
        ParameterSet::new().with("fraction", ParamValue::Float(self.fraction))
    }

    fn configure(&mut self, params: &ParameterSet) -> Result<()> {
        let fraction = params.f64("fraction")?;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(EngineError::Configuration(format!(
                "truncation fraction must be in (0, 1], got {fraction}"
            )));
        }
        self.fraction = fraction;
        Ok(())
    }

    fn process(&mut self, inputs: Vec<IndividualList<G>>, ctx: &mut Context<'_, G>) -> Result<Vec<IndividualList<G>>> {
        let input = first_input(inputs, "TruncationSelection")?;
        let n = input.len();
        if n == 0 {
            return Ok(vec![input]);
        }
        let keep = ((n as f64 * self.fraction).ceil() as usize).clamp(1, n.max(1));
        let survivors = input.best_n(keep, ctx.fitness, ctx.rng)?;
        let out = survivors.iter().cycle().take(n).cloned().collect();
        Ok(vec![out])
    }
}

/// Sends each individual to one of its out-ports at random (1 in, n out).
///
/// Port `i` is chosen with probability `probabilities[i]`. The vector always
/// has one entry per out-port and sums to one: adding a port gives it weight
/// `1/(n+1)` and scales the others by `n/(n+1)`; removing a port
/// renormalizes the rest.
#[derive(Debug, Clone)]
pub struct RandomSplit {
    probabilities: Vec<f64>,
}

impl RandomSplit {
    /// Uniform split over `ports` out-ports (at least 1).
    pub fn uniform(ports: usize) -> Self {
        let n = ports.max(1);
        Self {
            probabilities: vec![1.0 / n as f64; n],
        }
    }

    /// Split with the given weights, normalized to sum to one.
    pub fn with_weights(weights: Vec<f64>) -> Result<Self> {
        let mut split = Self {
            probabilities: Vec::new(),
        };
        split.set_probabilities(weights)?;
        Ok(split)
    }

    /// Current probability vector.
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    fn set_probabilities(&mut self, weights: Vec<f64>) -> Result<()> {
        let total: f64 = weights.iter().sum();
        if weights.is_empty() || weights.iter().any(|w| !w.is_finite() || *w < 0.0) || total <= 0.0 {
            return Err(EngineError::Configuration(format!(
                "split weights must be non-negative with a positive sum, got {weights:?}"
            )));
        }
        self.probabilities = weights.into_iter().map(|w| w / total).collect();
        Ok(())
    }

    fn pick(&self, roll: f64) -> usize {
        let mut acc = 0.0;
        for (i, p) in self.probabilities.iter().enumerate() {
            acc += p;
            if roll < acc {
                return i;
            }
        }
        self.probabilities.len() - 1
    }
}

impl<G: Genotype> Operator<G> for RandomSplit {
    fn name(&self) -> &str {
        "RandomSplit"
    }

    fn in_ports(&self) -> usize {
        1
    }

    fn out_ports(&self) -> usize {
        self.probabilities.len()
    }

    fn add_port(&mut self, direction: PortDirection) -> std::result::Result<(), GraphError> {
        if direction == PortDirection::In {
            return Err(GraphError::FixedArity {
                node: "RandomSplit".into(),
                direction,
            });
        }
        let n = self.probabilities.len() as f64;
        for p in &mut self.probabilities {
            *p *= n / (n + 1.0);
        }
        self.probabilities.push(1.0 / (n + 1.0));
        Ok(())
    }

    fn remove_port(&mut self, direction: PortDirection, index: usize) -> std::result::Result<(), GraphError> {
        if direction == PortDirection::In || self.probabilities.len() <= 1 {
            return Err(GraphError::FixedArity {
                node: "RandomSplit".into(),
                direction,
            });
        }
        self.probabilities.remove(index);
        let total: f64 = self.probabilities.iter().sum();
        if total > 0.0 {
            for p in &mut self.probabilities {
                *p /= total;
            }
        } else {
            let n = self.probabilities.len() as f64;
            self.probabilities.iter_mut().for_each(|p| *p = 1.0 / n);
        }
        Ok(())
    }

    fn check_syntax(&self) -> std::result::Result<(), GraphError> {
        let total: f64 = self.probabilities.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(GraphError::Syntax {
                node: "RandomSplit".into(),
                message: format!("probabilities sum to {total}, expected 1"),
            });
        }
        Ok(())
    }

    fn parameters(&self) -> ParameterSet {
        ParameterSet::new().with("probabilities", ParamValue::FloatVec(self.probabilities.clone()))
    }

    fn configure(&mut self, params: &ParameterSet) -> Result<()> {
        let weights = params.floats("probabilities")?.to_vec();
        if weights.len() != self.probabilities.len() {
            return Err(EngineError::Configuration(format!(
                "RandomSplit has {} out-ports, got {} probabilities",
                self.probabilities.len(),
                weights.len()
            )));
        }
        self.set_probabilities(weights)
    }

    fn process(&mut self, inputs: Vec<IndividualList<G>>, ctx: &mut Context<'_, G>) -> Result<Vec<IndividualList<G>>> {
        let input = first_input(inputs, "RandomSplit")?;
        let mut outs: Vec<IndividualList<G>> = (0..self.probabilities.len()).map(|_| IndividualList::new()).collect();
        for member in input {
            let port = self.pick(ctx.rng.uniform(0.0, 1.0));
            outs[port].push_ref(member);
        }
        Ok(outs)
    }
}

/// Concatenates its inputs in port order (n in, 1 out).
#[derive(Debug, Clone)]
pub struct Merge {
    inputs: usize,
}

impl Merge {
    /// Merge over `inputs` in-ports (at least 1).
    pub fn new(inputs: usize) -> Self {
        Self {
            inputs: inputs.max(1),
        }
    }
}

impl<G: Genotype> Operator<G> for Merge {
    fn name(&self) -> &str {
        "Merge"
    }

    fn in_ports(&self) -> usize {
        self.inputs
    }

    fn out_ports(&self) -> usize {
        1
    }

    fn add_port(&mut self, direction: PortDirection) -> std::result::Result<(), GraphError> {
        if direction == PortDirection::Out {
            return Err(GraphError::FixedArity {
                node: "Merge".into(),
                direction,
            });
        }
        self.inputs += 1;
        Ok(())
    }

    fn remove_port(&mut self, direction: PortDirection, _index: usize) -> std::result::Result<(), GraphError> {
        if direction == PortDirection::Out || self.inputs <= 1 {
            return Err(GraphError::FixedArity {
                node: "Merge".into(),
                direction,
            });
        }
        self.inputs -= 1;
        Ok(())
    }

    fn process(&mut self, inputs: Vec<IndividualList<G>>, _ctx: &mut Context<'_, G>) -> Result<Vec<IndividualList<G>>> {
        Ok(vec![IndividualList::concat(&inputs)])
    }
}

/// A 1-in/1-out operator backed by a closure.
///
/// ```
/// use u_evoflow::graph::{FnOperator, Operator};
/// use u_evoflow::population::IndividualList;
///
/// // Keep only the first half of every list.
/// let halve = FnOperator::new("Halve", |list: IndividualList<u32>, _ctx| {
///     let keep = list.len() / 2;
///     Ok(list.into_iter().take(keep).collect())
/// });
/// assert_eq!(Operator::<u32>::in_ports(&halve), 1);
/// ```
pub struct FnOperator<F> {
    name: String,
    func: F,
}

impl<F> FnOperator<F> {
    /// Wraps `func` under `name`.
    pub fn new<G>(name: impl Into<String>, func: F) -> Self
    where
        F: FnMut(IndividualList<G>, &mut Context<'_, G>) -> Result<IndividualList<G>> + Send,
    {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<G, F> Operator<G> for FnOperator<F>
where
    G: Genotype,
    F: FnMut(IndividualList<G>, &mut Context<'_, G>) -> Result<IndividualList<G>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn in_ports(&self) -> usize {
        1
    }

    fn out_ports(&self) -> usize {
        1
    }

    fn process(&mut self, inputs: Vec<IndividualList<G>>, ctx: &mut Context<'_, G>) -> Result<Vec<IndividualList<G>>> {
        let input = first_input(inputs, &self.name)?;
        Ok(vec![(self.func)(input, ctx)?])
    }
}

fn first_input<G>(inputs: Vec<IndividualList<G>>, name: &str) -> Result<IndividualList<G>> {
    inputs
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::operator(name, "no input list"))
}

/// Rank-based operators need a single-objective fitness function.
fn rank_queries_supported<G>(module: &str, env: &Environment<'_, G>) -> Result<()> {
    match env.fitness.objective_count() {
        1 => Ok(()),
        n => Err(EngineError::UnsupportedEnvironment {
            module: module.into(),
            reason: format!(
                "needs a single-objective fitness function, '{}' has {n} objectives",
                env.fitness.name()
            ),
        }),
    }
}
