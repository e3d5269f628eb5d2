//! Error types for the engine.
//!
//! Errors fall into three groups that the [`Schedule`](crate::schedule::Schedule)
//! treats differently:
//!
//! - **Configuration errors** ([`GraphError`], [`EngineError::UnsupportedEnvironment`],
//!   [`EngineError::Configuration`]) are raised by the validation pass before
//!   any individual exists. Nothing runs.
//! - **Runtime errors** ([`EngineError::NoSuchIndividual`], operator and
//!   listener failures) abort the current run only.
//! - **Capability signals** ([`EngineError::Unsupported`], [`RankError::MultiObjective`])
//!   report that an optional operation is not available.

use std::fmt;
use thiserror::Error;

/// Direction of a port on an operator node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PortDirection {
    /// Port receiving an individual list.
    In,
    /// Port emitting an individual list.
    Out,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::In => f.write_str("in"),
            PortDirection::Out => f.write_str("out"),
        }
    }
}

/// Structural or execution error of an operator graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The dependency graph contains a cycle through the listed operators.
    #[error("cycle through operators: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    /// A port has no partner.
    #[error("{direction}-port {port} of operator '{node}' is not connected")]
    UnconnectedPort {
        node: String,
        direction: PortDirection,
        port: usize,
    },

    /// An in-port has more than one producer.
    #[error("in-port {port} of operator '{node}' has {partners} producers, expected 1")]
    PortCardinality {
        node: String,
        port: usize,
        partners: usize,
    },

    /// An operator returned a different number of lists than it declares out-ports.
    #[error("operator '{node}' returned {actual} lists for {expected} out-ports")]
    OutputLengthMismatch {
        node: String,
        expected: usize,
        actual: usize,
    },

    /// A node id does not exist in the graph.
    #[error("unknown operator node #{0}")]
    UnknownNode(usize),

    /// A port index is out of range for a node.
    #[error("operator '{node}' has no {direction}-port {port}")]
    UnknownPort {
        node: String,
        direction: PortDirection,
        port: usize,
    },

    /// The operator does not allow ports to be added or removed.
    #[error("operator '{node}' has a fixed number of {direction}-ports")]
    FixedArity {
        node: String,
        direction: PortDirection,
    },

    /// An operator reported an invalid internal configuration.
    #[error("operator '{node}': {message}")]
    Syntax { node: String, message: String },

    /// The graph has no designated sink port.
    #[error("operator graph has no output port")]
    NoOutput,
}

/// Failure of a rank query on an individual list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RankError {
    /// The list (or the working set) is empty.
    #[error("population is empty")]
    EmptyPopulation,

    /// The rank is outside `1..=size`.
    #[error("rank {rank} is outside 1..={size}")]
    RankOutOfRange { rank: usize, size: usize },

    /// Rank queries are undefined for multi-objective fitness.
    #[error("rank queries need a single-objective fitness function, got {objectives} objectives")]
    MultiObjective { objectives: usize },
}

/// Top-level engine error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Invalid operator graph.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// A module cannot work with the configured environment.
    #[error("module '{module}' does not support this environment: {reason}")]
    UnsupportedEnvironment { module: String, reason: String },

    /// An operation needed a non-empty population and none existed.
    #[error("no such individual: {0}")]
    NoSuchIndividual(String),

    /// An optional capability is not provided.
    #[error("unsupported capability: {capability}")]
    Unsupported { capability: String },

    /// An event listener failed while handling an event.
    #[error("listener '{listener}' failed: {message}")]
    Listener { listener: String, message: String },

    /// An operator failed at runtime.
    #[error("operator '{operator}' failed: {message}")]
    Operator { operator: String, message: String },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl From<RankError> for EngineError {
    fn from(err: RankError) -> Self {
        match err {
            RankError::EmptyPopulation | RankError::RankOutOfRange { .. } => {
                EngineError::NoSuchIndividual(err.to_string())
            }
            RankError::MultiObjective { .. } => EngineError::Unsupported {
                capability: err.to_string(),
            },
        }
    }
}

impl EngineError {
    /// Shorthand for a listener failure.
    pub fn listener(listener: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Listener {
            listener: listener.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an operator failure.
    pub fn operator(operator: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Operator {
            operator: operator.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for errors detected by the pre-run validation pass.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::Graph(_)
                | EngineError::UnsupportedEnvironment { .. }
                | EngineError::Configuration(_)
        )
    }

    /// Returns `true` for errors that abort only the current run.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::NoSuchIndividual(_)
                | EngineError::Unsupported { .. }
                | EngineError::Listener { .. }
                | EngineError::Operator { .. }
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_error_maps_to_runtime_or_capability() {
        let e: EngineError = RankError::EmptyPopulation.into();
        assert!(matches!(e, EngineError::NoSuchIndividual(_)));

        let e: EngineError = RankError::MultiObjective { objectives: 2 }.into();
        assert!(matches!(e, EngineError::Unsupported { .. }));
    }

    #[test]
    fn test_configuration_classification() {
        assert!(EngineError::from(GraphError::NoOutput).is_configuration());
        assert!(EngineError::Configuration("x".into()).is_configuration());
        assert!(!EngineError::NoSuchIndividual("x".into()).is_configuration());
        assert!(!EngineError::listener("l", "boom").is_configuration());
        assert!(EngineError::listener("l", "boom").is_run_fatal());
        assert!(!EngineError::from(GraphError::NoOutput).is_run_fatal());
    }

    #[test]
    fn test_cycle_message_lists_nodes() {
        let e = GraphError::Cycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(e.to_string(), "cycle through operators: a -> b -> a");
    }
}
