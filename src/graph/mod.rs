//! Operator graphs.
//!
//! An [`OperatorGraph`] is a directed acyclic graph of [`Operator`] nodes
//! whose ports carry [`IndividualList`](crate::population::IndividualList)s.
//! One call to [`OperatorGraph::process`] runs every node once, in
//! dependency order, and yields the lists at the designated outputs.
//!
//! # Example
//!
//! ```
//! use u_evoflow::graph::{EliteSelection, Identity, Merge, OperatorGraph};
//!
//! // Keep the best two individuals and add an untouched copy of the input.
//! let mut graph: OperatorGraph<Vec<bool>> = OperatorGraph::new();
//! let elite = graph.add_node(EliteSelection::new(2));
//! let keep = graph.add_node(Identity);
//! let merge = graph.add_node(Merge::new(2));
//! graph.set_entry(elite, 0).unwrap();
//! graph.set_entry(keep, 0).unwrap();
//! graph.connect(elite, 0, merge, 0).unwrap();
//! graph.connect(keep, 0, merge, 1).unwrap();
//! graph.add_output(merge, 0).unwrap();
//! assert!(graph.check_syntax().is_ok());
//! ```

mod builtin;
mod dataflow;
mod operator;

pub use builtin::{EliteSelection, FnOperator, Identity, Merge, RandomInitialization, RandomSplit, TruncationSelection};
pub use dataflow::{NodeId, OperatorGraph, PortRef, PortsChanged};
pub use operator::{Context, Environment, Operator};
