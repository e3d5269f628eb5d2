//! Operator dataflow graph: structure, validation and execution.

use std::fmt;

use super::operator::{Context, Environment, Operator};
use crate::error::{GraphError, PortDirection, Result};
use crate::population::IndividualList;

/// Handle of a node in an [`OperatorGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in insertion order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A port of a specific node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub port: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edge {
    from: PortRef,
    to: PortRef,
}

/// Notification raised after a structural port edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortsChanged {
    pub node: NodeId,
    pub operator: String,
    pub direction: PortDirection,
    /// Index of the added or removed port.
    pub index: usize,
    pub added: bool,
    /// Port count in `direction` after the edit.
    pub count: usize,
}

type PortObserver = Box<dyn FnMut(&PortsChanged) + Send>;

/// A directed graph of operators connected port to port.
///
/// The graph input (the population handed to [`process`](Self::process))
/// enters through *entry* in-ports; the lists at *output* out-ports are the
/// result. Every in-port must have exactly one producer (an edge or the
/// graph input); every out-port must feed at least one in-port or be an
/// output. An out-port feeding several consumers hands each a shallow clone.
pub struct OperatorGraph<G> {
    nodes: Vec<Option<Box<dyn Operator<G>>>>,
    edges: Vec<Edge>,
    entries: Vec<PortRef>,
    outputs: Vec<PortRef>,
    observers: Vec<PortObserver>,
}

impl<G> OperatorGraph<G> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            entries: Vec::new(),
            outputs: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// A graph `entry -> op -> output` around a single 1-in/1-out operator.
    pub fn single<O: Operator<G> + 'static>(op: O) -> std::result::Result<Self, GraphError> {
        let mut graph = Self::new();
        let node = graph.add_node(op);
        graph.set_entry(node, 0)?;
        graph.add_output(node, 0)?;
        Ok(graph)
    }

    /// Adds an operator node.
    pub fn add_node<O: Operator<G> + 'static>(&mut self, op: O) -> NodeId {
        self.add_boxed(Box::new(op))
    }

    /// Adds an already boxed operator node.
    pub fn add_boxed(&mut self, op: Box<dyn Operator<G>>) -> NodeId {
        self.nodes.push(Some(op));
        NodeId(self.nodes.len() - 1)
    }

    /// Removes a node and every connection touching it.
    pub fn remove_node(&mut self, node: NodeId) -> Option<Box<dyn Operator<G>>> {
        let op = self.nodes.get_mut(node.0)?.take()?;
        self.edges.retain(|e| e.from.node != node && e.to.node != node);
        self.entries.retain(|p| p.node != node);
        self.outputs.retain(|p| p.node != node);
        Some(op)
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// Operator at `node`.
    pub fn operator(&self, node: NodeId) -> Option<&dyn Operator<G>> {
        self.nodes.get(node.0)?.as_deref()
    }

    /// Mutable operator at `node`.
    pub fn operator_mut(&mut self, node: NodeId) -> Option<&mut (dyn Operator<G> + 'static)> {
        self.nodes.get_mut(node.0)?.as_deref_mut()
    }

    /// Live nodes with their operators, in insertion order.
    pub fn operators(&self) -> impl Iterator<Item = (NodeId, &(dyn Operator<G> + 'static))> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_deref().map(|op| (NodeId(i), op)))
    }

    /// Mutable live operators, in insertion order.
    pub fn operators_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Operator<G>>> {
        self.nodes.iter_mut().flatten()
    }

    /// Connects out-port `out_port` of `from` to in-port `in_port` of `to`.
    pub fn connect(
        &mut self,
        from: NodeId,
        out_port: usize,
        to: NodeId,
        in_port: usize,
    ) -> std::result::Result<(), GraphError> {
        self.check_port(from, PortDirection::Out, out_port)?;
        self.check_port(to, PortDirection::In, in_port)?;
        let edge = Edge {
            from: PortRef {
                node: from,
                port: out_port,
            },
            to: PortRef {
                node: to,
                port: in_port,
            },
        };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        Ok(())
    }

    /// Removes a connection. Returns `true` if it existed.
    pub fn disconnect(&mut self, from: NodeId, out_port: usize, to: NodeId, in_port: usize) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| {
            !(e.from.node == from && e.from.port == out_port && e.to.node == to && e.to.port == in_port)
        });
        before != self.edges.len()
    }

    /// Feeds the graph input into in-port `port` of `node`.
    pub fn set_entry(&mut self, node: NodeId, port: usize) -> std::result::Result<(), GraphError> {
        self.check_port(node, PortDirection::In, port)?;
        let entry = PortRef { node, port };
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
        Ok(())
    }

    /// Designates out-port `port` of `node` as a graph output.
    pub fn add_output(&mut self, node: NodeId, port: usize) -> std::result::Result<(), GraphError> {
        self.check_port(node, PortDirection::Out, port)?;
        let output = PortRef { node, port };
        if !self.outputs.contains(&output) {
            self.outputs.push(output);
        }
        Ok(())
    }

    /// Subscribes to [`PortsChanged`] notifications.
    pub fn on_ports_changed<F>(&mut self, observer: F)
    where
        F: FnMut(&PortsChanged) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Appends a port to a variable-arity operator.
    pub fn add_port(&mut self, node: NodeId, direction: PortDirection) -> std::result::Result<PortsChanged, GraphError> {
        let op = self.live_mut(node)?;
        op.add_port(direction)?;
        let count = port_count(op, direction);
        let change = PortsChanged {
            node,
            operator: op.name().to_string(),
            direction,
            index: count - 1,
            added: true,
            count,
        };
        self.notify(&change);
        Ok(change)
    }

    /// Removes a port from a variable-arity operator.
    ///
    /// Connections on the removed port are dropped; connections on later
    /// ports of the same side shift down by one.
    pub fn remove_port(
        &mut self,
        node: NodeId,
        direction: PortDirection,
        index: usize,
    ) -> std::result::Result<PortsChanged, GraphError> {
        self.check_port(node, direction, index)?;
        let op = self.live_mut(node)?;
        op.remove_port(direction, index)?;
        let count = port_count(op, direction);
        let change = PortsChanged {
            node,
            operator: op.name().to_string(),
            direction,
            index,
            added: false,
            count,
        };

        let on_side = |p: &PortRef, side: PortDirection| side == direction && p.node == node;
        self.edges.retain(|e| {
            let dropped_from = on_side(&e.from, PortDirection::Out) && e.from.port == index;
            let dropped_to = on_side(&e.to, PortDirection::In) && e.to.port == index;
            !dropped_from && !dropped_to
        });
        for e in &mut self.edges {
            if on_side(&e.from, PortDirection::Out) && e.from.port > index {
                e.from.port -= 1;
            }
            if on_side(&e.to, PortDirection::In) && e.to.port > index {
                e.to.port -= 1;
            }
        }
        let side_refs = match direction {
            PortDirection::In => &mut self.entries,
            PortDirection::Out => &mut self.outputs,
        };
        side_refs.retain(|p| !(p.node == node && p.port == index));
        for p in side_refs.iter_mut() {
            if p.node == node && p.port > index {
                p.port -= 1;
            }
        }

        self.notify(&change);
        Ok(change)
    }

    /// Static validation: connectivity, cardinality, operator syntax, cycles.
    pub fn check_syntax(&self) -> std::result::Result<(), GraphError> {
        if self.outputs.is_empty() {
            return Err(GraphError::NoOutput);
        }
        for (id, op) in self.operators() {
            op.check_syntax()?;

            for port in 0..op.in_ports() {
                let partners = self
                    .edges
                    .iter()
                    .filter(|e| e.to.node == id && e.to.port == port)
                    .count()
                    + self.entries.iter().filter(|p| p.node == id && p.port == port).count();
                match partners {
                    1 => {}
                    0 => {
                        return Err(GraphError::UnconnectedPort {
                            node: op.name().to_string(),
                            direction: PortDirection::In,
                            port,
                        })
                    }
                    n => {
                        return Err(GraphError::PortCardinality {
                            node: op.name().to_string(),
                            port,
                            partners: n,
                        })
                    }
                }
            }

            for port in 0..op.out_ports() {
                let used = self.edges.iter().any(|e| e.from.node == id && e.from.port == port)
                    || self.outputs.iter().any(|p| p.node == id && p.port == port);
                if !used {
                    return Err(GraphError::UnconnectedPort {
                        node: op.name().to_string(),
                        direction: PortDirection::Out,
                        port,
                    });
                }
            }
        }

        for e in &self.edges {
            self.check_port(e.from.node, PortDirection::Out, e.from.port)?;
            self.check_port(e.to.node, PortDirection::In, e.to.port)?;
        }
        for p in &self.entries {
            self.check_port(p.node, PortDirection::In, p.port)?;
        }
        for p in &self.outputs {
            self.check_port(p.node, PortDirection::Out, p.port)?;
        }

        self.topological_order().map(|_| ())
    }

    /// Static validation followed by every operator's environment test.
    pub fn test_schedule(&self, env: &Environment<'_, G>) -> Result<()> {
        self.check_syntax()?;
        for (_, op) in self.operators() {
            op.test_environment(env)?;
        }
        Ok(())
    }

    /// Calls [`Operator::reset`] on every node.
    pub fn reset(&mut self) {
        for op in self.operators_mut() {
            op.reset();
        }
    }

    /// Runs every node once in dependency order and returns the output lists.
    pub fn process(&mut self, initial: &IndividualList<G>, ctx: &mut Context<'_, G>) -> Result<Vec<IndividualList<G>>> {
        let order = self.topological_order()?;

        let mut inbox: Vec<Vec<Option<IndividualList<G>>>> = self
            .nodes
            .iter()
            .map(|n| vec![None; n.as_ref().map_or(0, |op| op.in_ports())])
            .collect();
        for entry in &self.entries {
            if let Some(slot) = inbox.get_mut(entry.node.0).and_then(|ports| ports.get_mut(entry.port)) {
                *slot = Some(initial.clone());
            }
        }

        let mut results: Vec<Option<IndividualList<G>>> = vec![None; self.outputs.len()];
        for id in order {
            let Some(op) = self.nodes[id.0].as_deref_mut() else {
                continue;
            };
            let mut inputs = Vec::with_capacity(op.in_ports());
            for (port, slot) in inbox[id.0].iter_mut().enumerate() {
                let list = slot.take().ok_or_else(|| GraphError::UnconnectedPort {
                    node: op.name().to_string(),
                    direction: PortDirection::In,
                    port,
                })?;
                inputs.push(list);
            }

            log::trace!("{}: running '{}' on {} lists", ctx.generation, op.name(), inputs.len());
            let outputs = op.process(inputs, ctx)?;
            if outputs.len() != op.out_ports() {
                return Err(GraphError::OutputLengthMismatch {
                    node: op.name().to_string(),
                    expected: op.out_ports(),
                    actual: outputs.len(),
                }
                .into());
            }

            for (port, list) in outputs.into_iter().enumerate() {
                let from = PortRef { node: id, port };
                for e in self.edges.iter().filter(|e| e.from == from) {
                    if let Some(slot) = inbox.get_mut(e.to.node.0).and_then(|p| p.get_mut(e.to.port)) {
                        *slot = Some(list.clone());
                    }
                }
                for (i, out) in self.outputs.iter().enumerate() {
                    if *out == from {
                        results[i] = Some(list.clone());
                    }
                }
            }
        }

        Ok(results.into_iter().map(Option::unwrap_or_default).collect())
    }

    /// Live nodes in dependency order (Kahn's algorithm, ties by insertion order).
    pub fn topological_order(&self) -> std::result::Result<Vec<NodeId>, GraphError> {
        let n = self.nodes.len();
        let live = |i: usize| self.nodes[i].is_some();
        let mut indegree = vec![0usize; n];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for e in &self.edges {
            let (a, b) = (e.from.node.0, e.to.node.0);
            if a < n && b < n && live(a) && live(b) {
                indegree[b] += 1;
                successors[a].push(b);
            }
        }

        let mut ready: std::collections::BTreeSet<usize> =
            (0..n).filter(|&i| live(i) && indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_first() {
            order.push(NodeId(i));
            for &s in &successors[i] {
                indegree[s] -= 1;
                if indegree[s] == 0 {
                    ready.insert(s);
                }
            }
        }

        if order.len() == self.node_count() {
            return Ok(order);
        }

        // Every node left over has a predecessor that is also left over;
        // walk predecessors until one repeats.
        let stuck: Vec<bool> = (0..n).map(|i| live(i) && indegree[i] > 0).collect();
        let mut path = Vec::new();
        let mut cur = (0..n).find(|&i| stuck[i]).unwrap_or(0);
        loop {
            if let Some(pos) = path.iter().position(|&p| p == cur) {
                let mut cycle: Vec<usize> = path[pos..].to_vec();
                cycle.reverse();
                cycle.push(cycle[0]);
                return Err(GraphError::Cycle(cycle.into_iter().map(|i| self.node_name(i)).collect()));
            }
            path.push(cur);
            let pred = self
                .edges
                .iter()
                .find(|e| e.to.node.0 == cur && e.from.node.0 < n && stuck[e.from.node.0])
                .map(|e| e.from.node.0);
            match pred {
                Some(p) => cur = p,
                None => {
                    return Err(GraphError::Cycle(path.iter().map(|&i| self.node_name(i)).collect()));
                }
            }
        }
    }

    fn node_name(&self, index: usize) -> String {
        self.nodes
            .get(index)
            .and_then(|n| n.as_deref())
            .map_or_else(|| format!("#{index}"), |op| op.name().to_string())
    }

    fn live_mut(&mut self, node: NodeId) -> std::result::Result<&mut (dyn Operator<G> + 'static), GraphError> {
        self.nodes
            .get_mut(node.0)
            .and_then(|n| n.as_deref_mut())
            .ok_or(GraphError::UnknownNode(node.0))
    }

    fn check_port(&self, node: NodeId, direction: PortDirection, port: usize) -> std::result::Result<(), GraphError> {
        let op = self.operator(node).ok_or(GraphError::UnknownNode(node.0))?;
        if port < port_count(op, direction) {
            Ok(())
        } else {
            Err(GraphError::UnknownPort {
                node: op.name().to_string(),
                direction,
                port,
            })
        }
    }

    fn notify(&mut self, change: &PortsChanged) {
        log::debug!(
            "ports changed on '{}': {} {}-port {} (now {})",
            change.operator,
            if change.added { "added" } else { "removed" },
            change.direction,
            change.index,
            change.count
        );
        for observer in &mut self.observers {
            observer(change);
        }
    }
}

fn port_count<G>(op: &(dyn Operator<G> + '_), direction: PortDirection) -> usize {
    match direction {
        PortDirection::In => op.in_ports(),
        PortDirection::Out => op.out_ports(),
    }
}

impl<G> Default for OperatorGraph<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G> fmt::Debug for OperatorGraph<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.operators().map(|(_, op)| op.name().to_string()).collect();
        f.debug_struct("OperatorGraph")
            .field("nodes", &names)
            .field("edges", &self.edges.len())
            .field("entries", &self.entries)
            .field("outputs", &self.outputs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::EngineError;
    use crate::fitness::{FitnessFunction, FnFitness};
    use crate::graph::builtin::{
        EliteSelection, FnOperator, Identity, Merge, RandomInitialization, RandomSplit, TruncationSelection,
    };
    use crate::population::{Individual, IndividualList};
    use crate::random::RandomSource;
    use crate::schedule::GenerationIndex;
    use crate::space::BitStringSpace;

    type Bits = Vec<bool>;

    fn onemax() -> FnFitness<fn(&Bits) -> f64> {
        FnFitness::new("OneMax", (|g: &Bits| g.iter().filter(|b| **b).count() as f64) as fn(&Bits) -> f64)
    }

    struct TwoObjectives;

    impl FitnessFunction<Bits> for TwoObjectives {
        fn name(&self) -> &str {
            "TwoObjectives"
        }
        fn objective_count(&self) -> usize {
            2
        }
        fn evaluate(&self, ind: &Individual<Bits>, _ctx: &IndividualList<Bits>) -> Vec<f64> {
            vec![ind.genotype().len() as f64, 0.0]
        }
    }

    /// Claims one out-port but returns nothing.
    struct Broken;

    impl Operator<Bits> for Broken {
        fn name(&self) -> &str {
            "Broken"
        }
        fn in_ports(&self) -> usize {
            1
        }
        fn out_ports(&self) -> usize {
            1
        }
        fn process(&mut self, _inputs: Vec<IndividualList<Bits>>, _ctx: &mut Context<'_, Bits>) -> Result<Vec<IndividualList<Bits>>> {
            Ok(vec![])
        }
    }

    fn population(n: usize, rng: &mut RandomSource) -> IndividualList<Bits> {
        let space = BitStringSpace::new(10);
        let fitness = onemax();
        let mut ctx: Context<'_, Bits> = Context::new(rng, &fitness, &space, GenerationIndex::default());
        Operator::<Bits>::process(&mut RandomInitialization::new(n), vec![], &mut ctx)
            .unwrap()
            .remove(0)
    }

    fn run(graph: &mut OperatorGraph<Bits>, input: &IndividualList<Bits>) -> Result<Vec<IndividualList<Bits>>> {
        let mut rng = RandomSource::new(3);
        let fitness = onemax();
        let space = BitStringSpace::new(10);
        let mut ctx: Context<'_, Bits> = Context::new(&mut rng, &fitness, &space, GenerationIndex::default());
        graph.process(input, &mut ctx)
    }

    // ---- validation ----

    #[test]
    fn test_two_producers_on_single_in_port() {
        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let a = graph.add_node(Identity);
        let b = graph.add_node(Identity);
        let select = graph.add_node(EliteSelection::new(2));
        graph.set_entry(a, 0).unwrap();
        graph.set_entry(b, 0).unwrap();
        graph.connect(a, 0, select, 0).unwrap();
        graph.connect(b, 0, select, 0).unwrap();
        graph.add_output(select, 0).unwrap();

        let fitness = onemax();
        let space = BitStringSpace::new(10);
        let env: Environment<'_, Bits> = Environment {
            fitness: &fitness,
            space: &space,
        };
        let err = graph.test_schedule(&env).unwrap_err();
        assert_eq!(
            err,
            EngineError::Graph(GraphError::PortCardinality {
                node: "EliteSelection".into(),
                port: 0,
                partners: 2,
            })
        );
    }

    #[test]
    fn test_both_split_outputs_into_one_selection() {
        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let split = graph.add_node(RandomSplit::uniform(2));
        let select = graph.add_node(EliteSelection::new(1));
        graph.set_entry(split, 0).unwrap();
        graph.connect(split, 0, select, 0).unwrap();
        graph.connect(split, 1, select, 0).unwrap();
        graph.add_output(select, 0).unwrap();

        let fitness = onemax();
        let space = BitStringSpace::new(10);
        let env: Environment<'_, Bits> = Environment {
            fitness: &fitness,
            space: &space,
        };
        assert_eq!(
            graph.test_schedule(&env).unwrap_err(),
            EngineError::Graph(GraphError::PortCardinality {
                node: "EliteSelection".into(),
                port: 0,
                partners: 2,
            })
        );
    }

    #[test]
    fn test_unconnected_ports() {
        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let a = graph.add_node(Identity);
        graph.add_output(a, 0).unwrap();
        assert!(matches!(
            graph.check_syntax(),
            Err(GraphError::UnconnectedPort {
                direction: PortDirection::In,
                ..
            })
        ));

        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let split = graph.add_node(RandomSplit::uniform(2));
        graph.set_entry(split, 0).unwrap();
        graph.add_output(split, 0).unwrap();
        assert_eq!(
            graph.check_syntax(),
            Err(GraphError::UnconnectedPort {
                node: "RandomSplit".into(),
                direction: PortDirection::Out,
                port: 1,
            })
        );
    }

    #[test]
    fn test_no_output_and_unknown_port() {
        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let a = graph.add_node(Identity);
        graph.set_entry(a, 0).unwrap();
        assert_eq!(graph.check_syntax(), Err(GraphError::NoOutput));
        assert!(matches!(graph.connect(a, 1, a, 0), Err(GraphError::UnknownPort { .. })));
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let merge = graph.add_node(Merge::new(2));
        let id = graph.add_node(Identity);
        let split = graph.add_node(RandomSplit::uniform(2));
        graph.set_entry(merge, 0).unwrap();
        graph.connect(merge, 0, id, 0).unwrap();
        graph.connect(id, 0, split, 0).unwrap();
        graph.connect(split, 1, merge, 1).unwrap();
        graph.add_output(split, 0).unwrap();

        match graph.check_syntax() {
            Err(GraphError::Cycle(path)) => {
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&"Identity".to_string()));
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_environment_rejects_multi_objective() {
        let graph: OperatorGraph<Bits> = OperatorGraph::single(EliteSelection::new(1)).unwrap();
        let fitness = TwoObjectives;
        let space = BitStringSpace::new(4);
        let env: Environment<'_, Bits> = Environment {
            fitness: &fitness,
            space: &space,
        };
        assert!(graph.check_syntax().is_ok());
        assert!(matches!(
            graph.test_schedule(&env),
            Err(EngineError::UnsupportedEnvironment { .. })
        ));
    }

    #[test]
    fn test_truncation_rejects_multi_objective() {
        let graph: OperatorGraph<Bits> = OperatorGraph::single(TruncationSelection::new(0.5)).unwrap();
        let fitness = TwoObjectives;
        let space = BitStringSpace::new(4);
        let env: Environment<'_, Bits> = Environment {
            fitness: &fitness,
            space: &space,
        };
        assert!(matches!(
            graph.test_schedule(&env),
            Err(EngineError::UnsupportedEnvironment { module, .. }) if module == "TruncationSelection"
        ));
    }

    // ---- execution ----

    #[test]
    fn test_selection_after_split_tolerates_empty_branch() {
        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let split = graph.add_node(RandomSplit::uniform(2));
        let elite = graph.add_node(EliteSelection::new(1));
        let trunc = graph.add_node(TruncationSelection::new(0.5));
        let merge = graph.add_node(Merge::new(2));
        graph.set_entry(split, 0).unwrap();
        graph.connect(split, 0, elite, 0).unwrap();
        graph.connect(split, 1, trunc, 0).unwrap();
        graph.connect(elite, 0, merge, 0).unwrap();
        graph.connect(trunc, 0, merge, 1).unwrap();
        graph.add_output(merge, 0).unwrap();
        graph.check_syntax().unwrap();

        let fitness = onemax();
        let space = BitStringSpace::new(10);
        let mut rng = RandomSource::new(21);
        let pop = population(1, &mut rng);
        for generation in 0..20 {
            let mut ctx: Context<'_, Bits> = Context::new(&mut rng, &fitness, &space, GenerationIndex::default());
            let out = graph.process(&pop, &mut ctx).unwrap();
            assert_eq!(out[0].len(), 1, "generation {generation}");
        }
    }

    #[test]
    fn test_split_merge_conserves_members() {
        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let split = graph.add_node(RandomSplit::uniform(2));
        let left = graph.add_node(Identity);
        let right = graph.add_node(Identity);
        let merge = graph.add_node(Merge::new(2));
        graph.set_entry(split, 0).unwrap();
        graph.connect(split, 0, left, 0).unwrap();
        graph.connect(split, 1, right, 0).unwrap();
        graph.connect(left, 0, merge, 0).unwrap();
        graph.connect(right, 0, merge, 1).unwrap();
        graph.add_output(merge, 0).unwrap();
        graph.check_syntax().unwrap();

        let mut rng = RandomSource::new(11);
        let pop = population(30, &mut rng);
        let out = run(&mut graph, &pop).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 30);
        assert!(pop.iter().all(|m| out[0].multiplicity(m) == 1));
    }

    #[test]
    fn test_fan_out_feeds_every_consumer() {
        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let id = graph.add_node(Identity);
        let merge = graph.add_node(Merge::new(2));
        graph.set_entry(id, 0).unwrap();
        graph.connect(id, 0, merge, 0).unwrap();
        graph.connect(id, 0, merge, 1).unwrap();
        graph.add_output(merge, 0).unwrap();
        graph.add_output(id, 0).unwrap();

        let mut rng = RandomSource::new(5);
        let pop = population(4, &mut rng);
        let out = run(&mut graph, &pop).unwrap();
        assert_eq!(out[0].len(), 8);
        assert_eq!(out[1].len(), 4);
    }

    #[test]
    fn test_output_length_mismatch() {
        let mut graph = OperatorGraph::single(Broken).unwrap();
        let mut rng = RandomSource::new(1);
        let pop = population(3, &mut rng);
        let err = run(&mut graph, &pop).unwrap_err();
        assert_eq!(
            err,
            EngineError::Graph(GraphError::OutputLengthMismatch {
                node: "Broken".into(),
                expected: 1,
                actual: 0,
            })
        );
    }

    #[test]
    fn test_operator_error_propagates() {
        let failing = FnOperator::new("Failing", |_list: IndividualList<Bits>, _ctx: &mut Context<'_, Bits>| {
            Err(EngineError::operator("Failing", "boom"))
        });
        let mut graph = OperatorGraph::single(failing).unwrap();
        let mut rng = RandomSource::new(1);
        let pop = population(2, &mut rng);
        assert!(matches!(run(&mut graph, &pop), Err(EngineError::Operator { .. })));
    }

    // ---- port edits ----

    #[test]
    fn test_remove_port_reindexes_and_notifies() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let sink = seen.clone();
        graph.on_ports_changed(move |c| sink.lock().unwrap().push(c.clone()));

        let split = graph.add_node(RandomSplit::uniform(3));
        let a = graph.add_node(Identity);
        let b = graph.add_node(Identity);
        graph.set_entry(split, 0).unwrap();
        graph.connect(split, 0, a, 0).unwrap();
        graph.connect(split, 2, b, 0).unwrap();
        graph.add_output(split, 1).unwrap();
        graph.add_output(a, 0).unwrap();
        graph.add_output(b, 0).unwrap();
        graph.check_syntax().unwrap();

        let change = graph.remove_port(split, PortDirection::Out, 1).unwrap();
        assert_eq!(change.count, 2);
        assert!(!change.added);
        graph.check_syntax().unwrap();
        assert!(!graph.disconnect(split, 2, b, 0));
        assert!(graph.disconnect(split, 1, b, 0));

        let added = graph.add_port(split, PortDirection::Out).unwrap();
        assert_eq!(added.index, 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_fixed_arity_rejects_port_edits() {
        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let id = graph.add_node(Identity);
        assert!(matches!(
            graph.add_port(id, PortDirection::In),
            Err(GraphError::FixedArity { .. })
        ));
        assert!(matches!(
            graph.remove_port(NodeId(9), PortDirection::In, 0),
            Err(GraphError::UnknownNode(9))
        ));
    }

    #[test]
    fn test_remove_node_drops_connections() {
        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let a = graph.add_node(Identity);
        let b = graph.add_node(Identity);
        graph.set_entry(a, 0).unwrap();
        graph.connect(a, 0, b, 0).unwrap();
        graph.add_output(b, 0).unwrap();
        assert_eq!(graph.topological_order().unwrap(), vec![a, b]);

        assert!(graph.remove_node(b).is_some());
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.check_syntax(), Err(GraphError::NoOutput));
    }
}
