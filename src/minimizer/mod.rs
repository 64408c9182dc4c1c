//! The minimization session: state, error taxonomy, and the top-level
//! entry points.
//!
//! A [`Minimizer`] owns one graph, one sample input, two backend runners
//! and a comparator. [`Minimizer::minimize`] searches the graph's callable
//! nodes for the smallest set whose isolated execution on backend B
//! diverges from backend A (or fails), using the strategy selected in
//! [`Settings`]. [`Minimizer::run_nodes`] executes a node range once for
//! inspection without turning failures into a verdict.

use std::collections::{BTreeSet, HashMap};

use anyhow::ensure;
use thiserror::Error;

use crate::backend::{BackendRunner, BackendSide, Comparator, ShapeProp};
use crate::fusion::{FusionFinder, FusionMap};
use crate::graph::{Graph, NodeId};

mod compare;
mod extract;
mod settings;
mod traverse;

pub use settings::{Settings, TraverseMethod};

/// Unordered set of nodes, the unit of isolation and the final artifact of
/// a minimization run.
pub type NodeSet = BTreeSet<NodeId>;

/// Ordered tuple of output-value names identifying one comparison round.
pub type ResultKey = Vec<String>;

#[derive(Debug, Error)]
pub enum MinimizerError {
    /// The partitioner did not yield exactly one unit for the requested
    /// node set, or the set was rejected up front (non-convex, empty).
    #[error("failed to isolate a single unit: {reason}")]
    BadUnit { reason: String },
    /// One of the two backends failed while executing the isolated unit.
    #[error("backend {backend} failed on the isolated unit: {source}")]
    RunFunc {
        backend: BackendSide,
        #[source]
        source: anyhow::Error,
    },
    /// The comparator rejected the two backends' outputs.
    #[error("result mismatch for outputs {key:?}")]
    ResultMismatch { key: ResultKey },
    /// The live input capture over the full graph failed.
    #[error("live input capture failed: {source}")]
    Capture {
        #[source]
        source: anyhow::Error,
    },
}

/// Optional external collaborators consulted once at construction.
pub struct Collaborators<'a, V> {
    pub fusion_finder: Option<&'a dyn FusionFinder<V>>,
    pub shape_prop: Option<&'a mut dyn ShapeProp<V>>,
}

impl<V> Default for Collaborators<'_, V> {
    fn default() -> Self {
        Self {
            fusion_finder: None,
            shape_prop: None,
        }
    }
}

/// One minimization session over a graph and a sample input.
pub struct Minimizer<V, A, B, C> {
    graph: Graph<V>,
    sample_input: Vec<V>,
    run_a: A,
    run_b: B,
    compare: C,
    settings: Settings,
    fusions: FusionMap,
    a_outputs: HashMap<String, V>,
    b_outputs: HashMap<String, V>,
    results: HashMap<ResultKey, f64>,
    live_captures: usize,
}

impl<V, A, B, C> Minimizer<V, A, B, C>
where
    V: Clone,
    A: BackendRunner<V>,
    B: BackendRunner<V>,
    C: Comparator<V>,
{
    /// Builds a session with no fusion constraints and no shape hook.
    pub fn new(
        graph: Graph<V>,
        sample_input: Vec<V>,
        run_a: A,
        run_b: B,
        compare: C,
        settings: Settings,
    ) -> anyhow::Result<Self> {
        Self::with_collaborators(
            graph,
            sample_input,
            run_a,
            run_b,
            compare,
            settings,
            Collaborators::default(),
        )
    }

    /// Builds a session, running shape propagation and the fusion finder
    /// against the full graph before any round executes.
    pub fn with_collaborators(
        graph: Graph<V>,
        sample_input: Vec<V>,
        run_a: A,
        run_b: B,
        compare: C,
        settings: Settings,
        collaborators: Collaborators<'_, V>,
    ) -> anyhow::Result<Self> {
        let placeholders: Vec<String> = graph
            .placeholder_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        ensure!(
            placeholders.len() == sample_input.len(),
            "graph has {} placeholder(s) but the sample input has {} value(s)",
            placeholders.len(),
            sample_input.len()
        );
        ensure!(graph.output_id().is_some(), "graph has no output node");

        if let Some(shape_prop) = collaborators.shape_prop {
            shape_prop.propagate(&graph, &sample_input)?;
        }
        let fusions = match collaborators.fusion_finder {
            Some(finder) => finder.compute(&graph, &graph.callable_ids()),
            None => FusionMap::new(),
        };

        // Seed both caches with the sample input under the placeholder names.
        let mut a_outputs = HashMap::new();
        let mut b_outputs = HashMap::new();
        for (name, value) in placeholders.into_iter().zip(sample_input.iter()) {
            a_outputs.insert(name.clone(), value.clone());
            b_outputs.insert(name, value.clone());
        }

        Ok(Self {
            graph,
            sample_input,
            run_a,
            run_b,
            compare,
            settings,
            fusions,
            a_outputs,
            b_outputs,
            results: HashMap::new(),
            live_captures: 0,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn graph(&self) -> &Graph<V> {
        &self.graph
    }

    /// Comparator scores recorded so far, keyed by output-name tuple.
    /// Diagnostic only; the search never reads this back.
    pub fn results(&self) -> &HashMap<ResultKey, f64> {
        &self.results
    }

    /// Number of live-capture fallbacks performed by the input resolver.
    pub fn live_captures(&self) -> usize {
        self.live_captures
    }

    /// Callable nodes between `start` and `end`, both inclusive. `None`
    /// extends the range to the corresponding end of the graph; iteration
    /// stops at `end` whether or not `start` was encountered.
    pub fn node_range(&self, start: Option<&str>, end: Option<&str>) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        let mut adding = start.is_none();
        for (index, node) in self.graph.nodes().iter().enumerate() {
            if !node.kind.is_callable() {
                continue;
            }
            if start == Some(node.name.as_str()) {
                adding = true;
            }
            if adding {
                nodes.push(NodeId(index as u32));
            }
            if end == Some(node.name.as_str()) {
                break;
            }
        }
        nodes
    }

    /// Searches the node range for culprits using the configured strategy.
    ///
    /// `RunFunc` and `ResultMismatch` failures observed inside a round are
    /// converted into culprit-set membership; `BadUnit` propagates. The
    /// binary strategy with `find_all` assumes deterministic,
    /// side-effect-free backends: under a non-deterministic backend its
    /// consistency check may report `BadUnit`.
    pub fn minimize(
        &mut self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<NodeSet, MinimizerError> {
        log::info!("{}", self.settings);
        let nodes = self.node_range(start, end);
        log::debug!("minimizing over {} callable node(s)", nodes.len());
        match self.settings.traverse_method {
            TraverseMethod::Sequential => self.sequential_traverse(&nodes),
            TraverseMethod::Binary => self.binary_traverse(&nodes),
            TraverseMethod::Accumulate => self.accumulate_traverse(&nodes),
        }
    }

    /// Runs the node range as one unit for inspection. Comparison and
    /// backend failures are logged, not raised; with `return_intermediate`
    /// every node's value is emitted as output.
    pub fn run_nodes(
        &mut self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<(), MinimizerError> {
        let nodes = self.node_range(start, end);
        if nodes.is_empty() {
            log::warn!("no callable nodes in the requested range");
            return Ok(());
        }
        let selected = self.expand_with_fusions(&nodes);
        let output_names: Vec<String> = if self.settings.return_intermediate {
            nodes
                .iter()
                .map(|&id| self.graph.node(id).name.clone())
                .collect()
        } else {
            Vec::new()
        };

        let (mut split, unit_index) = self.build_submodule(&selected)?;
        match self.run_and_compare(&mut split, unit_index, &output_names) {
            Ok(()) => Ok(()),
            Err(
                err @ (MinimizerError::RunFunc { .. } | MinimizerError::ResultMismatch { .. }),
            ) => {
                log::error!("{err}");
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// The fusion group of `node`, or the singleton set when unconstrained.
    pub(crate) fn fusion_group(&self, node: NodeId) -> NodeSet {
        match self.fusions.get(&node) {
            Some(group) => group.clone(),
            None => std::iter::once(node).collect(),
        }
    }

    pub(crate) fn expand_with_fusions(&self, nodes: &[NodeId]) -> NodeSet {
        let mut selected: NodeSet = nodes.iter().copied().collect();
        for node in nodes {
            if let Some(group) = self.fusions.get(node) {
                selected.extend(group.iter().copied());
            }
        }
        selected
    }

    pub(crate) fn node_name(&self, id: NodeId) -> &str {
        &self.graph.node(id).name
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{kernel, Graph, RunOutput};

    use super::{Minimizer, Settings};

    /// Deliberately `Clone`-only: sessions must not demand more of the
    /// value type than the interpreter does.
    #[derive(Debug, Clone, PartialEq)]
    struct Val(f64);

    #[test]
    fn session_accepts_clone_only_value_types() {
        let mut graph = Graph::new();
        let x = graph.add_placeholder("x").unwrap();
        let a = graph
            .add_node("a", vec![x], kernel(|v: &[Val]| Ok(Val(v[0].0 + 1.0))))
            .unwrap();
        graph.set_output(vec![a]).unwrap();

        let mut minimizer = Minimizer::new(
            graph,
            vec![Val(1.0)],
            |unit: &Graph<Val>, inputs: &[Val]| unit.evaluate(inputs),
            |unit: &Graph<Val>, inputs: &[Val]| unit.evaluate(inputs),
            |_: &RunOutput<Val>, _: &RunOutput<Val>, _: &[String]| (0.0, true),
            Settings::default(),
        )
        .unwrap();

        assert!(minimizer.minimize(None, None).unwrap().is_empty());
    }
}
