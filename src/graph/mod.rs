//! Host graph model: a dependency-ordered arena of named computation nodes.
//!
//! The arena is append-only; a node may only reference nodes added before
//! it, so the node list is always a valid topological order. Partition tags
//! are never stored on nodes; isolation rounds keep them in an external
//! [`split::TagAssignment`] array instead.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub mod exec;
pub mod split;

pub use exec::RunOutput;
pub use split::{split_by_tags, SplitChild, SplitGraph, Tag, TagAssignment};

/// Stable index of a node in its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Operator kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Positional graph input.
    Placeholder,
    /// Executable computation with a kernel.
    Callable,
    /// Marker node whose operands are the graph's emitted values.
    Output,
}

impl OpKind {
    pub fn is_callable(self) -> bool {
        matches!(self, OpKind::Callable)
    }
}

/// Executable implementation of a single callable node.
pub trait Kernel<V>: Send + Sync {
    fn eval(&self, inputs: &[V]) -> anyhow::Result<V>;
}

impl<V, F> Kernel<V> for F
where
    F: Fn(&[V]) -> anyhow::Result<V> + Send + Sync,
{
    fn eval(&self, inputs: &[V]) -> anyhow::Result<V> {
        self(inputs)
    }
}

/// Wraps a closure into a shareable kernel.
pub fn kernel<V, F>(f: F) -> Arc<dyn Kernel<V>>
where
    F: Fn(&[V]) -> anyhow::Result<V> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A single unit of computation in the host graph.
pub struct Node<V> {
    pub name: String,
    pub kind: OpKind,
    pub inputs: Vec<NodeId>,
    pub(crate) kernel: Option<Arc<dyn Kernel<V>>>,
}

impl<V> fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate node name {name:?}")]
    DuplicateName { name: String },
    #[error("node {name:?} references undefined input {input:?}")]
    UndefinedInput { name: String, input: NodeId },
    #[error("graph already has an output node")]
    DuplicateOutput,
    #[error("graph has no output node")]
    MissingOutput,
    #[error("no node named {name:?}")]
    UnknownName { name: String },
    #[error("callable node {name:?} has no kernel")]
    MissingKernel { name: String },
    #[error("output must emit at least one value")]
    EmptyOutput,
}

/// Dependency-ordered computation graph over values of type `V`.
pub struct Graph<V> {
    nodes: Vec<Node<V>>,
    by_name: HashMap<String, NodeId>,
    output: Option<NodeId>,
}

impl<V> Default for Graph<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Graph<V> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            by_name: HashMap::new(),
            output: None,
        }
    }

    fn push(&mut self, node: Node<V>) -> Result<NodeId, GraphError> {
        if self.by_name.contains_key(&node.name) {
            return Err(GraphError::DuplicateName {
                name: node.name.clone(),
            });
        }
        for &input in &node.inputs {
            if input.index() >= self.nodes.len() {
                return Err(GraphError::UndefinedInput {
                    name: node.name.clone(),
                    input,
                });
            }
        }
        let id = NodeId(self.nodes.len() as u32);
        self.by_name.insert(node.name.clone(), id);
        self.nodes.push(node);
        Ok(id)
    }

    /// Adds a positional input. Placeholders consume the sample input in
    /// the order they were added.
    pub fn add_placeholder(&mut self, name: impl Into<String>) -> Result<NodeId, GraphError> {
        self.push(Node {
            name: name.into(),
            kind: OpKind::Placeholder,
            inputs: Vec::new(),
            kernel: None,
        })
    }

    /// Adds a callable node. Every input must already be in the graph.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        inputs: Vec<NodeId>,
        kernel: Arc<dyn Kernel<V>>,
    ) -> Result<NodeId, GraphError> {
        self.push(Node {
            name: name.into(),
            kind: OpKind::Callable,
            inputs,
            kernel: Some(kernel),
        })
    }

    /// Declares the graph's emitted values. One value produces a single
    /// output; several produce an ordered tuple.
    pub fn set_output(&mut self, values: Vec<NodeId>) -> Result<NodeId, GraphError> {
        if self.output.is_some() {
            return Err(GraphError::DuplicateOutput);
        }
        if values.is_empty() {
            return Err(GraphError::EmptyOutput);
        }
        let id = self.push(Node {
            name: "output".to_string(),
            kind: OpKind::Output,
            inputs: values,
            kernel: None,
        })?;
        self.output = Some(id);
        Ok(id)
    }

    /// Rewires the output node to emit the named internal values instead.
    ///
    /// Matching nodes are emitted in graph order, mirroring how the output
    /// list was requested during submodule extraction; names that do not
    /// resolve to a node in this graph are skipped.
    pub fn rewire_output(&mut self, names: &[String]) -> Result<(), GraphError> {
        let output = self.output.ok_or(GraphError::MissingOutput)?;
        let mut values = Vec::with_capacity(names.len());
        for (index, node) in self.nodes.iter().enumerate() {
            if node.kind != OpKind::Output && names.iter().any(|n| n == &node.name) {
                values.push(NodeId(index as u32));
            }
        }
        if values.is_empty() {
            return Err(GraphError::UnknownName {
                name: names.join(", "),
            });
        }
        self.nodes[output.index()].inputs = values;
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> &Node<V> {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> &[Node<V>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn output_id(&self) -> Option<NodeId> {
        self.output
    }

    /// Names of the values the output node emits, in emission order.
    pub fn output_names(&self) -> Result<Vec<String>, GraphError> {
        let output = self.output.ok_or(GraphError::MissingOutput)?;
        Ok(self.nodes[output.index()]
            .inputs
            .iter()
            .map(|id| self.nodes[id.index()].name.clone())
            .collect())
    }

    /// Placeholder names in positional order.
    pub fn placeholder_names(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|node| node.kind == OpKind::Placeholder)
            .map(|node| node.name.as_str())
            .collect()
    }

    /// Ids of all callable nodes in topological order.
    pub fn callable_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.kind.is_callable())
            .map(|(index, _)| NodeId(index as u32))
            .collect()
    }

    pub(crate) fn kernel_of(&self, id: NodeId) -> Result<Arc<dyn Kernel<V>>, GraphError> {
        let node = &self.nodes[id.index()];
        node.kernel.clone().ok_or_else(|| GraphError::MissingKernel {
            name: node.name.clone(),
        })
    }
}

impl<V> fmt::Debug for Graph<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes)
            .field("output", &self.output)
            .finish()
    }
}
