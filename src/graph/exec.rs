//! Reference interpretation of a graph, with per-node kernel substitution
//! for modelling candidate backends.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};

use super::{Graph, Kernel, NodeId, OpKind};

/// Output of one unit execution: a single value or an ordered tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutput<V> {
    Single(V),
    Tuple(Vec<V>),
}

impl<V> RunOutput<V> {
    pub fn as_slice(&self) -> &[V] {
        match self {
            RunOutput::Single(value) => std::slice::from_ref(value),
            RunOutput::Tuple(values) => values.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Graph<V> {
    /// Evaluates the graph on `inputs` using each node's own kernel.
    pub fn evaluate(&self, inputs: &[V]) -> Result<RunOutput<V>> {
        self.evaluate_with_overrides(inputs, &HashMap::new())
    }

    /// Evaluates the graph, substituting the kernel of any node whose name
    /// appears in `overrides`. A substituted kernel may compute a different
    /// value or fail, which is how a divergent or broken lowering of a
    /// single operator is modelled.
    pub fn evaluate_with_overrides(
        &self,
        inputs: &[V],
        overrides: &HashMap<String, Arc<dyn Kernel<V>>>,
    ) -> Result<RunOutput<V>> {
        let mut env: Vec<Option<V>> = Vec::with_capacity(self.len());
        let mut next_input = 0usize;

        for (index, node) in self.nodes().iter().enumerate() {
            let value = match node.kind {
                OpKind::Placeholder => {
                    ensure!(
                        next_input < inputs.len(),
                        "graph expects more than {} input(s)",
                        inputs.len()
                    );
                    let value = inputs[next_input].clone();
                    next_input += 1;
                    Some(value)
                }
                OpKind::Callable => {
                    let args = self.operand_values(&env, node.inputs.as_slice())?;
                    let result = match overrides.get(&node.name) {
                        Some(kernel) => kernel.eval(&args),
                        None => self.kernel_of(NodeId(index as u32))?.eval(&args),
                    };
                    Some(result.with_context(|| format!("node {:?} failed", node.name))?)
                }
                OpKind::Output => None,
            };
            env.push(value);
        }
        ensure!(
            next_input == inputs.len(),
            "graph expects {} input(s), got {}",
            next_input,
            inputs.len()
        );

        let output = self
            .output_id()
            .ok_or_else(|| anyhow!("graph has no output node"))?;
        let values = self.operand_values(&env, self.node(output).inputs.as_slice())?;
        match <[V; 1]>::try_from(values) {
            Ok([value]) => Ok(RunOutput::Single(value)),
            Err(values) => Ok(RunOutput::Tuple(values)),
        }
    }

    /// Runs the graph on `inputs` and returns the values flowing under
    /// `names`, in the order of `names`. Evaluation stops as soon as every
    /// requested value has been observed, so nothing downstream of the
    /// capture point executes.
    pub(crate) fn capture_values(&self, inputs: &[V], names: &[String]) -> Result<Vec<V>> {
        let mut captured: HashMap<&str, V> = HashMap::with_capacity(names.len());
        let mut env: Vec<Option<V>> = Vec::with_capacity(self.len());
        let mut next_input = 0usize;

        for (index, node) in self.nodes().iter().enumerate() {
            let value = match node.kind {
                OpKind::Placeholder => {
                    ensure!(
                        next_input < inputs.len(),
                        "graph expects more than {} input(s)",
                        inputs.len()
                    );
                    let value = inputs[next_input].clone();
                    next_input += 1;
                    Some(value)
                }
                OpKind::Callable => {
                    let args = self.operand_values(&env, node.inputs.as_slice())?;
                    let result = self.kernel_of(NodeId(index as u32))?.eval(&args);
                    Some(result.with_context(|| format!("node {:?} failed", node.name))?)
                }
                OpKind::Output => None,
            };
            if let Some(value) = &value {
                if names.iter().any(|name| name == &node.name) {
                    captured.insert(node.name.as_str(), value.clone());
                    if captured.len() == names.len() {
                        break;
                    }
                }
            }
            env.push(value);
        }

        names
            .iter()
            .map(|name| {
                captured
                    .get(name.as_str())
                    .cloned()
                    .ok_or_else(|| anyhow!("value {name:?} never flowed through the graph"))
            })
            .collect()
    }

    fn operand_values(&self, env: &[Option<V>], operands: &[NodeId]) -> Result<Vec<V>> {
        operands
            .iter()
            .map(|id| {
                env.get(id.index())
                    .and_then(|slot| slot.clone())
                    .ok_or_else(|| {
                        anyhow!("value of {:?} is not available", self.node(*id).name)
                    })
            })
            .collect()
    }
}
