//! Tagging and submodule extraction for one isolation round.

use crate::backend::{BackendRunner, Comparator};
use crate::graph::{split_by_tags, NodeId, SplitGraph, Tag, TagAssignment};

use super::{Minimizer, MinimizerError, NodeSet};

impl<V, A, B, C> Minimizer<V, A, B, C>
where
    V: Clone,
    A: BackendRunner<V>,
    B: BackendRunner<V>,
    C: Comparator<V>,
{
    /// Assigns a partition tag to every callable node: `Target` for the
    /// selected set, `Post` for anything consuming a `Target`/`Post`
    /// value, `Pre` otherwise. One pass in topological order, so a node's
    /// inputs are always tagged before the node itself.
    ///
    /// Convexity is a checked precondition: a selected node consuming a
    /// `Post` value would make the unit depend on its own downstream, and
    /// is rejected before the partitioner runs.
    pub(crate) fn tag_nodes(&self, selected: &NodeSet) -> Result<TagAssignment, MinimizerError> {
        let graph = self.graph();
        let mut tags: TagAssignment = vec![None; graph.len()];

        for (index, node) in graph.nodes().iter().enumerate() {
            if !node.kind.is_callable() {
                continue;
            }
            let id = NodeId(index as u32);
            let downstream = node.inputs.iter().any(|input| {
                graph.node(*input).kind.is_callable()
                    && matches!(tags[input.index()], Some(Tag::Target) | Some(Tag::Post))
            });
            if selected.contains(&id) {
                let consumes_post = node
                    .inputs
                    .iter()
                    .any(|input| tags[input.index()] == Some(Tag::Post));
                if consumes_post {
                    return Err(MinimizerError::BadUnit {
                        reason: format!(
                            "node set is not convex: {:?} depends on a value downstream of the set",
                            node.name
                        ),
                    });
                }
                tags[index] = Some(Tag::Target);
            } else if downstream {
                tags[index] = Some(Tag::Post);
            } else {
                tags[index] = Some(Tag::Pre);
            }
        }

        Ok(tags)
    }

    /// Splits the graph so one submodule consists of exactly `selected`,
    /// returning the container and the index of that unit within it.
    pub(crate) fn build_submodule(
        &self,
        selected: &NodeSet,
    ) -> Result<(SplitGraph<V>, usize), MinimizerError> {
        let tags = self.tag_nodes(selected)?;
        let split = split_by_tags(self.graph(), &tags, &[Tag::Pre, Tag::Target, Tag::Post])
            .map_err(|err| MinimizerError::BadUnit {
                reason: err.to_string(),
            })?;

        let mut unit_index = None;
        for (index, child) in split.children.iter().enumerate() {
            if !child.name.contains(Tag::Target.as_str()) {
                continue;
            }
            if unit_index.replace(index).is_some() {
                return Err(MinimizerError::BadUnit {
                    reason: format!("expected exactly one target unit for {selected:?}"),
                });
            }
        }
        match unit_index {
            Some(index) => Ok((split, index)),
            None => Err(MinimizerError::BadUnit {
                reason: format!("no target unit was produced for {selected:?}"),
            }),
        }
    }
}
