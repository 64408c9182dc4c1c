//! Tag-based partitioning of a graph into self-contained submodules.
//!
//! Tags are assigned per round in an external array indexed by [`NodeId`];
//! the graph itself is never mutated. Each populated tag becomes one child
//! submodule whose placeholders are named after the producer nodes they
//! stand in for, so cached values from earlier rounds can be matched to a
//! later unit's inputs by name alone.

use std::collections::{HashMap, HashSet};
use std::fmt;

use smallvec::SmallVec;

use super::{Graph, GraphError, NodeId};

/// Partition label for one isolation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Causally before the target set.
    Pre,
    /// The node set being isolated.
    Target,
    /// Dependent on the target set.
    Post,
}

impl Tag {
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Pre => "pre",
            Tag::Target => "target",
            Tag::Post => "post",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-round tag array, indexed by node id. Non-callable nodes stay `None`.
pub type TagAssignment = Vec<Option<Tag>>;

/// One partitioned submodule. The name embeds the tag (`submod_<tag>`).
pub struct SplitChild<V> {
    pub name: String,
    pub graph: Graph<V>,
}

/// Container produced by [`split_by_tags`]: one child per populated tag,
/// in the order the tags were requested.
pub struct SplitGraph<V> {
    pub children: Vec<SplitChild<V>>,
}

impl<V> fmt::Debug for SplitChild<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitChild")
            .field("name", &self.name)
            .field("graph", &self.graph)
            .finish()
    }
}

impl<V> fmt::Debug for SplitGraph<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitGraph")
            .field("children", &self.children)
            .finish()
    }
}

/// Splits `graph` into one child submodule per tag in `order`.
///
/// A child contains placeholders for every external value its members
/// consume, its member nodes with remapped operands (kernels are shared
/// with the parent), and an output emitting each member value consumed
/// outside the child. Tags with no members produce no child.
pub fn split_by_tags<V>(
    graph: &Graph<V>,
    tags: &TagAssignment,
    order: &[Tag],
) -> Result<SplitGraph<V>, GraphError> {
    // Consumer index over the full graph, output node included.
    let mut users: HashMap<NodeId, SmallVec<[NodeId; 4]>> = HashMap::new();
    for (index, node) in graph.nodes().iter().enumerate() {
        let consumer = NodeId(index as u32);
        for &input in &node.inputs {
            users.entry(input).or_default().push(consumer);
        }
    }

    let mut children = Vec::new();
    for &tag in order {
        let members: Vec<NodeId> = tags
            .iter()
            .enumerate()
            .filter(|(_, slot)| **slot == Some(tag))
            .map(|(index, _)| NodeId(index as u32))
            .collect();
        if members.is_empty() {
            continue;
        }
        children.push(SplitChild {
            name: format!("submod_{tag}"),
            graph: carve_child(graph, &users, &members)?,
        });
    }

    Ok(SplitGraph { children })
}

fn carve_child<V>(
    graph: &Graph<V>,
    users: &HashMap<NodeId, SmallVec<[NodeId; 4]>>,
    members: &[NodeId],
) -> Result<Graph<V>, GraphError> {
    let member_set: HashSet<NodeId> = members.iter().copied().collect();
    let mut child = Graph::new();
    let mut remap: HashMap<NodeId, NodeId> = HashMap::new();

    // Placeholders for external inputs, in first-use order.
    for &id in members {
        for &input in &graph.node(id).inputs {
            if member_set.contains(&input) || remap.contains_key(&input) {
                continue;
            }
            let placeholder = child.add_placeholder(graph.node(input).name.clone())?;
            remap.insert(input, placeholder);
        }
    }

    for &id in members {
        let node = graph.node(id);
        let inputs = node.inputs.iter().map(|input| remap[input]).collect();
        let child_id = child.add_node(node.name.clone(), inputs, graph.kernel_of(id)?)?;
        remap.insert(id, child_id);
    }

    // Member values consumed outside the child become its outputs.
    let mut outputs: Vec<NodeId> = Vec::new();
    for &id in members {
        let escapes = users
            .get(&id)
            .is_some_and(|consumers| consumers.iter().any(|c| !member_set.contains(c)));
        if escapes {
            outputs.push(remap[&id]);
        }
    }
    if outputs.is_empty() {
        // Nothing escapes; keep the unit runnable by emitting its last value.
        if let Some(last) = members.last() {
            outputs.push(remap[last]);
        }
    }
    child.set_output(outputs)?;

    Ok(child)
}
