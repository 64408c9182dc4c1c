//! Fusion index interface.
//!
//! A fusion group is a set of nodes that must be isolated as one unit,
//! e.g. nodes a backend lowers into a single kernel. The detector itself is
//! an external collaborator; this crate only consumes its mapping.

use std::collections::{BTreeSet, HashMap};

use crate::graph::{Graph, NodeId};

/// Maps a node to its fusion group. Every group contains the node itself.
pub type FusionMap = HashMap<NodeId, BTreeSet<NodeId>>;

/// Computes the fusion map once, at session construction.
pub trait FusionFinder<V> {
    fn compute(&self, graph: &Graph<V>, callable_nodes: &[NodeId]) -> FusionMap;
}

/// No fusion constraints: every node is isolated on its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFusions;

impl<V> FusionFinder<V> for NoFusions {
    fn compute(&self, _graph: &Graph<V>, _callable_nodes: &[NodeId]) -> FusionMap {
        FusionMap::new()
    }
}

/// Caller-listed fusion groups. Groups with fewer than two members are
/// ignored; nodes absent from every group have no fusion constraint.
#[derive(Debug, Default, Clone)]
pub struct ExplicitFusions {
    groups: Vec<BTreeSet<NodeId>>,
}

impl ExplicitFusions {
    pub fn new(groups: Vec<Vec<NodeId>>) -> Self {
        Self {
            groups: groups
                .into_iter()
                .map(|group| group.into_iter().collect())
                .filter(|group: &BTreeSet<NodeId>| group.len() > 1)
                .collect(),
        }
    }
}

impl<V> FusionFinder<V> for ExplicitFusions {
    fn compute(&self, _graph: &Graph<V>, _callable_nodes: &[NodeId]) -> FusionMap {
        let mut map = FusionMap::new();
        for group in &self.groups {
            for &member in group {
                map.insert(member, group.clone());
            }
        }
        map
    }
}
