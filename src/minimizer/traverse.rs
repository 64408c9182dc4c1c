//! The three search strategies over a callable node range.
//!
//! Strategies catch exactly `RunFunc` and `ResultMismatch` and convert
//! them into culprit-set membership; anything else propagates.

use crate::backend::{BackendRunner, Comparator};
use crate::graph::NodeId;

use super::{Minimizer, MinimizerError, NodeSet};

/// Worklist frame of the binary search. `Ensure` runs after both halves
/// of a failing parent range and enforces that at least one reproduced.
enum Frame {
    Enter(usize, usize),
    Ensure(usize, usize, usize),
}

impl<V, A, B, C> Minimizer<V, A, B, C>
where
    V: Clone,
    A: BackendRunner<V>,
    B: BackendRunner<V>,
    C: Comparator<V>,
{
    /// Visits nodes one by one, comparing each node's own value. A result
    /// mismatch convicts the node; a backend failure convicts its whole
    /// fusion group. Stops at the first hit unless `find_all` is set.
    pub(crate) fn sequential_traverse(
        &mut self,
        nodes: &[NodeId],
    ) -> Result<NodeSet, MinimizerError> {
        let mut culprits = NodeSet::new();

        for &node in nodes {
            let name = self.node_name(node).to_owned();
            log::info!("visiting node {name:?}");
            let selected = self.fusion_group(node);

            let (mut split, unit_index) = self.build_submodule(&selected)?;
            match self.run_and_compare(&mut split, unit_index, std::slice::from_ref(&name)) {
                Ok(()) => {}
                Err(MinimizerError::ResultMismatch { key }) => {
                    log::warn!("result mismatch at {name:?} (outputs {key:?})");
                    culprits.insert(node);
                    if !self.settings.find_all {
                        return Ok(culprits);
                    }
                }
                Err(MinimizerError::RunFunc { backend, source }) => {
                    log::warn!("backend {backend} failed at {name:?}: {source}");
                    culprits.extend(selected);
                    if !self.settings.find_all {
                        return Ok(culprits);
                    }
                }
                Err(other) => return Err(other),
            }
        }

        Ok(culprits)
    }

    /// Bisects the range with an explicit worklist. A clean range is
    /// dropped; a failing singleton contributes its fusion group. Without
    /// `find_all` the search is left-biased and first-found; with it, both
    /// halves of every failing range are explored and a failing range
    /// neither of whose halves reproduces is reported as `BadUnit`.
    pub(crate) fn binary_traverse(&mut self, nodes: &[NodeId]) -> Result<NodeSet, MinimizerError> {
        let mut culprits = NodeSet::new();
        if nodes.is_empty() {
            return Ok(culprits);
        }

        let mut stack = vec![Frame::Enter(0, nodes.len())];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(lo, hi) => {
                    let slice = &nodes[lo..hi];
                    log::debug!("bisect range {lo}..{hi}");
                    let selected = self.expand_with_fusions(slice);

                    let (mut split, unit_index) = self.build_submodule(&selected)?;
                    match self.run_and_compare(&mut split, unit_index, &[]) {
                        Ok(()) => continue,
                        Err(
                            MinimizerError::ResultMismatch { .. }
                            | MinimizerError::RunFunc { .. },
                        ) => {
                            if slice.len() == 1 {
                                culprits.extend(selected);
                                if !self.settings.find_all {
                                    return Ok(culprits);
                                }
                                continue;
                            }
                            let mid = lo + slice.len() / 2;
                            if self.settings.find_all {
                                stack.push(Frame::Ensure(lo, hi, culprits.len()));
                                stack.push(Frame::Enter(mid, hi));
                                stack.push(Frame::Enter(lo, mid));
                            } else {
                                stack.push(Frame::Enter(lo, mid));
                            }
                        }
                        Err(other) => return Err(other),
                    }
                }
                Frame::Ensure(lo, hi, culprits_before) => {
                    if culprits.len() == culprits_before {
                        return Err(MinimizerError::BadUnit {
                            reason: format!(
                                "divergence detected in range {lo}..{hi} but neither half \
                                 reproduces it; backends may be non-deterministic"
                            ),
                        });
                    }
                }
            }
        }

        Ok(culprits)
    }

    /// Grows a prefix one node at a time and compares each newly added
    /// node's value. The first divergence convicts that node and halts:
    /// later nodes on backend B may already depend on divergent state, so
    /// scanning further has no value. `find_all` is unsupported.
    pub(crate) fn accumulate_traverse(
        &mut self,
        nodes: &[NodeId],
    ) -> Result<NodeSet, MinimizerError> {
        let mut culprits = NodeSet::new();
        if self.settings.find_all {
            log::warn!("find_all is not supported by accumulate traversal");
            return Ok(culprits);
        }

        let mut nodes_to_run = NodeSet::new();
        for &node in nodes {
            nodes_to_run.insert(node);
            let name = self.node_name(node).to_owned();
            log::info!("accumulating node {name:?}");

            let (mut split, unit_index) = self.build_submodule(&nodes_to_run)?;
            match self.run_and_compare(&mut split, unit_index, std::slice::from_ref(&name)) {
                Ok(()) => {}
                Err(
                    MinimizerError::ResultMismatch { .. } | MinimizerError::RunFunc { .. },
                ) => {
                    culprits.insert(node);
                    return Ok(culprits);
                }
                Err(other) => return Err(other),
            }
        }

        Ok(culprits)
    }
}
