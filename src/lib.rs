//! Automated bisection of backend divergences in computation graphs.
//!
//! Given a graph, a sample input, and a comparison function, [`Minimizer`]
//! repeatedly isolates subsets of the graph into self-contained submodules,
//! runs each submodule on a reference backend (A) and a candidate backend
//! (B), and narrows the search down to the smallest set of nodes whose
//! execution on B diverges from A or fails outright.

pub mod backend;
pub mod fusion;
pub mod graph;
pub mod minimizer;

pub use backend::{BackendRunner, BackendSide, Comparator, ShapeProp};
pub use fusion::{ExplicitFusions, FusionFinder, FusionMap, NoFusions};
pub use graph::{kernel, Graph, GraphError, Kernel, Node, NodeId, OpKind, RunOutput};
pub use minimizer::{
    Collaborators, Minimizer, MinimizerError, NodeSet, ResultKey, Settings, TraverseMethod,
};
