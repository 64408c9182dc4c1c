//! Injected capability interfaces: backend execution, comparison, and the
//! shape-propagation hook. All of them have blanket impls for closures, so
//! callers can pass plain function values.

use std::fmt;

use crate::graph::{Graph, RunOutput};

/// Which of the two backends produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendSide {
    /// Reference execution path.
    A,
    /// Candidate execution path under test.
    B,
}

impl fmt::Display for BackendSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendSide::A => f.write_str("a"),
            BackendSide::B => f.write_str("b"),
        }
    }
}

/// Executes an isolated unit on one backend.
pub trait BackendRunner<V> {
    fn run(&mut self, unit: &Graph<V>, inputs: &[V]) -> anyhow::Result<RunOutput<V>>;
}

impl<V, F> BackendRunner<V> for F
where
    F: FnMut(&Graph<V>, &[V]) -> anyhow::Result<RunOutput<V>>,
{
    fn run(&mut self, unit: &Graph<V>, inputs: &[V]) -> anyhow::Result<RunOutput<V>> {
        self(unit, inputs)
    }
}

/// Caller-supplied comparison of the two backends' outputs.
///
/// Returns a numeric score (recorded in the session's result cache) and a
/// pass verdict; `names` identifies the emitted values being compared.
pub trait Comparator<V> {
    fn compare(&mut self, a: &RunOutput<V>, b: &RunOutput<V>, names: &[String]) -> (f64, bool);
}

impl<V, F> Comparator<V> for F
where
    F: FnMut(&RunOutput<V>, &RunOutput<V>, &[String]) -> (f64, bool),
{
    fn compare(&mut self, a: &RunOutput<V>, b: &RunOutput<V>, names: &[String]) -> (f64, bool) {
        self(a, b, names)
    }
}

/// Side-effecting shape annotation, run once against the full graph when a
/// session is constructed. Consumed by downstream tooling only; the
/// minimizer itself never reads shapes.
pub trait ShapeProp<V> {
    fn propagate(&mut self, graph: &Graph<V>, sample_input: &[V]) -> anyhow::Result<()>;
}
