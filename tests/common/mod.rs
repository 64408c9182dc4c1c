#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use graphmin::{kernel, Graph, Kernel, RunOutput};

pub type Overrides = HashMap<String, Arc<dyn Kernel<f64>>>;

/// `x -> a -> b -> c` with `a = x + 1`, `b = a * 2`, `c = b - 3`.
/// On the sample input `x = 1`: `a = 2`, `b = 4`, `c = 1`.
pub fn chain3() -> Graph<f64> {
    let mut graph = Graph::new();
    let x = graph.add_placeholder("x").unwrap();
    let a = graph
        .add_node("a", vec![x], kernel(|v: &[f64]| Ok(v[0] + 1.0)))
        .unwrap();
    let b = graph
        .add_node("b", vec![a], kernel(|v: &[f64]| Ok(v[0] * 2.0)))
        .unwrap();
    let c = graph
        .add_node("c", vec![b], kernel(|v: &[f64]| Ok(v[0] - 3.0)))
        .unwrap();
    graph.set_output(vec![c]).unwrap();
    graph
}

/// `chain3` extended with `d = c + 10`.
pub fn chain4() -> Graph<f64> {
    let mut graph = Graph::new();
    let x = graph.add_placeholder("x").unwrap();
    let a = graph
        .add_node("a", vec![x], kernel(|v: &[f64]| Ok(v[0] + 1.0)))
        .unwrap();
    let b = graph
        .add_node("b", vec![a], kernel(|v: &[f64]| Ok(v[0] * 2.0)))
        .unwrap();
    let c = graph
        .add_node("c", vec![b], kernel(|v: &[f64]| Ok(v[0] - 3.0)))
        .unwrap();
    let d = graph
        .add_node("d", vec![c], kernel(|v: &[f64]| Ok(v[0] + 10.0)))
        .unwrap();
    graph.set_output(vec![d]).unwrap();
    graph
}

/// Reference backend: the host graph's own kernels.
pub fn reference() -> impl FnMut(&Graph<f64>, &[f64]) -> anyhow::Result<RunOutput<f64>> {
    |unit: &Graph<f64>, inputs: &[f64]| unit.evaluate(inputs)
}

/// Candidate backend whose lowering of the named nodes is substituted.
pub fn candidate(
    overrides: Overrides,
) -> impl FnMut(&Graph<f64>, &[f64]) -> anyhow::Result<RunOutput<f64>> {
    move |unit: &Graph<f64>, inputs: &[f64]| unit.evaluate_with_overrides(inputs, &overrides)
}

/// A kernel that always fails, modelling a broken lowering.
pub fn failing(message: &'static str) -> Arc<dyn Kernel<f64>> {
    kernel(move |_: &[f64]| anyhow::bail!(message))
}

/// Max-abs-difference comparator with the given tolerance.
pub fn abs_tol(
    tol: f64,
) -> impl FnMut(&RunOutput<f64>, &RunOutput<f64>, &[String]) -> (f64, bool) {
    move |a: &RunOutput<f64>, b: &RunOutput<f64>, _names: &[String]| {
        let (a, b) = (a.as_slice(), b.as_slice());
        if a.len() != b.len() {
            return (f64::INFINITY, false);
        }
        let diff = a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max);
        (diff, diff <= tol)
    }
}

/// Names of the given node ids, for readable assertions.
pub fn names(graph: &Graph<f64>, ids: impl IntoIterator<Item = graphmin::NodeId>) -> Vec<String> {
    ids.into_iter()
        .map(|id| graph.node(id).name.clone())
        .collect()
}
