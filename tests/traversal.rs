//! End-to-end culprit isolation across the three search strategies.

mod common;

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use graphmin::{
    kernel, Collaborators, ExplicitFusions, Graph, Minimizer, MinimizerError, RunOutput, Settings,
    TraverseMethod,
};

use common::{abs_tol, candidate, chain3, chain4, failing, names, reference, Overrides};

#[test]
fn sequential_convicts_the_divergent_node() {
    let overrides: Overrides =
        HashMap::from([("b".to_string(), kernel(|v: &[f64]| Ok(v[0] * 2.0 + 0.5)))]);
    let mut minimizer = Minimizer::new(
        chain3(),
        vec![1.0],
        reference(),
        candidate(overrides),
        abs_tol(1e-6),
        Settings::default(),
    )
    .unwrap();

    let culprits = minimizer.minimize(None, None).unwrap();
    assert_eq!(names(minimizer.graph(), culprits), vec!["b"]);
}

#[test]
fn sequential_find_all_reports_every_divergence() {
    let overrides: Overrides = HashMap::from([
        ("a".to_string(), kernel(|v: &[f64]| Ok(v[0] + 1.5))),
        ("c".to_string(), kernel(|v: &[f64]| Ok(v[0] - 2.5))),
    ]);
    let build = |find_all: bool| {
        Minimizer::new(
            chain3(),
            vec![1.0],
            reference(),
            candidate(overrides.clone()),
            abs_tol(1e-6),
            Settings::default().with_find_all(find_all),
        )
        .unwrap()
    };

    let mut first_only = build(false);
    let first = first_only.minimize(None, None).unwrap();
    assert_eq!(names(first_only.graph(), first.clone()), vec!["a"]);

    let mut all = build(true);
    let every = all.minimize(None, None).unwrap();
    assert_eq!(names(all.graph(), every.clone()), vec!["a", "c"]);
    assert!(every.is_superset(&first));
}

#[test]
fn sequential_backend_failure_convicts_the_fusion_group() {
    let graph = chain3();
    let b = graph.id_of("b").unwrap();
    let c = graph.id_of("c").unwrap();
    let overrides: Overrides = HashMap::from([("b".to_string(), failing("bad lowering"))]);

    let fusions = ExplicitFusions::new(vec![vec![b, c]]);
    let mut minimizer = Minimizer::with_collaborators(
        graph,
        vec![1.0],
        reference(),
        candidate(overrides),
        abs_tol(1e-6),
        Settings::default(),
        Collaborators {
            fusion_finder: Some(&fusions),
            shape_prop: None,
        },
    )
    .unwrap();

    let culprits = minimizer.minimize(None, None).unwrap();
    assert_eq!(names(minimizer.graph(), culprits), vec!["b", "c"]);
}

#[test]
fn minimize_is_repeatable_on_the_same_session() {
    let overrides: Overrides =
        HashMap::from([("b".to_string(), kernel(|v: &[f64]| Ok(v[0] * 2.0 + 0.5)))]);
    let mut minimizer = Minimizer::new(
        chain3(),
        vec![1.0],
        reference(),
        candidate(overrides),
        abs_tol(1e-6),
        Settings::default(),
    )
    .unwrap();

    let first = minimizer.minimize(None, None).unwrap();
    let second = minimizer.minimize(None, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn binary_finds_a_left_half_culprit_first() {
    let overrides: Overrides =
        HashMap::from([("a".to_string(), kernel(|v: &[f64]| Ok(v[0] + 1.5)))]);
    let mut minimizer = Minimizer::new(
        chain3(),
        vec![1.0],
        reference(),
        candidate(overrides),
        abs_tol(1e-6),
        Settings::default().with_traverse_method(TraverseMethod::Binary),
    )
    .unwrap();

    let culprits = minimizer.minimize(None, None).unwrap();
    assert_eq!(names(minimizer.graph(), culprits), vec!["a"]);
}

#[test]
fn binary_find_all_locates_a_right_half_culprit() {
    let overrides: Overrides =
        HashMap::from([("c".to_string(), kernel(|v: &[f64]| Ok(v[0] - 2.5)))]);
    let mut minimizer = Minimizer::new(
        chain3(),
        vec![1.0],
        reference(),
        candidate(overrides),
        abs_tol(1e-6),
        Settings::default()
            .with_traverse_method(TraverseMethod::Binary)
            .with_find_all(true),
    )
    .unwrap();

    let culprits = minimizer.minimize(None, None).unwrap();
    assert_eq!(names(minimizer.graph(), culprits), vec!["c"]);
}

#[test]
fn binary_find_all_narrows_to_the_single_culprit() {
    let overrides: Overrides =
        HashMap::from([("b".to_string(), kernel(|v: &[f64]| Ok(v[0] * 2.0 + 0.5)))]);
    let mut minimizer = Minimizer::new(
        chain3(),
        vec![1.0],
        reference(),
        candidate(overrides),
        abs_tol(1e-6),
        Settings::default()
            .with_traverse_method(TraverseMethod::Binary)
            .with_find_all(true),
    )
    .unwrap();

    let culprits = minimizer.minimize(None, None).unwrap();
    assert_eq!(names(minimizer.graph(), culprits), vec!["b"]);
}

#[test]
fn binary_reports_a_whole_fusion_group() {
    let graph = chain4();
    let a = graph.id_of("a").unwrap();
    let b = graph.id_of("b").unwrap();
    let overrides: Overrides =
        HashMap::from([("a".to_string(), kernel(|v: &[f64]| Ok(v[0] + 1.5)))]);

    let fusions = ExplicitFusions::new(vec![vec![a, b]]);
    let mut minimizer = Minimizer::with_collaborators(
        graph,
        vec![1.0],
        reference(),
        candidate(overrides),
        abs_tol(1e-6),
        Settings::default().with_traverse_method(TraverseMethod::Binary),
        Collaborators {
            fusion_finder: Some(&fusions),
            shape_prop: None,
        },
    )
    .unwrap();

    let culprits = minimizer.minimize(None, None).unwrap();
    assert_eq!(names(minimizer.graph(), culprits), vec!["a", "b"]);
}

#[test]
fn binary_find_all_reports_a_fusion_group_in_the_right_half() {
    let graph = chain4();
    let c = graph.id_of("c").unwrap();
    let d = graph.id_of("d").unwrap();
    let overrides: Overrides =
        HashMap::from([("d".to_string(), kernel(|v: &[f64]| Ok(v[0] + 10.5)))]);

    let fusions = ExplicitFusions::new(vec![vec![c, d]]);
    let mut minimizer = Minimizer::with_collaborators(
        graph,
        vec![1.0],
        reference(),
        candidate(overrides),
        abs_tol(1e-6),
        Settings::default()
            .with_traverse_method(TraverseMethod::Binary)
            .with_find_all(true),
        Collaborators {
            fusion_finder: Some(&fusions),
            shape_prop: None,
        },
    )
    .unwrap();

    let culprits = minimizer.minimize(None, None).unwrap();
    assert_eq!(names(minimizer.graph(), culprits), vec!["c", "d"]);
}

#[test]
fn binary_find_all_rejects_an_unreproducible_divergence() {
    // A verdict that flips between rounds: the full range fails, then both
    // halves pass. The consistency check must refuse to report nothing.
    let calls = Rc::new(Cell::new(0usize));
    let calls_in_compare = Rc::clone(&calls);
    let flaky = move |_: &RunOutput<f64>, _: &RunOutput<f64>, _: &[String]| {
        let n = calls_in_compare.get();
        calls_in_compare.set(n + 1);
        (0.0, n != 0)
    };

    let mut minimizer = Minimizer::new(
        chain3(),
        vec![1.0],
        reference(),
        reference(),
        flaky,
        Settings::default()
            .with_traverse_method(TraverseMethod::Binary)
            .with_find_all(true),
    )
    .unwrap();

    let err = minimizer.minimize(None, None).unwrap_err();
    assert!(matches!(err, MinimizerError::BadUnit { .. }));
}

#[test]
fn accumulate_stops_at_the_first_divergence() {
    let overrides: Overrides =
        HashMap::from([("b".to_string(), kernel(|v: &[f64]| Ok(v[0] * 2.0 + 0.5)))]);
    let b_calls = Rc::new(Cell::new(0usize));
    let b_calls_in_run = Rc::clone(&b_calls);
    let mut run_b = candidate(overrides);
    let counting_candidate = move |unit: &Graph<f64>, inputs: &[f64]| {
        b_calls_in_run.set(b_calls_in_run.get() + 1);
        run_b(unit, inputs)
    };

    let mut minimizer = Minimizer::new(
        chain4(),
        vec![1.0],
        reference(),
        counting_candidate,
        abs_tol(1e-6),
        Settings::default().with_traverse_method(TraverseMethod::Accumulate),
    )
    .unwrap();

    let culprits = minimizer.minimize(None, None).unwrap();
    assert_eq!(names(minimizer.graph(), culprits), vec!["b"]);
    // One backend-B run per prefix up to and including the culprit.
    assert_eq!(b_calls.get(), 2);
}

#[test]
fn accumulate_does_not_support_find_all() {
    let overrides: Overrides =
        HashMap::from([("b".to_string(), kernel(|v: &[f64]| Ok(v[0] * 2.0 + 0.5)))]);
    let mut minimizer = Minimizer::new(
        chain3(),
        vec![1.0],
        reference(),
        candidate(overrides),
        abs_tol(1e-6),
        Settings::default()
            .with_traverse_method(TraverseMethod::Accumulate)
            .with_find_all(true),
    )
    .unwrap();

    let culprits = minimizer.minimize(None, None).unwrap();
    assert!(culprits.is_empty());
}

#[test]
fn run_nodes_records_a_score_without_raising() {
    let overrides: Overrides =
        HashMap::from([("b".to_string(), kernel(|v: &[f64]| Ok(v[0] * 2.0 + 0.5)))]);
    let mut minimizer = Minimizer::new(
        chain3(),
        vec![1.0],
        reference(),
        candidate(overrides),
        abs_tol(1e-6),
        Settings::default(),
    )
    .unwrap();

    minimizer.run_nodes(None, None).unwrap();
    let key = vec!["c".to_string()];
    let score = minimizer.results()[&key];
    assert!((score - 0.5).abs() < 1e-9);
}

#[test]
fn run_nodes_emits_intermediates_when_requested() {
    let overrides: Overrides =
        HashMap::from([("b".to_string(), kernel(|v: &[f64]| Ok(v[0] * 2.0 + 0.5)))]);
    let seen = Rc::new(Cell::new(0usize));
    let seen_in_compare = Rc::clone(&seen);
    let compare = move |a: &RunOutput<f64>, b: &RunOutput<f64>, _: &[String]| {
        seen_in_compare.set(a.len());
        let diff = a
            .as_slice()
            .iter()
            .zip(b.as_slice())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max);
        (diff, diff <= 1e-6)
    };

    let mut minimizer = Minimizer::new(
        chain3(),
        vec![1.0],
        reference(),
        candidate(overrides),
        compare,
        Settings::default().with_return_intermediate(true),
    )
    .unwrap();

    minimizer.run_nodes(None, None).unwrap();
    assert_eq!(seen.get(), 3);
    let key = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    assert!(minimizer.results().contains_key(&key));
}
