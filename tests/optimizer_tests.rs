mod common;

use common::{assert_dated_consistent, clock_tree, nested_tree, total_config};
use ratesmooth::api::{materialize, optimize, prepare, Analysis};
use ratesmooth::optimizer::runner::{ProgressCallback, Silent};
use ratesmooth::optimizer::RelaxationState;
use std::sync::atomic::{AtomicUsize, Ordering};

fn age_of(tree: &ratesmooth::Tree, label: &str) -> f64 {
    tree.node(tree.find(label).unwrap()).age.unwrap()
}

#[test]
fn closed_form_clock_age_is_recovered() {
    let mut analysis = Analysis::new(clock_tree().fix("root", 100.0).build(), total_config());
    let report = analysis.run().unwrap();

    let x = age_of(&report.dated, "X");
    assert!((x - 40.0).abs() < 0.05, "X dated at {}", x);
    assert!(report.optimization.value < 1e-6);
    for label in ["A", "B", "X", "C", "D"] {
        let rate = report.dated.node(report.dated.find(label).unwrap()).rate.unwrap();
        assert!((rate - 0.1).abs() < 1e-3, "{} rate {}", label, rate);
    }
    assert_dated_consistent(&report.dated);
}

#[test]
fn calibrations_hold_in_the_result() {
    let mut analysis = Analysis::new(
        nested_tree()
            .max("root", 80.0)
            .min("Y", 30.0)
            .max("Z", 20.0)
            .fix("X", 12.0)
            .build(),
        total_config(),
    );
    let report = analysis.run().unwrap();
    assert_dated_consistent(&report.dated);
    assert_eq!(age_of(&report.dated, "X"), 12.0);
    assert!(age_of(&report.dated, "Y") >= 30.0);
    assert!(age_of(&report.dated, "Z") <= 20.0);
    assert!(age_of(&report.dated, "root") <= 80.0);
}

#[test]
fn result_is_written_back_into_the_array() {
    let mut tree = clock_tree().fix("root", 100.0).build();
    let cfg = total_config();
    let mut array = prepare(&mut tree, &cfg).unwrap();
    let opt = optimize(&mut array, &cfg, &Silent).unwrap();

    assert_eq!(opt.variables.len(), 1);
    let x = array.variable_index[0];
    assert_eq!(array.time[x], opt.variables[0]);
    array.check(&array.time).unwrap();

    let dated = materialize(&array);
    assert_eq!(age_of(&dated, "X"), opt.variables[0]);
    assert_eq!(dated.node(dated.root()).rate, Some(0.0));
}

#[test]
fn terminal_zero_leaf_reports_zero_age_and_rate() {
    let mut tree = clock_tree().fix("root", 100.0).build();
    let d = tree.find("D").unwrap();
    tree.node_mut(d).length = Some(0.0);

    let mut analysis = Analysis::new(tree, total_config());
    let report = analysis.run().unwrap();
    let d = report.dated.find("D").unwrap();
    assert_eq!(report.dated.node(d).age, Some(0.0));
    assert_eq!(report.dated.node(d).rate, Some(0.0));
}

#[test]
fn chronogram_edges_are_age_differences() {
    let mut analysis = Analysis::new(clock_tree().fix("root", 100.0).build(), total_config());
    let report = analysis.run().unwrap();
    let chrono = report.dated.chronogram().unwrap();
    let rato = report.dated.ratogram().unwrap();

    let x = chrono.find("X").unwrap();
    let c = chrono.find("C").unwrap();
    let expected = 100.0 - age_of(&report.dated, "X");
    assert!((chrono.node(x).length.unwrap() - expected).abs() < 1e-12);
    assert!((chrono.node(c).length.unwrap() - age_of(&report.dated, "X")).abs() < 1e-12);
    assert_eq!(rato.node(x).length, report.dated.node(x).rate);
}

#[test]
fn one_barrier_round_reports_limit_reached() {
    let mut cfg = total_config();
    cfg.barrier.max_iterations = 1;
    cfg.barrier.tolerance = 0.0;
    let mut analysis = Analysis::new(nested_tree().fix("root", 50.0).build(), cfg);
    let report = analysis.run().unwrap();

    let diag = &report.optimization.diagnostics;
    assert!(diag.limit_reached);
    assert!(diag
        .restarts
        .iter()
        .all(|r| r.rounds == 1 && r.state == RelaxationState::LimitReached));
    assert!(report
        .warnings()
        .iter()
        .any(|w| w.contains("iteration limit")));
}

struct CountingCallback {
    rounds: AtomicUsize,
}

impl ProgressCallback for CountingCallback {
    fn on_progress(&self, _restart: usize, _round: usize, _value: f64) -> bool {
        self.rounds.fetch_add(1, Ordering::SeqCst);
        true
    }
}

#[test]
fn callback_sees_every_round() {
    let mut analysis = Analysis::new(nested_tree().fix("root", 50.0).build(), total_config());
    let cb = CountingCallback {
        rounds: AtomicUsize::new(0),
    };
    let report = analysis.run_with(&cb).unwrap();
    let total: usize = report
        .optimization
        .diagnostics
        .restarts
        .iter()
        .map(|r| r.rounds)
        .sum();
    assert_eq!(cb.rounds.load(Ordering::SeqCst), total);
    assert!(!report.optimization.diagnostics.cancelled);
}

#[test]
fn parallel_restarts_agree_with_sequential() {
    let tree = nested_tree().max("root", 70.0).min("Z", 10.0).build();
    let mut cfg = total_config();
    cfg.general.number_of_guesses = 4;

    let sequential = Analysis::new(tree.clone(), cfg.clone()).run().unwrap();
    cfg.general.parallel = true;
    let parallel = Analysis::new(tree, cfg).run().unwrap();

    assert_eq!(sequential.optimization.variables, parallel.optimization.variables);
    assert_eq!(
        sequential.optimization.diagnostics.best_restart,
        parallel.optimization.diagnostics.best_restart
    );
}
