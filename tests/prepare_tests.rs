mod common;

use common::{clock_tree, nested_tree, total_config, TreeBuilder};
use ratesmooth::api::prepare;
use ratesmooth::config::BranchLengthFormat;
use ratesmooth::tree::prepare::{branch_multiplier, scale_branch_lengths};
use ratesmooth::RateSmoothError;
use rstest::rstest;

#[rstest]
#[case(0.05, 100, false, 5.0)]
#[case(0.05, 100, true, 5.0)]
#[case(0.013, 1000, false, 13.0)]
#[case(0.0126, 1000, true, 13.0)]
fn persite_scaling(#[case] length: f64, #[case] nsites: u64, #[case] round: bool, #[case] expected: f64) {
    let mut tree = TreeBuilder::new("root")
        .child("root", "A", length)
        .child("root", "B", 1.0)
        .build();
    let mut cfg = total_config();
    cfg.branch_length.format = BranchLengthFormat::Persite;
    cfg.branch_length.nsites = Some(nsites);
    cfg.branch_length.round = round;

    scale_branch_lengths(&mut tree, &cfg.branch_length).unwrap();
    let a = tree.find("A").unwrap();
    assert!((tree.node(a).subs - expected).abs() < 1e-9);
}

#[rstest]
#[case(0.5, 10_000.0)]
#[case(1.0, 1_000.0)]
#[case(2500.0, 1.0)]
#[case(0.0042, 1_000_000.0)]
fn guess_multiplier_reaches_four_digits(#[case] longest: f64, #[case] expected: f64) {
    let tree = TreeBuilder::new("root")
        .child("root", "A", longest)
        .child("root", "B", longest / 2.0)
        .build();
    let mut cfg = total_config();
    cfg.branch_length.format = BranchLengthFormat::Guess;
    assert_eq!(branch_multiplier(&tree, &cfg.branch_length).unwrap(), expected);
}

#[test]
fn infeasible_bounds_name_the_node() {
    let mut tree = nested_tree().min("Y", 50.0).max("Y", 30.0).build();
    match prepare(&mut tree, &total_config()) {
        Err(RateSmoothError::InvalidConstraint { label, reason }) => {
            assert_eq!(label, "Y");
            assert!(reason.contains("low=50"), "reason: {}", reason);
            assert!(reason.contains("high=30"), "reason: {}", reason);
        }
        other => panic!("expected InvalidConstraint, got {:?}", other.map(|a| a.n)),
    }
}

#[test]
fn leaves_with_minimums_and_no_ceiling_are_underconstrained() {
    let mut tree = clock_tree()
        .min("A", 1.0)
        .min("B", 1.0)
        .min("C", 2.0)
        .min("D", 2.0)
        .build();
    assert!(matches!(
        prepare(&mut tree, &total_config()),
        Err(RateSmoothError::Underconstrained(_))
    ));
}

#[test]
fn descendant_minimum_lifts_ancestors() {
    let mut tree = nested_tree().min("X", 12.0).max("root", 90.0).build();
    let a = prepare(&mut tree, &total_config()).unwrap();
    let idx = |label: &str| a.labels.iter().position(|l| l == label).unwrap();
    assert_eq!(a.low[idx("Y")], Some(12.0));
    assert_eq!(a.low[idx("root")], Some(12.0));
    assert_eq!(a.low[idx("Z")], Some(0.0));
    assert_eq!(a.high[idx("X")], Some(90.0));
}

#[test]
fn zero_length_internal_branch_is_collapsed() {
    let mut tree = nested_tree().fix("root", 60.0).build();
    let x = tree.find("X").unwrap();
    tree.node_mut(x).length = Some(0.0);

    let a = prepare(&mut tree, &total_config()).unwrap();
    assert!(!a.labels.iter().any(|l| l == "X"));
    let y = a.labels.iter().position(|l| l == "Y").unwrap();
    let kids: Vec<&str> = a.children[y].iter().map(|&c| a.labels[c].as_str()).collect();
    assert_eq!(kids, ["A", "B", "C"]);
    // The user's tree keeps every node.
    assert!(tree.find("X").is_some());
}

#[test]
fn terminal_zero_leaves_sit_out() {
    let mut tree = clock_tree().fix("root", 100.0).build();
    let d = tree.find("D").unwrap();
    tree.node_mut(d).length = Some(0.0);

    let a = prepare(&mut tree, &total_config()).unwrap();
    assert_eq!(a.n, 5);
    assert_eq!(a.terminal_zero.len(), 1);
    assert!(!a.labels.iter().any(|l| l == "D"));
}

#[test]
fn scalar_mode_ignores_calibrations_on_working_copy_only() {
    let mut tree = nested_tree().min("Y", 20.0).max("Y", 25.0).build();
    let mut cfg = total_config();
    cfg.general.scalar = true;

    let a = prepare(&mut tree, &cfg).unwrap();
    assert_eq!(a.fix[0], Some(100.0));
    assert_eq!(a.variable_index.len(), 3);
    let y = tree.find("Y").unwrap();
    assert_eq!(tree.node(y).min, Some(20.0));
    assert_eq!(tree.node(0).fix, None);
}

#[test]
fn missing_branch_length_is_invalid_tree() {
    let mut tree = clock_tree().fix("root", 100.0).build();
    let c = tree.find("C").unwrap();
    tree.node_mut(c).length = None;
    assert!(matches!(
        prepare(&mut tree, &total_config()),
        Err(RateSmoothError::InvalidTree(_))
    ));
}
