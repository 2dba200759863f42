#![allow(dead_code)]

use ratesmooth::config::{BranchLengthFormat, Config};
use ratesmooth::tree::{NodeId, Tree};

/// Config with raw lengths taken as substitution counts and a fixed seed.
pub fn total_config() -> Config {
    let mut cfg = Config::default();
    cfg.branch_length.format = BranchLengthFormat::Total;
    cfg.branch_length.round = false;
    cfg.general.seed = 2024;
    cfg.general.number_of_guesses = 3;
    cfg
}

/// Small builder that names nodes as it goes.
pub struct TreeBuilder {
    tree: Tree,
}

impl TreeBuilder {
    pub fn new(root: &str) -> Self {
        Self {
            tree: Tree::new(Some(root)),
        }
    }

    pub fn child(mut self, parent: &str, label: &str, length: f64) -> Self {
        let p = self.id(parent);
        self.tree.add_child(p, Some(label), Some(length));
        self
    }

    pub fn fix(mut self, label: &str, age: f64) -> Self {
        let id = self.id(label);
        self.tree.node_mut(id).fix = Some(age);
        self
    }

    pub fn min(mut self, label: &str, age: f64) -> Self {
        let id = self.id(label);
        self.tree.node_mut(id).min = Some(age);
        self
    }

    pub fn max(mut self, label: &str, age: f64) -> Self {
        let id = self.id(label);
        self.tree.node_mut(id).max = Some(age);
        self
    }

    pub fn build(self) -> Tree {
        self.tree
    }

    fn id(&self, label: &str) -> NodeId {
        self.tree
            .find(label)
            .unwrap_or_else(|| panic!("no node labelled {}", label))
    }
}

/// Root (A:10, B:10, X:6 -> (C:4, D:4)). With the root fixed at 100 every
/// edge has rate 0.1 exactly when X sits at age 40.
pub fn clock_tree() -> TreeBuilder {
    TreeBuilder::new("root")
        .child("root", "A", 10.0)
        .child("root", "B", 10.0)
        .child("root", "X", 6.0)
        .child("X", "C", 4.0)
        .child("X", "D", 4.0)
}

/// (((A:2,B:3)X:1,C:4)Y:2,(D:3,E:1)Z:5)root
pub fn nested_tree() -> TreeBuilder {
    TreeBuilder::new("root")
        .child("root", "Y", 2.0)
        .child("Y", "X", 1.0)
        .child("X", "A", 2.0)
        .child("X", "B", 3.0)
        .child("Y", "C", 4.0)
        .child("root", "Z", 5.0)
        .child("Z", "D", 3.0)
        .child("Z", "E", 1.0)
}

/// Asserts strict ancestor ordering and every raw calibration of `dated`.
pub fn assert_dated_consistent(dated: &Tree) {
    for id in dated.preorder() {
        let node = dated.node(id);
        let age = node.age.expect("materialized node without age");
        if let Some(p) = node.parent {
            let parent_age = dated.node(p).age.unwrap();
            assert!(
                age < parent_age,
                "{} at {} is not younger than its parent at {}",
                dated.display_label(id),
                age,
                parent_age
            );
        }
        if let Some(f) = node.fix {
            assert_eq!(age, f, "{} ignores its fixed age", dated.display_label(id));
        }
        if let Some(m) = node.min {
            assert!(age >= m, "{} below its minimum", dated.display_label(id));
        }
        if let Some(m) = node.max {
            assert!(age <= m, "{} above its maximum", dated.display_label(id));
        }
    }
}
