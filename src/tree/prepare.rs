//! Turns a user tree into a substitution-scaled working copy with no
//! zero-length internal edges, ready to be flattened into an [`Array`].
//!
//! Order of operations: scale, then either the scalar override or leaf
//! grounding, then collapse, label freezing and indexing.
//!
//! [`Array`]: crate::array::Array

use super::{NodeId, Tree};
use crate::array::{max_set, min_set};
use crate::config::{BranchLengthFormat, BranchLengthParams, Config};
use crate::error::{describe_bounds, RateSmoothError, SmoothResult};
use tracing::{debug, info, warn};

/// Root age used when only relative rates matter.
pub const SCALAR_ROOT_AGE: f64 = 100.0;

/// Scaled maximum branch length the `guess` policy aims for.
const GUESS_TARGET: f64 = 1000.0;

/// Result of preprocessing: the working copy plus what the array builder needs.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub tree: Tree,
    /// Participating nodes in preorder; position equals `Node::index`.
    pub nodes: Vec<NodeId>,
    pub terminal_zero: Vec<NodeId>,
    pub multiplier: f64,
    /// True if leaf grounding was applied (and should persist on the user tree).
    pub grounded: bool,
    pub warnings: Vec<String>,
}

/// Runs the whole preprocessing pipeline on a copy of `tree`.
pub fn preprocess(tree: &Tree, config: &Config) -> SmoothResult<Preprocessed> {
    let mut work = tree.clone();

    let multiplier = scale_branch_lengths(&mut work, &config.branch_length)?;

    let grounded = if config.general.scalar {
        scalar_override(&mut work);
        false
    } else {
        ground(&mut work)
    };

    let terminal_zero = flag_terminal_zeros(&mut work)?;
    let warnings = collapse(&mut work, config.general.strict)?;
    freeze_labels(&mut work);
    let nodes = assign_indices(&mut work)?;

    info!(
        "Preprocessed tree: {} nodes, {} terminal zeros, multiplier {}",
        nodes.len(),
        terminal_zero.len(),
        multiplier
    );

    Ok(Preprocessed {
        tree: work,
        nodes,
        terminal_zero,
        multiplier,
        grounded,
        warnings,
    })
}

/// Picks the factor that converts raw edge lengths into substitution counts.
pub fn branch_multiplier(tree: &Tree, params: &BranchLengthParams) -> SmoothResult<f64> {
    match params.format {
        BranchLengthFormat::Total => Ok(1.0),
        BranchLengthFormat::Persite => params
            .nsites
            .map(|n| n as f64)
            .ok_or_else(|| {
                RateSmoothError::Config(
                    "branch_length.nsites is required when format is persite".to_string(),
                )
            }),
        BranchLengthFormat::Guess => {
            let longest = tree
                .preorder()
                .into_iter()
                .filter_map(|id| tree.node(id).length)
                .fold(0.0f64, f64::max);
            if !(longest.is_finite() && longest > 0.0) {
                return Err(RateSmoothError::InvalidTree(
                    "Cannot guess a branch length multiplier: no positive branch length".to_string(),
                ));
            }
            let mut multiplier = 1.0;
            while longest * multiplier < GUESS_TARGET {
                multiplier *= 10.0;
            }
            Ok(multiplier)
        }
    }
}

/// Writes `subs` for every non-root node. Missing lengths are an error,
/// negative lengths count as zero.
pub fn scale_branch_lengths(tree: &mut Tree, params: &BranchLengthParams) -> SmoothResult<f64> {
    let root = tree.root();
    for id in tree.preorder() {
        if id != root && tree.node(id).length.is_none() {
            return Err(RateSmoothError::InvalidTree(format!(
                "Node '{}' has no branch length",
                tree.display_label(id)
            )));
        }
    }

    let multiplier = branch_multiplier(tree, params)?;
    for id in tree.preorder() {
        let node = tree.node_mut(id);
        if id == root {
            node.subs = 0.0;
            continue;
        }
        let raw = node.length.unwrap_or(0.0).max(0.0) * multiplier;
        // Ties go to the even neighbour, so 0.5 rounds to a zero-length edge.
        node.subs = if params.round { raw.round_ties_even() } else { raw };
    }
    Ok(multiplier)
}

/// Fixes every leaf at age zero if no leaf carries any calibration.
/// Returns whether anything was changed.
pub fn ground(tree: &mut Tree) -> bool {
    let leaves = tree.leaves();
    if leaves.iter().any(|&id| tree.node(id).has_constraint()) {
        return false;
    }
    for id in leaves {
        tree.node_mut(id).fix = Some(0.0);
    }
    true
}

/// Drops every calibration; leaves at zero, root at [`SCALAR_ROOT_AGE`].
pub fn scalar_override(tree: &mut Tree) {
    for id in tree.preorder() {
        let leaf = tree.is_leaf(id);
        let node = tree.node_mut(id);
        node.clear_constraints();
        if leaf {
            node.fix = Some(0.0);
        }
    }
    let root = tree.root();
    tree.node_mut(root).fix = Some(SCALAR_ROOT_AGE);
}

/// Marks zero-substitution leaves, which sit out the analysis with age 0.
fn flag_terminal_zeros(tree: &mut Tree) -> SmoothResult<Vec<NodeId>> {
    let root = tree.root();
    let mut flagged = Vec::new();
    for id in tree.preorder() {
        if id == root || !tree.is_leaf(id) || tree.node(id).subs != 0.0 {
            continue;
        }
        if let Some(fix) = tree.node(id).fix {
            if fix != 0.0 {
                return Err(RateSmoothError::InvalidConstraint {
                    label: tree.display_label(id),
                    reason: format!(
                        "zero-length terminal branch must have age 0, but is fixed at {}",
                        fix
                    ),
                });
            }
        }
        tree.node_mut(id).terminal_zero = true;
        flagged.push(id);
    }
    Ok(flagged)
}

/// Removes internal nodes whose edge carries no substitutions, splicing their
/// children into the parent and pushing their calibrations outwards: onto the
/// parent as a minimum and onto the children as a maximum.
///
/// Returns warnings for calibrations that were relocated; in strict mode a
/// relocation is an error instead.
pub fn collapse(tree: &mut Tree, strict: bool) -> SmoothResult<Vec<String>> {
    let root = tree.root();
    let mut warnings = Vec::new();

    for id in tree.preorder() {
        if id == root || tree.is_leaf(id) || tree.node(id).subs != 0.0 {
            continue;
        }
        let Some(parent) = tree.node(id).parent else {
            continue;
        };

        let node = tree.node(id).clone();
        let pushed_min = max_set(&[node.min, node.fix]);
        let pushed_max = min_set(&[node.max, node.fix]);

        if node.has_constraint() {
            let all_terminal_zero = node
                .children
                .iter()
                .all(|&c| tree.node(c).terminal_zero);
            if !all_terminal_zero {
                let label = tree.display_label(id);
                let reason = format!(
                    "calibration ({}) moved to neighbours when collapsing a zero-length branch",
                    describe_bounds(node.min, node.fix, node.max)
                );
                if strict {
                    return Err(RateSmoothError::InvalidConstraint { label, reason });
                }
                warn!("Node '{}': {}", label, reason);
                warnings.push(format!("Node '{}': {}", label, reason));
            }
        }

        let p = tree.node_mut(parent);
        p.min = max_set(&[p.min, pushed_min]);
        for &c in &node.children {
            let child = tree.node_mut(c);
            child.max = min_set(&[child.max, pushed_max]);
        }

        debug!("Collapsing zero-length branch above '{}'", tree.display_label(id));
        tree.splice_out(id);
    }

    Ok(warnings)
}

/// Pins the current display label onto every remaining node.
pub fn freeze_labels(tree: &mut Tree) {
    for id in tree.preorder() {
        if tree.node(id).label.is_none() {
            let label = tree.display_label(id);
            tree.node_mut(id).label = Some(label);
        }
    }
}

/// Numbers participating nodes in preorder and computes each node's order
/// (longest edge count down to a leaf). Terminal zeros are skipped.
pub fn assign_indices(tree: &mut Tree) -> SmoothResult<Vec<NodeId>> {
    let preorder = tree.preorder();
    for &id in &preorder {
        let node = tree.node_mut(id);
        node.index = None;
        node.order = 0;
    }

    let nodes: Vec<NodeId> = preorder
        .into_iter()
        .filter(|&id| !tree.node(id).terminal_zero)
        .collect();
    if nodes.len() < 2 {
        return Err(RateSmoothError::InvalidTree(format!(
            "Only {} node(s) left after collapsing zero-length branches; nothing to date",
            nodes.len()
        )));
    }

    for (k, &id) in nodes.iter().enumerate() {
        tree.node_mut(id).index = Some(k);
    }
    for &id in nodes.iter().rev() {
        let order = tree
            .node(id)
            .children
            .iter()
            .filter(|&&c| !tree.node(c).terminal_zero)
            .map(|&c| tree.node(c).order + 1)
            .max()
            .unwrap_or(0);
        tree.node_mut(id).order = order;
    }

    Ok(nodes)
}
