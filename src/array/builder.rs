use super::{max_set, min_set, Array};
use crate::error::{describe_bounds, RateSmoothError, SmoothResult};
use crate::tree::prepare::Preprocessed;
use tracing::{debug, info};

/// Flattens a preprocessed tree, propagates bounds and picks the free variables.
pub fn build_array(pre: Preprocessed) -> SmoothResult<Array> {
    let Preprocessed {
        tree,
        nodes,
        terminal_zero,
        multiplier,
        warnings,
        ..
    } = pre;
    let n = nodes.len();

    let mut parent = vec![0usize; n];
    let mut subs = vec![0.0; n];
    let mut fix = vec![None; n];
    let mut order = vec![0usize; n];
    let mut labels = Vec::with_capacity(n);
    let mut children = vec![Vec::new(); n];

    for (i, &id) in nodes.iter().enumerate() {
        let node = tree.node(id);
        labels.push(tree.display_label(id));
        fix[i] = node.fix;
        order[i] = node.order;
        if i > 0 {
            let p = node
                .parent
                .and_then(|pid| tree.node(pid).index)
                .ok_or_else(|| {
                    RateSmoothError::InvalidTree(format!(
                        "Node '{}' lost its parent during preprocessing",
                        labels[i]
                    ))
                })?;
            parent[i] = p;
            subs[i] = node.subs;
            children[p].push(i);
        }
    }

    // High bounds flow from the root down.
    let mut high: Vec<Option<f64>> = vec![None; n];
    for (i, &id) in nodes.iter().enumerate() {
        let node = tree.node(id);
        let inherited = if i > 0 { high[parent[i]] } else { None };
        high[i] = min_set(&[node.max, node.fix, inherited]);
    }

    // Low bounds flow from the leaves up.
    let mut low: Vec<Option<f64>> = nodes
        .iter()
        .enumerate()
        .map(|(i, &id)| {
            let node = tree.node(id);
            let floor = if i > 0 { Some(0.0) } else { None };
            max_set(&[floor, node.min, node.fix])
        })
        .collect();
    for i in (1..n).rev() {
        let p = parent[i];
        low[p] = max_set(&[low[p], low[i]]);
    }

    for i in 0..n {
        let (l, f, h) = (low[i], fix[i], high[i]);
        let ordered = [(l, f), (f, h), (l, h)]
            .iter()
            .all(|&(a, b)| match (a, b) {
                (Some(a), Some(b)) => a <= b,
                _ => true,
            });
        if !ordered {
            return Err(RateSmoothError::InvalidConstraint {
                label: labels[i].clone(),
                reason: format!("conflicting bounds ({})", describe_bounds(l, f, h)),
            });
        }
        if let (Some(l), Some(h), None) = (l, h, f) {
            if l == h {
                debug!("Node '{}' pinned at {} by its bounds", labels[i], l);
                fix[i] = Some(l);
            }
        }
    }

    for i in 1..n {
        let p = parent[i];
        if let (Some(fc), Some(fp)) = (fix[i], fix[p]) {
            if fc >= fp {
                return Err(RateSmoothError::InvalidConstraint {
                    label: labels[i].clone(),
                    reason: format!(
                        "fixed age {} is not younger than parent '{}' fixed at {}",
                        fc, labels[p], fp
                    ),
                });
            }
        }
    }

    // Leaves pinned at zero do not bound anything above them.
    let anchored = (0..n).any(|i| !children[i].is_empty() && high[i].is_some());
    if !anchored {
        return Err(RateSmoothError::Underconstrained(
            "no internal node has a fixed or maximum age, directly or inherited; \
             at least one upper bound is needed"
                .to_string(),
        ));
    }

    let variable_index: Vec<usize> = (0..n).filter(|&i| fix[i].is_none()).collect();
    let root_children: Vec<usize> = (1..n).filter(|&i| parent[i] == 0).collect();
    let inner_nodes: Vec<usize> = (1..n).filter(|&i| parent[i] != 0).collect();
    let constrained: Vec<usize> = variable_index
        .iter()
        .copied()
        .filter(|&i| low[i].is_some() || high[i].is_some())
        .collect();

    let time: Vec<f64> = fix.iter().map(|f| f.unwrap_or(f64::NAN)).collect();

    info!(
        "Array built: {} nodes, {} free, {} constrained",
        n,
        variable_index.len(),
        constrained.len()
    );

    Ok(Array {
        n,
        parent,
        subs,
        fix,
        low,
        high,
        order,
        labels,
        children,
        variable_index,
        root_children,
        inner_nodes,
        constrained,
        time,
        rate: vec![0.0; n],
        tree,
        node_ids: nodes,
        terminal_zero,
        multiplier,
        warnings,
    })
}
