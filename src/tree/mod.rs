//! Rooted phylogenetic tree owned by the caller.
//!
//! Nodes live in an arena and are referenced by [`NodeId`]. Calibrations
//! (`fix`, `min`, `max`) are set by the caller and persist across analysis
//! runs; the derived attributes (`subs`, `index`, `order`, `age`, `rate`) are
//! rewritten by every run.

pub mod prepare;

use crate::error::{RateSmoothError, SmoothResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Index of a node in the tree arena.
pub type NodeId = usize;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub label: Option<String>,
    /// Raw edge length above this node, in input units.
    pub length: Option<f64>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,

    // Calibrations
    pub fix: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,

    // Derived per run
    pub subs: f64,
    pub index: Option<usize>,
    pub order: usize,
    pub terminal_zero: bool,
    pub age: Option<f64>,
    pub rate: Option<f64>,
}

impl Node {
    pub fn has_constraint(&self) -> bool {
        self.fix.is_some() || self.min.is_some() || self.max.is_some()
    }

    pub fn clear_constraints(&mut self) {
        self.fix = None;
        self.min = None;
        self.max = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn new(root_label: Option<&str>) -> Self {
        let root = Node {
            label: root_label.map(str::to_string),
            ..Default::default()
        };
        Self {
            nodes: vec![root],
            root: 0,
        }
    }

    /// Appends a child at the end of `parent`'s child list.
    pub fn add_child(&mut self, parent: NodeId, label: Option<&str>, length: Option<f64>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            label: label.map(str::to_string),
            length,
            parent: Some(parent),
            ..Default::default()
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Arena size, including nodes detached by collapsing.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id].children.is_empty()
    }

    /// Label used in reports and error messages.
    pub fn display_label(&self, id: NodeId) -> String {
        match &self.nodes[id].label {
            Some(l) => l.clone(),
            None => format!("node{}", id),
        }
    }

    pub fn find(&self, label: &str) -> Option<NodeId> {
        self.preorder()
            .into_iter()
            .find(|&id| self.nodes[id].label.as_deref() == Some(label))
    }

    /// Nodes reachable from the root, parents before children, siblings in order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &c in self.nodes[id].children.iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    /// Nodes reachable from the root, children before parents.
    pub fn postorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            for &c in self.nodes[id].children.iter().rev() {
                stack.push((c, false));
            }
        }
        out
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| self.is_leaf(id))
            .collect()
    }

    /// Replaces `id` in its parent's child list by its own children, at the
    /// same position. The node is left detached in the arena.
    pub(crate) fn splice_out(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id].parent else {
            return;
        };
        let children = std::mem::take(&mut self.nodes[id].children);
        for &c in &children {
            self.nodes[c].parent = Some(parent);
        }
        let siblings = &mut self.nodes[parent].children;
        if let Some(pos) = siblings.iter().position(|&s| s == id) {
            siblings.splice(pos..=pos, children);
        }
        self.nodes[id].parent = None;
    }

    /// Copy whose edge lengths are elapsed time (parent age minus own age).
    /// Requires ages, as produced by materializing an analysis.
    pub fn chronogram(&self) -> SmoothResult<Tree> {
        let mut out = self.clone();
        for id in self.preorder() {
            let node = &self.nodes[id];
            let length = match node.parent {
                None => None,
                Some(p) => Some(self.require_age(p)? - self.require_age(id)?),
            };
            out.nodes[id].length = length;
        }
        Ok(out)
    }

    /// Copy whose edge lengths are the estimated substitution rates.
    pub fn ratogram(&self) -> SmoothResult<Tree> {
        let mut out = self.clone();
        for id in self.preorder() {
            if self.nodes[id].parent.is_some() {
                out.nodes[id].length = Some(self.nodes[id].rate.ok_or_else(|| {
                    RateSmoothError::InvalidTree(format!(
                        "Node '{}' has no rate; materialize an analysis first",
                        self.display_label(id)
                    ))
                })?);
            } else {
                out.nodes[id].length = None;
            }
        }
        Ok(out)
    }

    fn require_age(&self, id: NodeId) -> SmoothResult<f64> {
        self.nodes[id].age.ok_or_else(|| {
            RateSmoothError::InvalidTree(format!(
                "Node '{}' has no age; materialize an analysis first",
                self.display_label(id)
            ))
        })
    }

    pub fn from_spec(spec: &NodeSpec) -> Self {
        let mut tree = Tree::new(spec.label.as_deref());
        let root = tree.root;
        tree.nodes[root].length = spec.length;
        tree.apply_spec(root, spec);
        tree
    }

    fn apply_spec(&mut self, id: NodeId, spec: &NodeSpec) {
        self.nodes[id].fix = spec.fix;
        self.nodes[id].min = spec.min;
        self.nodes[id].max = spec.max;
        for child in &spec.children {
            let cid = self.add_child(id, child.label.as_deref(), child.length);
            self.apply_spec(cid, child);
        }
    }

    pub fn to_spec(&self) -> NodeSpec {
        self.spec_of(self.root)
    }

    fn spec_of(&self, id: NodeId) -> NodeSpec {
        let n = &self.nodes[id];
        NodeSpec {
            label: n.label.clone(),
            length: n.length,
            fix: n.fix,
            min: n.min,
            max: n.max,
            age: n.age,
            rate: n.rate,
            children: n.children.iter().map(|&c| self.spec_of(c)).collect(),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SmoothResult<Self> {
        let content = fs::read_to_string(path)?;
        let spec: NodeSpec = serde_json::from_str(&content)?;
        Ok(Tree::from_spec(&spec))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SmoothResult<()> {
        fs::write(path, serde_json::to_string_pretty(&self.to_spec())?)?;
        Ok(())
    }
}

/// Nested JSON form of a tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}
