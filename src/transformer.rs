//! Depth clamp and single-child-chain collapse.
//!
//! Both take a tree by reference and build a new one, so the same
//! extracted tree can be transformed again with other parameters.

use serde::{Deserialize, Serialize};

use crate::outline_node::OutlineNode;

pub const DEFAULT_CHAIN_SEPARATOR: &str = " › ";

/// Parameters of one transform call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Deepest level kept; `None` keeps everything.
    pub max_depth: Option<u32>,
    pub collapse_chains: bool,
    /// Joins the titles of a collapsed chain.
    pub chain_separator: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            collapse_chains: false,
            chain_separator: DEFAULT_CHAIN_SEPARATOR.to_string(),
        }
    }
}

impl TransformConfig {
    pub fn new(max_depth: Option<u32>, collapse_chains: bool) -> Self {
        Self {
            max_depth,
            collapse_chains,
            ..Self::default()
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.chain_separator = separator.into();
        self
    }
}

/// Clamp, then collapse if enabled.
pub fn transform(tree: &OutlineNode, config: &TransformConfig) -> OutlineNode {
    let clamped = clamp(tree, config.max_depth);
    if config.collapse_chains {
        collapse(&clamped, &config.chain_separator)
    } else {
        clamped
    }
}

/// Remove every node deeper than `max_depth`.
///
/// The text of a removed subtree (titles and earlier overflow, in document
/// order) is appended to the overflow of the surviving parent.
pub fn clamp(tree: &OutlineNode, max_depth: Option<u32>) -> OutlineNode {
    match max_depth {
        Some(depth) => clamp_node(tree, depth),
        None => tree.clone(),
    }
}

fn clamp_node(node: &OutlineNode, depth: u32) -> OutlineNode {
    let mut out = childless(node);
    for child in &node.children {
        if child.level > depth {
            out.overflow.extend(child.subtree_text());
        } else {
            out.children.push(clamp_node(child, depth));
        }
    }
    out
}

/// Merge runs of single-child nodes into one node titled by the joined run.
///
/// A node absorbs its only child while that child has children of its own,
/// so leaves are never merged away. The root is never merged with its child.
/// The merged node keeps the id, level and source of the top of the run.
pub fn collapse(tree: &OutlineNode, separator: &str) -> OutlineNode {
    let mut root = childless(tree);
    root.children = tree
        .children
        .iter()
        .map(|child| collapse_node(child, separator))
        .collect();
    root
}

fn collapse_node(node: &OutlineNode, separator: &str) -> OutlineNode {
    let mut merged = childless(node);
    let mut titles = vec![node.title.as_str()];
    let mut lowest = node;

    while let [only] = lowest.children.as_slice() {
        if only.children.is_empty() {
            break;
        }
        titles.push(only.title.as_str());
        merged.overflow.extend(only.overflow.iter().cloned());
        lowest = only;
    }

    merged.title = titles.join(separator);
    merged.children = lowest
        .children
        .iter()
        .map(|child| collapse_node(child, separator))
        .collect();
    merged
}

fn childless(node: &OutlineNode) -> OutlineNode {
    OutlineNode {
        id: node.id.clone(),
        title: node.title.clone(),
        level: node.level,
        source_ref: node.source_ref,
        overflow: node.overflow.clone(),
        children: Vec::new(),
    }
}
