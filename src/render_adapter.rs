//! Hand-off to an external graph renderer: flat nodes plus parent-child edges.

use serde::{Deserialize, Serialize};

use crate::outline_node::OutlineNode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineGraph {
    /// Pre-order, so the root comes first.
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl OutlineGraph {
    pub fn root(&self) -> Option<&GraphNode> {
        self.nodes.first()
    }
}

pub fn to_graph(tree: &OutlineNode) -> OutlineGraph {
    let mut nodes = Vec::with_capacity(tree.node_count());
    let mut edges = Vec::new();

    tree.walk(&mut |node, parent| {
        nodes.push(GraphNode {
            id: node.id.clone(),
            label: node.title.clone(),
            level: node.level,
        });
        if let Some(parent) = parent {
            edges.push(GraphEdge {
                from: parent.id.clone(),
                to: node.id.clone(),
            });
        }
    });

    OutlineGraph { nodes, edges }
}
