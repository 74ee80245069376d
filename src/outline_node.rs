//! The outline tree shared by every extractor, transform and exporter.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Where a node came from in the source document (1-based).
///
/// Provenance only: never consulted for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRef {
    Page(u32),
    Slide(u32),
    Paragraph(u32),
}

/// One heading, slide, bullet or bookmark entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub id: String,
    pub title: String,
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<SourceRef>,
    /// Titles folded into this node by a depth clamp, in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overflow: Vec<String>,
    #[serde(default)]
    pub children: Vec<OutlineNode>,
}

/// A flat heading candidate before nesting.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineItem {
    pub level: u32,
    pub title: String,
    pub source_ref: Option<SourceRef>,
}

impl OutlineItem {
    pub fn new(level: u32, title: impl Into<String>, source_ref: Option<SourceRef>) -> Self {
        Self {
            level,
            title: title.into(),
            source_ref,
        }
    }
}

impl OutlineNode {
    /// Create a node with an unassigned id; ids are handed out by [`OutlineNode::renumber`].
    pub fn new(title: impl Into<String>, level: u32) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            level,
            source_ref: None,
            overflow: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A level-0 root with no children.
    pub fn root(title: impl Into<String>) -> Self {
        let mut root = Self::new(title, 0);
        root.renumber();
        root
    }

    pub fn with_source(mut self, source_ref: Option<SourceRef>) -> Self {
        self.source_ref = source_ref;
        self
    }

    pub fn with_children(mut self, children: Vec<OutlineNode>) -> Self {
        self.children = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// True for the root-only tree produced by a document with no headings.
    pub fn is_empty_document(&self) -> bool {
        self.level == 0 && self.children.is_empty()
    }

    /// Total number of nodes, root included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(OutlineNode::node_count).sum::<usize>()
    }

    pub fn max_level(&self) -> u32 {
        self.children
            .iter()
            .map(OutlineNode::max_level)
            .fold(self.level, u32::max)
    }

    /// Leaves in document order.
    pub fn leaves(&self) -> Vec<&OutlineNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a OutlineNode>) {
        if self.children.is_empty() {
            out.push(self);
        } else {
            for child in &self.children {
                child.collect_leaves(out);
            }
        }
    }

    /// Visit every node in pre-order (document order) with its parent.
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a OutlineNode, Option<&'a OutlineNode>),
    {
        self.walk_inner(None, visit);
    }

    fn walk_inner<'a, F>(&'a self, parent: Option<&'a OutlineNode>, visit: &mut F)
    where
        F: FnMut(&'a OutlineNode, Option<&'a OutlineNode>),
    {
        visit(self, parent);
        for child in &self.children {
            child.walk_inner(Some(self), visit);
        }
    }

    /// Assign `n0`, `n1`, ... in pre-order.
    pub fn renumber(&mut self) {
        let mut counter = 0usize;
        self.renumber_from(&mut counter);
    }

    fn renumber_from(&mut self, counter: &mut usize) {
        self.id = format!("n{}", counter);
        *counter += 1;
        for child in &mut self.children {
            child.renumber_from(counter);
        }
    }

    /// Raise child levels so every child sits strictly below its parent.
    pub fn enforce_levels(&mut self) {
        let floor = self.level + 1;
        for child in &mut self.children {
            if child.level < floor {
                child.level = floor;
            }
            child.enforce_levels();
        }
    }

    /// Titles of this node's subtree in document order, including overflow
    /// already folded into its members.
    pub fn subtree_text(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.walk(&mut |node, _| {
            out.push(node.title.clone());
            out.extend(node.overflow.iter().cloned());
        });
        out
    }
}

/// Nest a flat, document-ordered heading list under a synthetic level-0 root.
///
/// A heading becomes the child of the nearest preceding heading with a
/// smaller level. Items whose title normalizes to nothing are dropped;
/// levels below 1 are lifted to 1.
pub fn nest_by_levels(items: Vec<OutlineItem>, root_title: &str) -> OutlineNode {
    let mut stack: Vec<OutlineNode> = vec![OutlineNode::new(root_title, 0)];

    for item in items {
        let title = normalize_title(&item.title);
        if title.is_empty() {
            continue;
        }
        let level = item.level.max(1);

        // Close every open node at the same or a deeper level
        while stack.len() > 1 && stack.last().is_some_and(|top| level <= top.level) {
            fold_top(&mut stack);
        }

        stack.push(OutlineNode::new(title, level).with_source(item.source_ref));
    }

    while stack.len() > 1 {
        fold_top(&mut stack);
    }

    let mut root = stack
        .pop()
        .unwrap_or_else(|| OutlineNode::new(root_title, 0));
    root.renumber();
    root
}

fn fold_top(stack: &mut Vec<OutlineNode>) {
    if let Some(done) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(done);
        }
    }
}

/// Trim, NFC-normalize and collapse internal whitespace; control characters are removed.
pub fn normalize_title(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .nfc()
        .collect();
    WHITESPACE_RUN.replace_all(cleaned.trim(), " ").into_owned()
}
