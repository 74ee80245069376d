//! Text serializations of an outline tree.
//!
//! Every exporter is a pure function of the tree and cannot fail.

use std::fmt::Write;

use crate::outline_node::OutlineNode;

const DOT_FONT: &str = "Noto Sans CJK JP";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
    Opml,
    Dot,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "markdown" | "md" => Some(ExportFormat::Markdown),
            "opml" => Some(ExportFormat::Opml),
            "dot" | "graphviz" => Some(ExportFormat::Dot),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Opml => "opml",
            ExportFormat::Dot => "dot",
        }
    }
}

pub fn export(tree: &OutlineNode, format: ExportFormat) -> String {
    match format {
        ExportFormat::Json => export_json(tree),
        ExportFormat::Markdown => export_markdown(tree),
        ExportFormat::Opml => export_opml(tree),
        ExportFormat::Dot => export_dot(tree),
    }
}

/// Pretty-printed JSON. `source_ref` and `overflow` are omitted when empty.
pub fn export_json(tree: &OutlineNode) -> String {
    serde_json::to_string_pretty(tree).unwrap_or_else(|e| {
        log::error!("Failed to serialize outline: {}", e);
        "{}".to_string()
    })
}

/// Parse a tree written by [`export_json`].
pub fn import_json(text: &str) -> serde_json::Result<OutlineNode> {
    serde_json::from_str(text)
}

/// One `- title` line per node, indented two spaces per level.
pub fn export_markdown(tree: &OutlineNode) -> String {
    let mut out = String::new();
    tree.walk(&mut |node, _| {
        let title = node.title.replace(['\r', '\n'], " ");
        let _ = writeln!(out, "{}- {}", "  ".repeat(node.level as usize), title);
    });
    out
}

/// OPML 2.0; clamp overflow goes into the `_note` attribute.
pub fn export_opml(tree: &OutlineNode) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<opml version=\"2.0\">\n");
    out.push_str("  <head>\n");
    let _ = writeln!(out, "    <title>{}</title>", xml_escape(&tree.title));
    out.push_str("  </head>\n");
    out.push_str("  <body>\n");
    write_opml_outline(&mut out, tree, 2);
    out.push_str("  </body>\n");
    out.push_str("</opml>\n");
    out
}

fn write_opml_outline(out: &mut String, node: &OutlineNode, indent: usize) {
    let pad = "  ".repeat(indent);
    let _ = write!(out, "{}<outline text=\"{}\"", pad, xml_escape(&node.title));
    if !node.overflow.is_empty() {
        let _ = write!(out, " _note=\"{}\"", xml_escape(&node.overflow.join("\n")));
    }

    if node.children.is_empty() {
        out.push_str("/>\n");
        return;
    }

    out.push_str(">\n");
    for child in &node.children {
        write_opml_outline(out, child, indent + 1);
    }
    let _ = writeln!(out, "{}</outline>", pad);
}

/// Escape for element text and attribute values; characters XML 1.0
/// cannot carry are dropped.
fn xml_escape(text: &str) -> String {
    let allowed: String = text.chars().filter(|&c| is_xml_char(c)).collect();
    quick_xml::escape::escape(allowed.as_str())
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Graphviz digraph: one box per node, one edge per parent-child pair.
pub fn export_dot(tree: &OutlineNode) -> String {
    let mut out = String::new();
    out.push_str("digraph outline {\n");
    let _ = writeln!(out, "  label=\"{}\";", dot_escape(&tree.title));
    let _ = writeln!(
        out,
        "  node [shape=box, style=\"rounded,filled\", color=lightblue2, fontname=\"{}\"];",
        DOT_FONT
    );

    tree.walk(&mut |node, _| {
        let _ = writeln!(out, "  \"{}\" [label=\"{}\"];", dot_escape(&node.id), dot_escape(&node.title));
    });
    tree.walk(&mut |node, parent| {
        if let Some(parent) = parent {
            let _ = writeln!(out, "  \"{}\" -> \"{}\";", dot_escape(&parent.id), dot_escape(&node.id));
        }
    });

    out.push_str("}\n");
    out
}

fn dot_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' | '\r' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}
