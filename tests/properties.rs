use proptest::prelude::*;
use quick_xml::events::Event;
use quick_xml::Reader;

use outline_reader_mcp::{
    clamp, collapse, export_json, export_markdown, export_opml, import_json, nest_by_levels,
    transform, OutlineItem, OutlineNode, SourceRef, TransformConfig,
};

const SEPARATOR: &str = " › ";

fn tree_strategy() -> impl Strategy<Value = OutlineNode> {
    prop::collection::vec(
        (1u32..=5, "[A-Za-z0-9 <>&\"'é漢]{1,12}", prop::option::of(1u32..50)),
        0..30,
    )
    .prop_map(|items| {
        let items = items
            .into_iter()
            .map(|(level, title, page)| OutlineItem::new(level, title, page.map(SourceRef::Page)))
            .collect();
        nest_by_levels(items, "report.pdf")
    })
}

fn count_nodes(tree: &OutlineNode, keep: impl Fn(&OutlineNode) -> bool) -> usize {
    let mut count = 0;
    tree.walk(&mut |node, _| {
        if keep(node) {
            count += 1;
        }
    });
    count
}

fn overflow_len(tree: &OutlineNode) -> usize {
    let mut total = 0;
    tree.walk(&mut |node, _| total += node.overflow.len());
    total
}

fn levels_increase(tree: &OutlineNode) -> bool {
    let mut ok = true;
    tree.walk(&mut |node, parent| {
        if let Some(parent) = parent {
            ok &= node.level > parent.level;
        }
    });
    ok
}

fn opml_outline_texts(opml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(opml);
    let mut texts = Vec::new();
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"outline" => {
                for attr in e.attributes() {
                    let attr = attr.unwrap();
                    if attr.key.as_ref() == b"text" {
                        texts.push(attr.unescape_value().unwrap().to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    texts
}

proptest! {
    #[test]
    fn clamp_bounds_depth(tree in tree_strategy(), depth in 0u32..6) {
        let clamped = clamp(&tree, Some(depth));
        prop_assert!(clamped.max_level() <= depth);
        prop_assert_eq!(
            count_nodes(&clamped, |_| true),
            count_nodes(&tree, |n| n.level <= depth)
        );
        // Every removed title lands in some overflow list
        prop_assert_eq!(overflow_len(&clamped), tree.node_count() - clamped.node_count());
    }

    #[test]
    fn clamp_is_idempotent(tree in tree_strategy(), depth in 0u32..6) {
        let once = clamp(&tree, Some(depth));
        prop_assert_eq!(clamp(&once, Some(depth)), once.clone());
        prop_assert_eq!(clamp(&tree, None), tree);
    }

    #[test]
    fn collapse_is_idempotent(tree in tree_strategy()) {
        let once = collapse(&tree, SEPARATOR);
        prop_assert_eq!(collapse(&once, SEPARATOR), once);
    }

    #[test]
    fn collapse_preserves_leaves(tree in tree_strategy()) {
        let collapsed = collapse(&tree, SEPARATOR);
        let before: Vec<(&str, Option<SourceRef>)> =
            tree.leaves().iter().map(|n| (n.title.as_str(), n.source_ref)).collect();
        let after: Vec<(&str, Option<SourceRef>)> =
            collapsed.leaves().iter().map(|n| (n.title.as_str(), n.source_ref)).collect();
        prop_assert_eq!(before, after);
        prop_assert_eq!(&collapsed.title, &tree.title);
    }

    #[test]
    fn transform_keeps_levels_strictly_increasing(
        tree in tree_strategy(),
        depth in prop::option::of(1u32..6),
        collapse_chains in any::<bool>(),
    ) {
        let out = transform(&tree, &TransformConfig::new(depth, collapse_chains));
        prop_assert!(levels_increase(&out));
        prop_assert_eq!(out.level, 0);
        if let Some(depth) = depth {
            prop_assert!(out.max_level() <= depth);
        }
    }

    #[test]
    fn json_round_trip(tree in tree_strategy(), depth in 1u32..4) {
        let clamped = clamp(&tree, Some(depth));
        prop_assert_eq!(import_json(&export_json(&clamped)).unwrap(), clamped);
    }

    #[test]
    fn markdown_has_one_line_per_node(tree in tree_strategy()) {
        prop_assert_eq!(export_markdown(&tree).lines().count(), tree.node_count());
    }

    #[test]
    fn opml_is_well_formed(tree in tree_strategy(), depth in 1u32..4) {
        let clamped = clamp(&tree, Some(depth));
        let texts = opml_outline_texts(&export_opml(&clamped));

        let mut titles = Vec::new();
        clamped.walk(&mut |node, _| titles.push(node.title.clone()));
        prop_assert_eq!(texts, titles);
    }
}
