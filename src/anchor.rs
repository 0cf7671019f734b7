//! Semantic anchors: describe a line by the chain of symbols enclosing it,
//! and resolve such a description back to a line in a later outline.

use std::fmt::Write as _;

use crate::types::{Anchor, Confidence, Resolution, SymbolNode, SymbolTree};

/// Anchor `line` to the innermost symbol containing it.
///
/// Symbols are searched in document order and the first one containing the
/// line is descended into, so overlapping siblings resolve to the earlier
/// one. Returns `None` when no symbol contains the line.
pub fn create_anchor(tree: &SymbolTree, line: u32) -> Option<Anchor> {
    let mut chain: Vec<&SymbolNode> = Vec::new();
    let mut level = tree.symbols.as_slice();
    while let Some(node) = level.iter().find(|n| return n.range.contains(line)) {
        chain.push(node);
        level = node.children.as_slice();
    }

    let innermost = chain.last()?;
    let container_name = chain
        .len()
        .checked_sub(2)
        .and_then(|i| return chain.get(i))
        .map(|n| return n.name.clone());
    return Some(Anchor {
        container_name,
        offset: line.saturating_sub(innermost.range.start),
        symbol_kind: innermost.kind,
        symbol_path: chain.iter().map(|n| return n.name.clone()).collect(),
    });
}

/// Every node matching `path`, in traversal order. A node named like the
/// current path element advances the match; any other node is searched
/// through at the same depth, so a symbol nested under a new or renamed
/// wrapper still matches.
pub fn find_by_path<'t>(tree: &'t SymbolTree, path: &[String]) -> Vec<&'t SymbolNode> {
    let mut found = Vec::new();
    if !path.is_empty() {
        match_path(&tree.symbols, path, &mut found);
    }
    return found;
}

/// Collect nodes in `nodes` (and below) matching the remaining `path`.
fn match_path<'t>(nodes: &'t [SymbolNode], path: &[String], found: &mut Vec<&'t SymbolNode>) {
    let Some((name, rest)) = path.split_first() else {
        return;
    };
    for node in nodes {
        if node.name != *name {
            match_path(&node.children, path, found);
        } else if rest.is_empty() {
            found.push(node);
        } else {
            match_path(&node.children, rest, found);
        }
    }
}

/// Relaxed lookup for an anchor whose exact path no longer resolves: the
/// first symbol anywhere in the outline named like the anchor's innermost
/// symbol, preferring one of the same kind. Used to tell a moved or renamed
/// container apart from a deleted symbol.
pub fn locate_relaxed(tree: &SymbolTree, anchor: &Anchor) -> Option<Resolution> {
    let name = anchor.symbol_path.last()?;
    let mut candidates = Vec::new();
    walk(&tree.symbols, &mut |node| {
        if node.name == *name {
            candidates.push(node);
        }
    });

    let found = candidates
        .iter()
        .find(|n| return n.kind == anchor.symbol_kind)
        .or_else(|| return candidates.first())?;
    return Some(Resolution {
        confidence: Confidence::Moved,
        line: Some(line_within(found, anchor.offset)),
        message: format!("symbol {} not at its recorded path, found by name at line {}", anchor.display_path(), found.range.start),
    });
}

/// Render an outline as an indented list, one symbol per line.
pub fn render_tree(tree: &SymbolTree) -> String {
    /// Append `nodes` at `depth`.
    fn render(nodes: &[SymbolNode], depth: usize, out: &mut String) {
        for node in nodes {
            let indent = "  ".repeat(depth);
            let _ = writeln!(
                out,
                "{indent}{} {} [{}-{}]",
                node.kind, node.name, node.range.start, node.range.end
            );
            render(&node.children, depth.saturating_add(1), out);
        }
    }
    let mut out = String::new();
    render(&tree.symbols, 0, &mut out);
    return out;
}

/// Resolve an anchor against the current outline.
///
/// Exactly one match resolves `Exact`; several resolve `Ambiguous` to the
/// first in traversal order. The resolved line is the symbol start plus the
/// anchor's offset, clamped to the symbol's last line.
pub fn resolve_anchor(tree: &SymbolTree, anchor: &Anchor) -> Resolution {
    if tree.is_empty() {
        return Resolution::not_found("no symbols available");
    }
    let matches = find_by_path(tree, &anchor.symbol_path);
    let Some(first) = matches.first() else {
        return Resolution::not_found(format!("symbol {} not found", anchor.display_path()));
    };

    let line = line_within(first, anchor.offset);
    if matches.len() > 1 {
        return Resolution {
            confidence: Confidence::Ambiguous,
            line: Some(line),
            message: format!("found {} symbols matching path, using first match", matches.len()),
        };
    }
    return Resolution {
        confidence: Confidence::Exact,
        line: Some(line),
        message: format!("symbol {} found", anchor.display_path()),
    };
}

/// `node.range.start + offset`, clamped into the node.
fn line_within(node: &SymbolNode, offset: u32) -> u32 {
    return node.range.start.saturating_add(offset).min(node.range.end.max(node.range.start));
}

/// Depth-first, document-order visit of every node.
fn walk<'t>(nodes: &'t [SymbolNode], visit: &mut dyn FnMut(&'t SymbolNode)) {
    for node in nodes {
        visit(node);
        walk(&node.children, visit);
    }
}

#[cfg(test)]
mod tests {
    use super::{create_anchor, find_by_path, locate_relaxed, render_tree, resolve_anchor};
    use crate::types::{Confidence, SymbolKind, SymbolNode, SymbolTree};

    fn tree() -> SymbolTree {
        return SymbolTree {
            symbols: vec![
                SymbolNode::new("Config", SymbolKind::Class, 1, 10).with_children(vec![
                    SymbolNode::new("validate", SymbolKind::Method, 3, 6),
                    SymbolNode::new("load", SymbolKind::Method, 7, 9),
                ]),
                SymbolNode::new("main", SymbolKind::Function, 12, 15),
            ],
        };
    }

    #[test]
    fn anchors_innermost_symbol() {
        let anchor = create_anchor(&tree(), 5).unwrap();
        assert_eq!(anchor.symbol_path, ["Config", "validate"]);
        assert_eq!(anchor.container_name.as_deref(), Some("Config"));
        assert_eq!(anchor.offset, 2);
        assert_eq!(anchor.symbol_kind, SymbolKind::Method);
    }

    #[test]
    fn top_level_symbol_has_no_container() {
        let anchor = create_anchor(&tree(), 12).unwrap();
        assert_eq!(anchor.symbol_path, ["main"]);
        assert_eq!(anchor.container_name, None);
        assert_eq!(anchor.offset, 0);
    }

    #[test]
    fn line_between_symbols_has_no_anchor() {
        assert!(create_anchor(&tree(), 11).is_none());
        assert!(create_anchor(&SymbolTree::default(), 1).is_none());
    }

    #[test]
    fn create_then_resolve_is_exact() {
        let outline = tree();
        for line in [1, 2, 4, 8, 10, 12, 15] {
            let anchor = create_anchor(&outline, line).unwrap();
            let resolution = resolve_anchor(&outline, &anchor);
            assert_eq!(resolution.confidence, Confidence::Exact, "line {line}");
            assert_eq!(resolution.line, Some(line), "line {line}");
        }
    }

    #[test]
    fn resolution_follows_a_moved_symbol() {
        let anchor = create_anchor(&tree(), 13).unwrap();
        let moved = SymbolTree { symbols: vec![SymbolNode::new("main", SymbolKind::Function, 20, 23)] };
        let resolution = resolve_anchor(&moved, &anchor);
        assert_eq!(resolution.confidence, Confidence::Exact);
        assert_eq!(resolution.line, Some(21));
    }

    #[test]
    fn offset_is_clamped_to_a_shrunken_symbol() {
        let anchor = create_anchor(&tree(), 15).unwrap();
        let shrunk = SymbolTree { symbols: vec![SymbolNode::new("main", SymbolKind::Function, 12, 13)] };
        assert_eq!(resolve_anchor(&shrunk, &anchor).line, Some(13));
    }

    #[test]
    fn duplicate_paths_are_ambiguous_and_pick_the_first() {
        let anchor = create_anchor(&tree(), 12).unwrap();
        let twice = SymbolTree {
            symbols: vec![
                SymbolNode::new("main", SymbolKind::Function, 3, 4),
                SymbolNode::new("main", SymbolKind::Function, 8, 9),
            ],
        };
        for _ in 0..3 {
            let resolution = resolve_anchor(&twice, &anchor);
            assert_eq!(resolution.confidence, Confidence::Ambiguous);
            assert_eq!(resolution.line, Some(3));
            assert!(resolution.message.contains("found 2 symbols"));
        }
    }

    #[test]
    fn missing_symbol_is_not_found() {
        let anchor = create_anchor(&tree(), 4).unwrap();
        let other = SymbolTree { symbols: vec![SymbolNode::new("other", SymbolKind::Function, 1, 2)] };
        let resolution = resolve_anchor(&other, &anchor);
        assert_eq!(resolution.confidence, Confidence::NotFound);
        assert_eq!(resolution.line, None);
        assert_eq!(resolve_anchor(&SymbolTree::default(), &anchor).message, "no symbols available");
    }

    #[test]
    fn path_lookup_descends_by_name() {
        let outline = tree();
        let path = vec!["Config".to_string(), "load".to_string()];
        let found = find_by_path(&outline, &path);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].range.start, 7);
        assert!(find_by_path(&outline, &[]).is_empty());
    }

    #[test]
    fn path_matches_through_a_new_wrapper() {
        let flat = SymbolTree { symbols: vec![SymbolNode::new("main", SymbolKind::Function, 1, 3)] };
        let anchor = create_anchor(&flat, 2).unwrap();
        let wrapped = SymbolTree {
            symbols: vec![SymbolNode::new("app", SymbolKind::Module, 4, 8)
                .with_children(vec![SymbolNode::new("main", SymbolKind::Function, 5, 7)])],
        };
        let resolution = resolve_anchor(&wrapped, &anchor);
        assert_eq!(resolution.confidence, Confidence::Exact);
        assert_eq!(resolution.line, Some(6));
    }

    #[test]
    fn nested_path_matches_under_a_renamed_outer_scope() {
        let anchor = create_anchor(&tree(), 4).unwrap();
        let namespaced = SymbolTree {
            symbols: vec![SymbolNode::new("settings", SymbolKind::Namespace, 1, 20).with_children(vec![
                SymbolNode::new("Config", SymbolKind::Class, 2, 12)
                    .with_children(vec![SymbolNode::new("validate", SymbolKind::Method, 5, 8)]),
            ])],
        };
        assert_eq!(resolve_anchor(&namespaced, &anchor).line, Some(6));
        let path = vec!["Config".to_string(), "validate".to_string()];
        assert_eq!(find_by_path(&namespaced, &path).len(), 1);
    }

    #[test]
    fn relaxed_lookup_finds_symbol_under_a_new_container() {
        let anchor = create_anchor(&tree(), 8).unwrap();
        let renamed = SymbolTree {
            symbols: vec![SymbolNode::new("Settings", SymbolKind::Class, 1, 10)
                .with_children(vec![SymbolNode::new("load", SymbolKind::Method, 4, 6)])],
        };
        assert_eq!(resolve_anchor(&renamed, &anchor).confidence, Confidence::NotFound);
        let relaxed = locate_relaxed(&renamed, &anchor).unwrap();
        assert_eq!(relaxed.confidence, Confidence::Moved);
        assert_eq!(relaxed.line, Some(5));
        assert!(locate_relaxed(&SymbolTree::default(), &anchor).is_none());
    }

    #[test]
    fn rendered_tree_is_indented() {
        let text = render_tree(&tree());
        assert!(text.contains("class Config [1-10]\n  method validate [3-6]"));
    }
}
