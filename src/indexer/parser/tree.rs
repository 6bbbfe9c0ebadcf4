// Tree-sitter plumbing shared by the grammar strategies

use tree_sitter::{Language, Node, Parser as TreeParser, Tree};

/// Share of the source, in bytes, that ERROR nodes may cover before the tree
/// is rejected.
const MAX_ERROR_SHARE: f64 = 0.5;

/// Parses `content`, rejecting trees that are mostly ERROR nodes so the
/// caller can fall back to heuristics.
pub fn parse(language: &Language, content: &str, what: &str) -> anyhow::Result<Tree> {
    let mut parser = TreeParser::new();
    parser.set_language(language)?;

    let tree = parser
        .parse(content, None)
        .ok_or_else(|| anyhow::anyhow!("Failed to parse {} code", what))?;

    let root = tree.root_node();
    if root.has_error() && !content.is_empty() {
        let share = error_bytes(root) as f64 / content.len() as f64;
        if share > MAX_ERROR_SHARE {
            anyhow::bail!("{} parse is {:.0}% errors", what, share * 100.0);
        }
    }

    Ok(tree)
}

/// Bytes covered by outermost ERROR nodes under `node`.
fn error_bytes(node: Node<'_>) -> usize {
    if node.is_error() {
        return node.byte_range().len();
    }
    if !node.has_error() {
        return 0;
    }
    children(node).into_iter().map(error_bytes).sum()
}

pub fn get_node_text<'a>(node: Node<'_>, content: &'a str) -> &'a str {
    content.get(node.byte_range()).unwrap_or("")
}

pub fn line(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

pub fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Pre-order visit of `node` and all of its descendants.
pub fn walk_tree<'t>(node: Node<'t>, visit: &mut impl FnMut(Node<'t>)) {
    visit(node);
    for child in children(node) {
        walk_tree(child, visit);
    }
}

/// First descendant (including `node`) of the given kind.
pub fn find_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    if kinds.contains(&node.kind()) {
        return Some(node);
    }
    children(node).into_iter().find_map(|c| find_kind(c, kinds))
}
