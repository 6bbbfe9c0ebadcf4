// C++ extractor

use once_cell::sync::Lazy;
use regex::Regex;

use super::c::{is_function_header, locate, members_of, CUnit, Directives, Item, EXTERN_C};
use super::{collapse_ws, split_top_level, statements, strip_template_prefix, template_param_names, RecordBuilder};
use crate::index::{Extractor, FileRecord, SourceFile, TypeDetail, TypeSymbol};

pub struct CppExtractor;

impl CppExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for CppExtractor {
    fn name(&self) -> &'static str {
        "cpp"
    }

    #[cfg(feature = "tree-sitter")]
    fn extract_grammar(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        let unit = CUnit::new(file, true);
        let tree = super::tree::parse(&tree_sitter_cpp::LANGUAGE.into(), file.text, "C++")?;
        let root = tree.root_node();
        let mut items = Vec::new();
        let mut namespaces = Vec::new();
        grammar::locate(root, file.text, &mut items, &mut namespaces);
        let directives = super::c::grammar::directives(root, file.text);
        Ok(build(&unit, directives, namespaces, items))
    }

    fn extract_heuristic(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        let unit = CUnit::new(file, true);
        let top = unit.top_level(|header| NAMESPACE_BLOCK.is_match(header) || EXTERN_C.is_match(header));
        let namespaces = NAMESPACES
            .captures_iter(&top)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string())
            .collect();
        let items = locate(&top, true);
        Ok(build(&unit, unit.directives(), namespaces, items))
    }
}

static NAMESPACE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnamespace(?:\s+[A-Za-z_][\w:]*)?\s*$").unwrap());
// Namespace blocks read as `namespace X ;` once their braces are flattened.
static NAMESPACES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bnamespace\s+([A-Za-z_][\w:]*)\s*;|\busing\s+namespace\s+([A-Za-z_][\w:]*)").unwrap()
});
static CLASS_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:class|struct)\s+([A-Za-z_]\w*)(?:\s*<[^:{]*>)?(?:\s+final)?\s*(?::([^{]*))?$").unwrap()
});
static ACCESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:public|private|protected)\s*:").unwrap());

const SPECIFIERS: &[&str] = &["public", "private", "protected", "virtual"];
const NOT_METHODS: &[&str] = &["using", "friend", "typedef", "static_assert"];

pub(super) fn is_class_header(header: &str) -> bool {
    CLASS_HEAD.is_match(strip_template_prefix(header).0)
}

fn class_symbol(unit: &CUnit<'_>, header: (usize, usize), body: (usize, usize)) -> Option<TypeSymbol> {
    let text = unit.code.get(header.0..header.1)?;
    let (rest, template) = strip_template_prefix(text);
    let caps = CLASS_HEAD.captures(rest)?;
    let name = caps.get(1)?;
    let name_at = header.0 + (text.len() - rest.len()) + name.start();

    let bases = caps
        .get(2)
        .map(|clause| {
            split_top_level(clause.as_str(), true)
                .into_iter()
                .map(|(s, e)| {
                    clause.as_str()[s..e]
                        .split_whitespace()
                        .filter(|w| !SPECIFIERS.contains(w))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .map(|b| collapse_ws(&b))
                .filter(|b| !b.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let view = ACCESS
        .replace_all(&unit.body_view(body), |m: &regex::Captures<'_>| " ".repeat(m[0].len()))
        .into_owned();
    let base = body.0 + 1;
    let mut methods = Vec::new();
    for stmt in statements(&view, |h| is_function_header(h, true)) {
        let head_end = stmt.block.map(|(open, _)| open).unwrap_or(stmt.end);
        let head = &view[stmt.start..head_end];
        let first_word = head.split_whitespace().next().unwrap_or("");
        if NOT_METHODS.contains(&first_word) || !is_function_header(head, true) {
            continue;
        }
        let range = (base + stmt.start, base + head_end);
        if let Some(h) = unit.fn_header(range).filter(|h| !h.is_qualified()) {
            methods.push(unit.function(range, &h));
        }
    }

    let mut ty = TypeSymbol::new(
        name.as_str(),
        unit.lines.line_of(name_at),
        TypeDetail::CppClass {
            members: members_of(&view, true),
            is_template: template.is_some(),
            template_params: template.map(template_param_names).unwrap_or_default(),
        },
    );
    ty.bases = bases;
    ty.methods = methods;
    Some(ty)
}

fn build(unit: &CUnit<'_>, directives: Directives, namespaces: Vec<String>, items: Vec<Item>) -> FileRecord {
    let mut record = RecordBuilder::new(unit.file);
    for include in &directives.includes {
        record.include(include);
        record.import(include);
    }
    for define in &directives.defines {
        record.define(define);
    }
    for ns in &namespaces {
        record.declared_namespace(ns);
    }
    for item in items {
        match item {
            Item::Function { header } => {
                if let Some(h) = unit.fn_header(header).filter(|h| !h.is_qualified()) {
                    record.function(unit.function(header, &h));
                }
            }
            Item::Class { header, body } => {
                if let Some(ty) = class_symbol(unit, header, body) {
                    record.type_symbol(ty);
                }
            }
            Item::Struct {
                header,
                body,
                trailer,
                typedef,
            } => {
                if let Some(ty) = unit.struct_symbol(header, body, trailer, typedef) {
                    record.type_symbol(ty);
                }
            }
            Item::Declaration { .. } => {}
        }
    }
    record.finish()
}

#[cfg(feature = "tree-sitter")]
mod grammar {
    use tree_sitter::Node;

    use super::{Item, NAMESPACES};
    use crate::indexer::parser::c::grammar::item;
    use crate::indexer::parser::tree::{get_node_text, named_children};

    const CONDITIONALS: &[&str] = &[
        "preproc_ifdef",
        "preproc_if",
        "preproc_else",
        "preproc_elif",
        "preproc_elifdef",
    ];
    const TEMPLATED: &[&str] = &[
        "function_definition",
        "class_specifier",
        "struct_specifier",
        "union_specifier",
        "declaration",
    ];

    pub fn locate(node: Node<'_>, content: &str, items: &mut Vec<Item>, namespaces: &mut Vec<String>) {
        for child in named_children(node) {
            match child.kind() {
                kind if CONDITIONALS.contains(&kind) => locate(child, content, items, namespaces),
                "namespace_definition" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        namespaces.push(get_node_text(name, content).to_string());
                    }
                    if let Some(body) = child.child_by_field_name("body") {
                        locate(body, content, items, namespaces);
                    }
                }
                "linkage_specification" => {
                    if let Some(body) = child.child_by_field_name("body") {
                        if body.kind() == "declaration_list" {
                            locate(body, content, items, namespaces);
                        } else {
                            items.extend(item(body, body.start_byte(), true));
                        }
                    }
                }
                "using_declaration" => {
                    if let Some(m) = NAMESPACES
                        .captures(get_node_text(child, content))
                        .and_then(|c| c.get(2))
                    {
                        namespaces.push(m.as_str().to_string());
                    }
                }
                "template_declaration" => {
                    let inner = named_children(child)
                        .into_iter()
                        .find(|n| TEMPLATED.contains(&n.kind()));
                    if let Some(inner) = inner {
                        items.extend(item(inner, child.start_byte(), true));
                    }
                }
                _ => items.extend(item(child, child.start_byte(), true)),
            }
        }
    }
}
