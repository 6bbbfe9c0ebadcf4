// Python extractor

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    clean_docstring, collapse_ws, decorator_name, mask, matching_close, python_param,
    python_string_value, split_params, LineIndex, RecordBuilder, Syntax,
};
use crate::index::{Extractor, FileRecord, FunctionSymbol, SourceFile, TypeDetail, TypeSymbol};

pub struct PythonExtractor;

impl PythonExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for PythonExtractor {
    fn name(&self) -> &'static str {
        "python"
    }

    #[cfg(feature = "tree-sitter")]
    fn extract_grammar(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        grammar::extract(file)
    }

    fn extract_heuristic(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        Ok(heuristic(file))
    }
}

fn docstring_of(literal: &str) -> Option<String> {
    python_string_value(literal).and_then(clean_docstring)
}

fn import_name(raw: &str) -> String {
    let head = raw.split(" as ").next().unwrap_or(raw);
    head.split_whitespace().collect()
}

fn from_import(module: &str, names: &[String]) -> String {
    let module = module.trim_start_matches('.');
    if module.is_empty() {
        names.join(",")
    } else {
        format!("{}.{}", module, names.join(","))
    }
}

fn is_keyword_argument(piece: &str) -> bool {
    piece.starts_with('*') || piece.contains('=')
}

/// A statement spanning one or more physical lines.
#[derive(Debug, Clone, Copy)]
struct Logical {
    start: usize,
    end: usize,
    indent: usize,
}

fn logical_lines(code: &str) -> Vec<Logical> {
    let mut out = Vec::new();
    let mut current: Option<Logical> = None;
    let mut depth = 0i32;
    let mut triple: Option<u8> = None;
    let mut offset = 0;

    for line in code.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let line_start = offset;
        offset += line.len();

        if current.is_none() {
            if body.trim().is_empty() {
                continue;
            }
            let indent = body.len() - body.trim_start().len();
            current = Some(Logical {
                start: line_start + indent,
                end: line_start + body.len(),
                indent,
            });
        } else if let Some(cur) = current.as_mut() {
            cur.end = line_start + body.len();
        }

        let bytes = body.as_bytes();
        let mut k = 0;
        while k < bytes.len() {
            let ch = bytes[k];
            if (ch == b'"' || ch == b'\'') && bytes[k..].starts_with(&[ch, ch, ch]) {
                triple = match triple {
                    None => Some(ch),
                    Some(q) if q == ch => None,
                    open => open,
                };
                k += 3;
                continue;
            }
            if triple.is_none() {
                match ch {
                    b'(' | b'[' | b'{' => depth += 1,
                    b')' | b']' | b'}' => depth = (depth - 1).max(0),
                    _ => {}
                }
            }
            k += 1;
        }
        let continued = triple.is_some() || depth > 0 || body.trim_end().ends_with('\\');
        if !continued {
            if let Some(done) = current.take() {
                out.push(done);
            }
        }
    }
    if let Some(done) = current {
        out.push(done);
    }
    out
}

static DEF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap());
static CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^class\s+([A-Za-z_]\w*)\s*(\()?").unwrap());
static ASSIGN_TARGET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)\s*=").unwrap());

struct Source<'s> {
    /// Comment-free text.
    text: &'s str,
    /// Comment- and string-free text.
    code: &'s str,
    lines: LineIndex,
}

impl<'s> Source<'s> {
    fn raw(&self, l: &Logical) -> &'s str {
        let code = self.code[l.start..l.end].trim_end();
        &self.text[l.start..l.start + code.len()]
    }

    fn code(&self, l: &Logical) -> &'s str {
        self.code[l.start..l.end].trim_end()
    }

    fn string_statement(&self, l: &Logical) -> Option<String> {
        let code = self.code(l);
        let rest = code.trim_start_matches(|c: char| "rRuUbBfF".contains(c));
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let inner = rest.trim_matches(quote);
        if !inner.trim().is_empty() {
            return None;
        }
        docstring_of(self.raw(l))
    }

    fn function(&self, l: &Logical, decorators: Vec<String>, next: Option<&Logical>) -> Option<FunctionSymbol> {
        let code = self.code(l);
        let caps = DEF.captures(code)?;
        let name = caps.get(1)?;
        let open = caps.get(0)?.end() - 1;
        let close = matching_close(code, open)?;

        let raw = self.raw(l);
        let args = split_params(&raw[open + 1..close], &code[open + 1..close], false)
            .into_iter()
            .filter_map(python_param)
            .collect();

        let after = code[close + 1..].trim_start();
        let return_type = after.strip_prefix("->").and_then(|_| {
            let arrow = close + 1 + (code[close + 1..].len() - after.len()) + 2;
            let mut depth = 0i32;
            let end = code[arrow..].char_indices().find_map(|(i, ch)| {
                match ch {
                    '(' | '[' | '{' => depth += 1,
                    ')' | ']' | '}' => depth -= 1,
                    ':' if depth == 0 => return Some(arrow + i),
                    _ => {}
                }
                None
            })?;
            let label = collapse_ws(&raw[arrow..end]);
            (!label.is_empty()).then_some(label)
        });

        let docstring = next
            .filter(|n| n.indent > l.indent)
            .and_then(|n| self.string_statement(n));

        Some(FunctionSymbol {
            name: name.as_str().to_string(),
            args,
            docstring,
            return_type,
            decorators,
            line: self.lines.line_of(l.start + name.start()),
        })
    }
}

fn heuristic(file: &SourceFile<'_>) -> FileRecord {
    let masked = mask(file.text, Syntax::Python);
    let src = Source {
        text: &masked.text,
        code: &masked.code,
        lines: LineIndex::new(file.text),
    };
    let logical = logical_lines(&masked.code);
    let mut record = RecordBuilder::new(file);

    if let Some(first) = logical.first() {
        record.docstring(src.string_statement(first));
    }

    for l in &logical {
        let code = src.code(l);
        if code.starts_with("import ") || code.starts_with("from ") {
            let raw = src.raw(l).replace(['\\', '\n', '\r'], " ");
            heuristic_import(&raw, &mut record);
        }
    }

    let mut decorators: Vec<String> = Vec::new();
    let mut i = 0;
    while i < logical.len() {
        let l = &logical[i];
        if l.indent != 0 {
            i += 1;
            continue;
        }
        let code = src.code(l);
        if code.starts_with('@') {
            decorators.push(decorator_name(src.raw(l)));
            i += 1;
            continue;
        }

        if DEF.is_match(code) {
            if let Some(f) = src.function(l, std::mem::take(&mut decorators), logical.get(i + 1)) {
                record.function(f);
            }
        } else if let Some(caps) = CLASS.captures(code) {
            let body_end = logical[i + 1..]
                .iter()
                .position(|n| n.indent == 0)
                .map(|p| i + 1 + p)
                .unwrap_or(logical.len());
            if let Some(ty) = heuristic_class(&src, &logical, i, body_end, &caps) {
                record.type_symbol(ty);
            }
            decorators.clear();
            i = body_end;
            continue;
        } else {
            let mut rest = code;
            while let Some(caps) = ASSIGN_TARGET.captures(rest) {
                let end = caps.get(0).map(|m| m.end()).unwrap_or(rest.len());
                if rest[end..].starts_with('=') {
                    break;
                }
                record.variable(&caps[1]);
                rest = rest[end..].trim_start();
            }
        }
        decorators.clear();
        i += 1;
    }

    record.finish()
}

fn heuristic_import(raw: &str, record: &mut RecordBuilder<'_>) {
    if let Some(rest) = raw.strip_prefix("import ") {
        for piece in rest.split(',') {
            record.import(&import_name(piece));
        }
        return;
    }
    let Some(rest) = raw.strip_prefix("from ") else {
        return;
    };
    let Some((module, names)) = rest.split_once(" import ") else {
        return;
    };
    let names: Vec<String> = names
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(import_name)
        .filter(|n| !n.is_empty())
        .collect();
    if !names.is_empty() {
        record.import(&from_import(&import_name(module), &names));
    }
}

fn heuristic_class(
    src: &Source<'_>,
    logical: &[Logical],
    at: usize,
    body_end: usize,
    caps: &regex::Captures<'_>,
) -> Option<TypeSymbol> {
    let l = &logical[at];
    let name = caps.get(1)?;
    let mut ty = TypeSymbol::new(
        name.as_str(),
        src.lines.line_of(l.start + name.start()),
        TypeDetail::Class,
    );

    if let Some(paren) = caps.get(2) {
        let code = src.code(l);
        let raw = src.raw(l);
        let open = paren.start();
        if let Some(close) = matching_close(code, open) {
            ty.bases = split_params(&raw[open + 1..close], &code[open + 1..close], false)
                .into_iter()
                .filter(|p| !is_keyword_argument(p))
                .map(collapse_ws)
                .collect();
        }
    }

    let body = &logical[at + 1..body_end];
    ty.docstring = body.first().and_then(|n| src.string_statement(n));

    let Some(member_indent) = body.first().map(|n| n.indent) else {
        return Some(ty);
    };
    let mut decorators = Vec::new();
    for (k, m) in body.iter().enumerate() {
        if m.indent != member_indent {
            continue;
        }
        let code = src.code(m);
        if code.starts_with('@') {
            decorators.push(decorator_name(src.raw(m)));
            continue;
        }
        if DEF.is_match(code) {
            if let Some(f) = src.function(m, std::mem::take(&mut decorators), body.get(k + 1)) {
                ty.methods.push(f);
            }
        }
        decorators.clear();
    }
    Some(ty)
}

#[cfg(feature = "tree-sitter")]
mod grammar {
    use tree_sitter::Node;

    use super::*;
    use crate::indexer::parser::tree::{get_node_text, line, named_children, parse, walk_tree};

    fn statements(node: Node<'_>) -> Vec<Node<'_>> {
        named_children(node)
            .into_iter()
            .filter(|n| n.kind() != "comment")
            .collect()
    }

    fn docstring(block: Option<Node<'_>>, content: &str) -> Option<String> {
        let first = statements(block?).into_iter().next()?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let literal = named_children(first).into_iter().next()?;
        if literal.kind() != "string" {
            return None;
        }
        docstring_of(get_node_text(literal, content))
    }

    pub(super) fn extract(file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        let content = file.text;
        let tree = parse(&tree_sitter_python::LANGUAGE.into(), content, "Python")?;
        let root = tree.root_node();
        let mut record = RecordBuilder::new(file);

        record.docstring(docstring(Some(root), content));

        walk_tree(root, &mut |node| match node.kind() {
            "import_statement" => {
                for child in named_children(node) {
                    if let Some(name) = imported_name(child, content) {
                        record.import(&name);
                    }
                }
            }
            "import_from_statement" | "future_import_statement" => {
                let module = node
                    .child_by_field_name("module_name")
                    .map(|m| import_name(get_node_text(m, content)))
                    .unwrap_or_else(|| "__future__".to_string());
                let module_id = node.child_by_field_name("module_name").map(|m| m.id());
                let names: Vec<String> = named_children(node)
                    .into_iter()
                    .filter(|c| Some(c.id()) != module_id)
                    .filter_map(|c| match c.kind() {
                        "wildcard_import" => Some("*".to_string()),
                        _ => imported_name(c, content),
                    })
                    .collect();
                if !names.is_empty() {
                    record.import(&from_import(&module, &names));
                }
            }
            _ => {}
        });

        for node in statements(root) {
            match node.kind() {
                "function_definition" => {
                    if let Some(f) = function(node, Vec::new(), content) {
                        record.function(f);
                    }
                }
                "class_definition" => {
                    if let Some(c) = class(node, content) {
                        record.type_symbol(c);
                    }
                }
                "decorated_definition" => {
                    let decorators = decorators(node, content);
                    match node.child_by_field_name("definition") {
                        Some(def) if def.kind() == "function_definition" => {
                            if let Some(f) = function(def, decorators, content) {
                                record.function(f);
                            }
                        }
                        Some(def) if def.kind() == "class_definition" => {
                            if let Some(c) = class(def, content) {
                                record.type_symbol(c);
                            }
                        }
                        _ => {}
                    }
                }
                "expression_statement" => {
                    for child in named_children(node) {
                        let mut assignment = Some(child);
                        while let Some(a) = assignment.filter(|a| a.kind() == "assignment") {
                            if a.child_by_field_name("type").is_some() {
                                break;
                            }
                            match a.child_by_field_name("left") {
                                Some(left) if left.kind() == "identifier" => {
                                    record.variable(get_node_text(left, content));
                                }
                                _ => break,
                            }
                            assignment = a.child_by_field_name("right");
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(record.finish())
    }

    fn imported_name(node: Node<'_>, content: &str) -> Option<String> {
        match node.kind() {
            "dotted_name" => Some(import_name(get_node_text(node, content))),
            "aliased_import" => node
                .child_by_field_name("name")
                .map(|n| import_name(get_node_text(n, content))),
            _ => None,
        }
    }

    fn decorators(node: Node<'_>, content: &str) -> Vec<String> {
        named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "decorator")
            .map(|c| decorator_name(get_node_text(c, content)))
            .collect()
    }

    fn function(node: Node<'_>, decorators: Vec<String>, content: &str) -> Option<FunctionSymbol> {
        let name = node.child_by_field_name("name")?;
        let args = node
            .child_by_field_name("parameters")
            .map(|params| {
                named_children(params)
                    .into_iter()
                    .filter(|p| p.kind() != "comment")
                    .filter_map(|p| python_param(get_node_text(p, content)))
                    .collect()
            })
            .unwrap_or_default();
        let return_type = node
            .child_by_field_name("return_type")
            .map(|t| collapse_ws(get_node_text(t, content)))
            .filter(|t| !t.is_empty());

        Some(FunctionSymbol {
            name: get_node_text(name, content).to_string(),
            args,
            docstring: docstring(node.child_by_field_name("body"), content),
            return_type,
            decorators,
            line: line(name),
        })
    }

    fn class(node: Node<'_>, content: &str) -> Option<TypeSymbol> {
        let name = node.child_by_field_name("name")?;
        let mut ty = TypeSymbol::new(get_node_text(name, content), line(name), TypeDetail::Class);

        if let Some(bases) = node.child_by_field_name("superclasses") {
            ty.bases = named_children(bases)
                .into_iter()
                .filter(|b| {
                    !matches!(
                        b.kind(),
                        "keyword_argument" | "list_splat" | "dictionary_splat" | "comment"
                    )
                })
                .map(|b| collapse_ws(get_node_text(b, content)))
                .collect();
        }

        let body = node.child_by_field_name("body");
        ty.docstring = docstring(body, content);
        if let Some(body) = body {
            for member in statements(body) {
                let (def, decorators) = match member.kind() {
                    "function_definition" => (member, Vec::new()),
                    "decorated_definition" => match member.child_by_field_name("definition") {
                        Some(def) if def.kind() == "function_definition" => {
                            (def, decorators(member, content))
                        }
                        _ => continue,
                    },
                    _ => continue,
                };
                if let Some(f) = function(def, decorators, content) {
                    ty.methods.push(f);
                }
            }
        }
        Some(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionLimits;

    const SAMPLE: &str = r#""""Order processing helpers."""
import os, sys as system
from typing import Dict, List as L
from . import sibling
from ..core.models import (
    Order,
    Invoice,
)

MAX_ITEMS = 10
a = b = "x"
count: int = 3

@cache
@app.route("/orders")
def load(path: str, *args, retries=3, **kwargs) -> Dict[str, int]:
    """Load orders.

    Reads from disk.
    """
    def helper():
        pass
    return {}

async def fetch(url):
    import json
    return url

class Order(Base, Mixin, metaclass=Meta):
    """An order."""

    @property
    def total(self):
        return 0

    def add(self, item: str = "a,b") -> None:
        pass

if __name__ == "__main__":
    def hidden():
        pass
"#;

    fn file<'a>(text: &'a str, limits: &'a ExtractionLimits) -> SourceFile<'a> {
        SourceFile {
            path: "orders.py",
            language: "python",
            text,
            limits,
        }
    }

    fn check(rec: &FileRecord) {
        assert_eq!(rec.docstring.as_deref(), Some("Order processing helpers."));
        assert_eq!(
            rec.imports,
            vec![
                "os",
                "sys",
                "typing.Dict,List",
                "sibling",
                "core.models.Order,Invoice",
                "json"
            ]
        );
        let names: Vec<&str> = rec.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["load", "fetch"]);

        let load = &rec.functions[0];
        assert_eq!(load.args, vec!["path", "*args", "retries", "**kwargs"]);
        assert_eq!(load.return_type.as_deref(), Some("Dict[str, int]"));
        assert_eq!(load.decorators, vec!["cache", "app.route"]);
        assert_eq!(load.docstring.as_deref(), Some("Load orders.\n\nReads from disk."));
        assert_eq!(load.line, 16);

        assert_eq!(rec.types.len(), 1);
        let order = &rec.types[0];
        assert_eq!(order.name, "Order");
        assert_eq!(order.bases, vec!["Base", "Mixin"]);
        assert_eq!(order.docstring.as_deref(), Some("An order."));
        let methods: Vec<&str> = order.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["total", "add"]);
        assert_eq!(order.methods[0].decorators, vec!["property"]);
        assert_eq!(order.methods[1].args, vec!["self", "item"]);

        assert_eq!(rec.variables, vec!["MAX_ITEMS", "a", "b"]);
    }

    #[test]
    fn test_heuristic_extraction() {
        let limits = ExtractionLimits::default();
        let rec = PythonExtractor::new().extract_heuristic(&file(SAMPLE, &limits)).unwrap();
        check(&rec);
    }

    #[cfg(feature = "tree-sitter")]
    #[test]
    fn test_grammar_extraction() {
        let limits = ExtractionLimits::default();
        let rec = PythonExtractor::new().extract_grammar(&file(SAMPLE, &limits)).unwrap();
        check(&rec);
    }

    #[test]
    fn test_nested_function_is_not_top_level() {
        let src = "def outer():\n    def inner():\n        return 1\n    return inner\n";
        let limits = ExtractionLimits::default();
        let ex = PythonExtractor::new();
        let rec = ex.extract_heuristic(&file(src, &limits)).unwrap();
        assert_eq!(rec.functions.len(), 1);
        assert_eq!(rec.functions[0].name, "outer");

        #[cfg(feature = "tree-sitter")]
        {
            let rec = ex.extract_grammar(&file(src, &limits)).unwrap();
            assert_eq!(rec.functions.len(), 1);
            assert_eq!(rec.functions[0].name, "outer");
        }
    }

    #[test]
    fn test_logical_lines_join_brackets() {
        let code = "x = (1,\n     2)\ny = 3\n";
        let lines = logical_lines(code);
        assert_eq!(lines.len(), 2);
        assert_eq!(&code[lines[0].start..lines[0].end], "x = (1,\n     2)");
    }
}
