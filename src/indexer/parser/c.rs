// C extractor and the C-family pieces shared with C++

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    blank_preprocessor, c_declarator_name, mask, parse_fn_header, split_params, split_top_level,
    statements, strip_template_prefix, top_level_view, type_label, FnHeader, LineIndex, Masked,
    RecordBuilder, Syntax,
};
use crate::index::{Extractor, FileRecord, FunctionSymbol, SourceFile, TypeDetail, TypeSymbol};

pub struct CExtractor;

impl CExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for CExtractor {
    fn name(&self) -> &'static str {
        "c"
    }

    #[cfg(feature = "tree-sitter")]
    fn extract_grammar(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        let unit = CUnit::new(file, false);
        let tree = super::tree::parse(&tree_sitter_c::LANGUAGE.into(), file.text, "C")?;
        let root = tree.root_node();
        let mut items = Vec::new();
        grammar::locate(root, &mut items);
        Ok(build(&unit, grammar::directives(root, file.text), items))
    }

    fn extract_heuristic(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        let unit = CUnit::new(file, false);
        let top = unit.top_level(|header| EXTERN_C.is_match(header));
        let items = locate(&top, false);
        Ok(build(&unit, unit.directives(), items))
    }
}

/// A top-level declaration located in a C-family file. Ranges are byte
/// offsets into the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Item {
    /// Header runs from the declaration start to the opening brace.
    Function { header: (usize, usize) },
    /// `body` holds the offsets of the braces; `trailer` is what follows
    /// the closing brace up to the end of the statement.
    Struct {
        header: (usize, usize),
        body: (usize, usize),
        trailer: (usize, usize),
        typedef: bool,
    },
    Class { header: (usize, usize), body: (usize, usize) },
    Declaration { range: (usize, usize) },
}

#[derive(Debug, Default)]
pub(super) struct Directives {
    pub includes: Vec<String>,
    pub defines: Vec<String>,
}

pub(super) static EXTERN_C: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bextern\s*"[^"]*"\s*$"#).unwrap());
static INCLUDE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?m)^[ \t]*#[ \t]*include\s*[<"]([^>"\n]+)[>"]"#).unwrap());
static DEFINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#[ \t]*define\s+(\w+)").unwrap());
pub(super) static STRUCT_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:typedef\s+)?(?:struct|union)\b[^=(]*$").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:struct|union)\s+([A-Za-z_]\w*)").unwrap());
static FIRST_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_]\w*").unwrap());
static FORWARD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:struct|union|class)\s+[A-Za-z_]\w*$").unwrap());
static FN_POINTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*[*&^]+\s*\w+\s*\)").unwrap());

const NOT_MEMBERS: &[&str] = &["using", "friend", "typedef", "template", "static_assert"];

/// A C or C++ translation unit prepared for both strategies.
pub(super) struct CUnit<'s> {
    pub file: &'s SourceFile<'s>,
    pub masked: Masked,
    /// Masked code with preprocessor lines blanked.
    pub code: String,
    pub lines: LineIndex,
    pub cpp: bool,
}

impl<'s> CUnit<'s> {
    pub fn new(file: &'s SourceFile<'s>, cpp: bool) -> Self {
        let masked = mask(file.text, Syntax::CLike);
        let code = blank_preprocessor(&masked.code);
        Self {
            file,
            masked,
            code,
            lines: LineIndex::new(file.text),
            cpp,
        }
    }

    pub fn top_level(&self, transparent: impl Fn(&str) -> bool) -> String {
        top_level_view(&self.code, transparent)
    }

    pub fn directives(&self) -> Directives {
        Directives {
            includes: INCLUDE
                .captures_iter(&self.masked.text)
                .map(|c| c[1].to_string())
                .collect(),
            defines: DEFINE
                .captures_iter(&self.masked.text)
                .map(|c| c[1].to_string())
                .collect(),
        }
    }

    fn code_at(&self, range: (usize, usize)) -> &str {
        self.code.get(range.0..range.1).unwrap_or("")
    }

    /// Parses a function header found at `range`. The returned header
    /// carries absolute offsets.
    pub fn fn_header(&self, range: (usize, usize)) -> Option<FnHeader> {
        let header = self.code_at(range);
        let (rest, _) = if self.cpp {
            strip_template_prefix(header)
        } else {
            (header, None)
        };
        let base = range.0 + header.len() - rest.len();
        let parsed = parse_fn_header(rest)?;
        Some(FnHeader {
            name: parsed.name,
            name_at: base + parsed.name_at,
            params: (base + parsed.params.0, base + parsed.params.1),
            after_params: base + parsed.after_params,
        })
    }

    pub fn function(&self, range: (usize, usize), header: &FnHeader) -> FunctionSymbol {
        let (s, e) = header.params;
        let args = match (self.masked.text.get(s..e), self.code.get(s..e)) {
            (Some(raw), Some(code)) => split_params(raw, code, self.cpp)
                .into_iter()
                .filter_map(c_declarator_name)
                .collect(),
            _ => Vec::new(),
        };
        let prefix = self.code_at((range.0, header.name_at));
        let prefix = if self.cpp {
            strip_template_prefix(prefix).0
        } else {
            prefix
        };
        FunctionSymbol {
            name: header.name.clone(),
            args,
            return_type: type_label(prefix),
            line: self.lines.line_of(header.name_at),
            ..Default::default()
        }
    }

    pub fn struct_symbol(
        &self,
        header: (usize, usize),
        body: (usize, usize),
        trailer: (usize, usize),
        typedef: bool,
    ) -> Option<TypeSymbol> {
        let tag = TAG
            .captures(self.code_at(header))
            .and_then(|c| c.get(1))
            .map(|m| (m.as_str().to_string(), header.0 + m.start()));
        let alias = FIRST_IDENT
            .find(self.code_at(trailer))
            .map(|m| (m.as_str().to_string(), trailer.0 + m.start()));
        let (name, at) = tag.or(alias)?;
        let members = members_of(&self.body_view(body), self.cpp);
        Some(TypeSymbol::new(
            name,
            self.lines.line_of(at),
            TypeDetail::Struct {
                members,
                is_typedef: typedef,
            },
        ))
    }

    /// The interior of the block `body` with nested blocks blanked.
    pub fn body_view(&self, body: (usize, usize)) -> String {
        top_level_view(self.code_at((body.0 + 1, body.1)), |_| false)
    }

    /// Names declared by a non-function top-level declaration.
    pub fn declaration_variables(&self, range: (usize, usize)) -> Vec<String> {
        let stmt = self.code_at(range).trim().trim_end_matches(';').trim();
        let first_word = stmt.split_whitespace().next().unwrap_or("");
        if matches!(first_word, "typedef" | "using" | "namespace" | "template" | "enum" | "class")
            || stmt.starts_with("static_assert")
            || FORWARD.is_match(stmt)
        {
            return Vec::new();
        }
        if let Some(open) = stmt.find('{') {
            if !stmt[..open].contains('=') {
                return Vec::new();
            }
        }
        let declarator = stmt.split('=').next().unwrap_or("");
        if declarator.contains('(') && !FN_POINTER.is_match(declarator) {
            return Vec::new();
        }

        let parts = split_top_level(stmt, self.cpp);
        let Some(&(s, e)) = parts.first() else {
            return Vec::new();
        };
        let head = stmt[s..e].split('=').next().unwrap_or("");
        if head.split_whitespace().count() < 2 && !head.contains('*') {
            return Vec::new();
        }
        parts
            .iter()
            .filter_map(|&(s, e)| c_declarator_name(&stmt[s..e]))
            .collect()
    }
}

pub(super) fn is_function_header(header: &str, cpp: bool) -> bool {
    let header = if cpp {
        strip_template_prefix(header).0
    } else {
        header
    };
    !STRUCT_HEAD.is_match(header) && parse_fn_header(header).is_some()
}

/// Data member names in a struct or class body view.
pub(super) fn members_of(view: &str, angle: bool) -> Vec<String> {
    let mut members = Vec::new();
    for piece in view.split(';') {
        let piece = piece.rsplit('}').next().unwrap_or("").trim();
        let first_word = piece.split_whitespace().next().unwrap_or("");
        if piece.is_empty() || NOT_MEMBERS.contains(&first_word) {
            continue;
        }
        if piece.contains('(') && !FN_POINTER.is_match(piece) {
            continue;
        }
        members.extend(
            split_top_level(piece, angle)
                .into_iter()
                .filter_map(|(s, e)| c_declarator_name(&piece[s..e])),
        );
    }
    members
}

/// Locates items on a top-level view.
pub(super) fn locate(top: &str, cpp: bool) -> Vec<Item> {
    let mut items = Vec::new();
    for stmt in statements(top, |header| is_function_header(header, cpp)) {
        let head_end = stmt.block.map(|(open, _)| open).unwrap_or(stmt.end);
        let header = &top[stmt.start..head_end];
        let Some((open, close)) = stmt.block else {
            items.push(Item::Declaration {
                range: (stmt.start, stmt.end),
            });
            continue;
        };
        let item = if is_function_header(header, cpp) {
            Item::Function {
                header: (stmt.start, open),
            }
        } else if cpp && super::cpp::is_class_header(header) {
            Item::Class {
                header: (stmt.start, open),
                body: (open, close),
            }
        } else if STRUCT_HEAD.is_match(header) {
            Item::Struct {
                header: (stmt.start, open),
                body: (open, close),
                trailer: (close + 1, stmt.end),
                typedef: header.trim_start().starts_with("typedef"),
            }
        } else {
            Item::Declaration {
                range: (stmt.start, stmt.end),
            }
        };
        items.push(item);
    }
    items
}

fn build(unit: &CUnit<'_>, directives: Directives, items: Vec<Item>) -> FileRecord {
    let mut record = RecordBuilder::new(unit.file);
    for include in &directives.includes {
        record.include(include);
        record.import(include);
    }
    for define in &directives.defines {
        record.define(define);
    }
    for item in items {
        match item {
            Item::Function { header } => {
                if let Some(h) = unit.fn_header(header) {
                    record.function(unit.function(header, &h));
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
            Item::Declaration { range } => {
                for name in unit.declaration_variables(range) {
                    record.variable(&name);
                }
            }
            Item::Class { .. } => {}
        }
    }
    record.finish()
}

#[cfg(feature = "tree-sitter")]
pub(super) mod grammar {
    use tree_sitter::Node;

    use super::{Directives, Item};
    use crate::indexer::parser::tree::{get_node_text, named_children, walk_tree};

    const CONDITIONALS: &[&str] = &[
        "preproc_ifdef",
        "preproc_if",
        "preproc_else",
        "preproc_elif",
        "preproc_elifdef",
    ];

    pub fn directives(root: Node<'_>, content: &str) -> Directives {
        let mut found = Directives::default();
        walk_tree(root, &mut |node| match node.kind() {
            "preproc_include" => {
                if let Some(path) = node
                    .child_by_field_name("path")
                    .filter(|p| matches!(p.kind(), "string_literal" | "system_lib_string"))
                {
                    let text = get_node_text(path, content);
                    found
                        .includes
                        .push(text.trim_matches(|c| matches!(c, '<' | '>' | '"')).to_string());
                }
            }
            "preproc_def" | "preproc_function_def" => {
                if let Some(name) = node.child_by_field_name("name") {
                    found.defines.push(get_node_text(name, content).to_string());
                }
            }
            _ => {}
        });
        found
    }

    /// The block of a struct/union/class specifier, if it has one.
    pub fn specifier_body<'t>(node: Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            "struct_specifier" | "union_specifier" | "class_specifier" => node.child_by_field_name("body"),
            _ => None,
        }
    }

    fn braces(body: Node<'_>) -> (usize, usize) {
        (body.start_byte(), body.end_byte().saturating_sub(1))
    }

    /// Classifies one top-level node starting at `start`, which may lie
    /// before the node when a template clause precedes it.
    pub fn item(node: Node<'_>, start: usize, cpp: bool) -> Option<Item> {
        match node.kind() {
            "function_definition" => {
                let body = node.child_by_field_name("body")?;
                Some(Item::Function {
                    header: (start, body.start_byte()),
                })
            }
            "struct_specifier" | "union_specifier" | "class_specifier" => {
                aggregate(node, node, start, false, cpp)
            }
            "declaration" | "type_definition" => {
                let typedef = node.kind() == "type_definition";
                match node.child_by_field_name("type").filter(|t| specifier_body(*t).is_some()) {
                    Some(spec) => aggregate(spec, node, start, typedef, cpp),
                    None if typedef => None,
                    None => Some(Item::Declaration {
                        range: (start, node.end_byte()),
                    }),
                }
            }
            _ => None,
        }
    }

    fn aggregate(spec: Node<'_>, stmt: Node<'_>, start: usize, typedef: bool, cpp: bool) -> Option<Item> {
        let body = specifier_body(spec)?;
        let header = (start, body.start_byte());
        let as_class = cpp && !typedef && spec.kind() != "union_specifier" && spec.child_by_field_name("name").is_some();
        if as_class {
            return Some(Item::Class {
                header,
                body: braces(body),
            });
        }
        Some(Item::Struct {
            header,
            body: braces(body),
            trailer: (body.end_byte(), stmt.end_byte()),
            typedef,
        })
    }

    /// Top-level items of a C translation unit, looking through
    /// conditional compilation blocks.
    pub fn locate(node: Node<'_>, items: &mut Vec<Item>) {
        for child in named_children(node) {
            if CONDITIONALS.contains(&child.kind()) {
                locate(child, items);
            } else if let Some(item) = item(child, child.start_byte(), false) {
                items.push(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionLimits;

    const SAMPLE: &str = r#"#ifndef POINT_H
#define POINT_H
#include <stdio.h>
#include "vec.h"
#define MAX(a, b) ((a) > (b) ? (a) : (b))

/* struct commented { int x; }; */

typedef struct {
    int x, y;
    char name[16];
    void (*on_move)(int dx);
    struct { int r; } inner;
} Point;

struct node {
    struct node *next;
    unsigned flags : 3;
};

static int counter = 0;
const char *labels[] = {"a", "b"};
int area(const Point *p, int scale);

static const char *describe(const Point *p, size_t n)
{
    if (n > 0) {
        printf("{%d}", p->x);
    }
    return "ok";
}

int main(void) {
    return 0;
}
#endif
"#;

    fn check(rec: &FileRecord) {
        assert_eq!(rec.includes, vec!["stdio.h", "vec.h"]);
        assert_eq!(rec.imports, rec.includes);
        assert_eq!(rec.defines, vec!["POINT_H", "MAX"]);

        let names: Vec<&str> = rec.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["describe", "main"]);
        let describe = &rec.functions[0];
        assert_eq!(describe.args, vec!["p", "n"]);
        assert_eq!(describe.return_type.as_deref(), Some("const char*"));
        assert_eq!(describe.line, 25);
        assert!(rec.functions[1].args.is_empty());

        assert_eq!(rec.types.len(), 2);
        let point = &rec.types[0];
        assert_eq!(point.name, "Point");
        match &point.detail {
            TypeDetail::Struct { members, is_typedef } => {
                assert_eq!(members, &vec!["x", "y", "name", "on_move", "inner"]);
                assert!(*is_typedef);
            }
            other => panic!("unexpected detail {other:?}"),
        }
        let node = &rec.types[1];
        assert_eq!(node.name, "node");
        assert_eq!(node.line, 16);
        match &node.detail {
            TypeDetail::Struct { members, is_typedef } => {
                assert_eq!(members, &vec!["next", "flags"]);
                assert!(!*is_typedef);
            }
            other => panic!("unexpected detail {other:?}"),
        }

        assert_eq!(rec.variables, vec!["counter", "labels"]);
    }

    fn source<'a>(limits: &'a ExtractionLimits) -> SourceFile<'a> {
        SourceFile {
            path: "include/point.h",
            language: "c_header",
            text: SAMPLE,
            limits,
        }
    }

    #[test]
    fn test_heuristic_extraction() {
        let limits = ExtractionLimits::default();
        check(&CExtractor::new().extract_heuristic(&source(&limits)).unwrap());
    }

    #[cfg(feature = "tree-sitter")]
    #[test]
    fn test_grammar_extraction() {
        let limits = ExtractionLimits::default();
        check(&CExtractor::new().extract_grammar(&source(&limits)).unwrap());
    }

    #[test]
    fn test_stray_multibyte_char_keeps_functions() {
        let limits = ExtractionLimits::default();
        let file = SourceFile {
            path: "src/ops.c",
            language: "c",
            text: "int ×add(int a) { return a; }\nint sub(int b) { return b; }\n",
            limits: &limits,
        };
        let rec = CExtractor::new().extract_heuristic(&file).unwrap();
        let names: Vec<&str> = rec.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["add", "sub"]);
    }

    #[test]
    fn test_members_of() {
        let view = " int a; double b[4], *c; int (*cb)(void); int method(int x); ";
        assert_eq!(members_of(view, false), vec!["a", "b", "c", "cb"]);
    }
}
