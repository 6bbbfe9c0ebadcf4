// PHP extractor

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    collapse_ws, mask, matching_close, php_param, split_params, statements, top_level_view,
    LineIndex, Masked, RecordBuilder, Syntax,
};
use crate::index::{Extractor, FileRecord, FunctionSymbol, SourceFile, TypeDetail, TypeSymbol};

pub struct PhpExtractor;

impl PhpExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for PhpExtractor {
    fn name(&self) -> &'static str {
        "php"
    }

    #[cfg(feature = "tree-sitter")]
    fn extract_grammar(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        grammar::extract(file)
    }

    fn extract_heuristic(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        Ok(heuristic(file))
    }
}

struct FnSpan {
    name: String,
    name_at: usize,
    params: (usize, usize),
    return_type: Option<String>,
}

struct ClassSpan {
    name: String,
    name_at: usize,
    /// Text between the class name and its body.
    header: (usize, usize),
    methods: Vec<FnSpan>,
    properties: Vec<String>,
}

/// Declarations located by either strategy, in source order.
#[derive(Default)]
struct Located {
    namespaces: Vec<(usize, String)>,
    uses: Vec<String>,
    requires: Vec<String>,
    functions: Vec<FnSpan>,
    classes: Vec<ClassSpan>,
}

static VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(\w+)").unwrap());
static EXTENDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bextends\s+([\w\\]+)").unwrap());
static IMPLEMENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bimplements\s+([\w\\\s,]+)").unwrap());

fn annotation(raw: &str) -> Option<String> {
    let label = collapse_ws(raw.trim().trim_start_matches(':'));
    (!label.is_empty()).then_some(label)
}

/// Targets of a `use` statement body, with aliases dropped and group
/// syntax expanded.
fn use_targets(body: &str) -> Vec<String> {
    let body = collapse_ws(body);
    let body = body
        .strip_prefix("function ")
        .or_else(|| body.strip_prefix("const "))
        .unwrap_or(&body);
    let unaliased = |item: &str| {
        let name = item.split(" as ").next().unwrap_or("").trim().trim_start_matches('\\');
        (!name.is_empty()).then(|| name.to_string())
    };
    match (body.find('{'), body.rfind('}')) {
        (Some(open), Some(close)) if open < close => {
            let prefix = body[..open].trim().trim_start_matches('\\');
            body[open + 1..close]
                .split(',')
                .filter_map(unaliased)
                .map(|item| format!("{prefix}{item}"))
                .collect()
        }
        _ => body.split(',').filter_map(unaliased).collect(),
    }
}

fn properties_of(declaration: &str) -> Vec<String> {
    VAR.captures_iter(declaration).map(|c| c[1].to_string()).collect()
}

struct Context<'s> {
    file: &'s SourceFile<'s>,
    masked: Masked,
    lines: LineIndex,
}

impl<'s> Context<'s> {
    fn new(file: &'s SourceFile<'s>) -> Self {
        Self {
            file,
            masked: mask(file.text, Syntax::Php),
            lines: LineIndex::new(file.text),
        }
    }

    fn function(&self, span: &FnSpan) -> FunctionSymbol {
        let (s, e) = span.params;
        let args = match (self.masked.text.get(s..e), self.masked.code.get(s..e)) {
            (Some(raw), Some(code)) => split_params(raw, code, false)
                .into_iter()
                .filter_map(php_param)
                .collect(),
            _ => Vec::new(),
        };
        FunctionSymbol {
            name: span.name.clone(),
            args,
            return_type: span.return_type.clone(),
            line: self.lines.line_of(span.name_at),
            ..Default::default()
        }
    }

    fn build(&self, located: Located) -> FileRecord {
        let mut record = RecordBuilder::new(self.file);
        if let Some((_, ns)) = located.namespaces.first() {
            record.namespace(ns);
        }
        for import in located.uses.iter().chain(&located.requires) {
            record.import(import);
        }
        for span in &located.functions {
            record.function(self.function(span));
        }
        for class in located.classes {
            let namespace = located
                .namespaces
                .iter()
                .take_while(|(at, _)| *at < class.name_at)
                .last()
                .map(|(_, ns)| ns.clone());
            let header = self.masked.text.get(class.header.0..class.header.1).unwrap_or("");
            let implements = IMPLEMENTS
                .captures(header)
                .map(|c| {
                    c[1].split(',')
                        .map(|i| i.trim().to_string())
                        .filter(|i| !i.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let mut ty = TypeSymbol::new(
                class.name,
                self.lines.line_of(class.name_at),
                TypeDetail::PhpClass {
                    namespace,
                    implements,
                    properties: class.properties,
                },
            );
            ty.bases = EXTENDS.captures(header).map(|c| c[1].to_string()).into_iter().collect();
            ty.methods = class.methods.iter().map(|m| self.function(m)).collect();
            record.type_symbol(ty);
        }
        record.finish()
    }
}

static NAMESPACE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnamespace(?:\s+[\w\\]+)?\s*$").unwrap());
static NAMESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*namespace\s+([A-Za-z_\\][\w\\]*)").unwrap());
static USE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*use\s+([^;]+);").unwrap());
static REQUIRE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:require|include)(?:_once)?\s*\(?\s*['"]([^'"\n]+)['"]"#).unwrap()
});
static FUNCTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*function\s+&?\s*([A-Za-z_]\w*)\s*\(").unwrap());
static CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:(?:abstract|final|readonly)\s+)*class\s+([A-Za-z_]\w*)").unwrap()
});
static METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:(?:public|private|protected|static|abstract|final)\s+)*function\s+&?\s*([A-Za-z_]\w*)\s*\(").unwrap()
});
static PROPERTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:public|private|protected|var|static|readonly)\s+)+").unwrap()
});

/// Locates `name(` matches in `view` and reads their parameter lists and
/// return types. `base` is the offset of `view` in the file.
fn function_spans(re: &Regex, view: &str, text: &str, base: usize) -> Vec<FnSpan> {
    let mut spans = Vec::new();
    for caps in re.captures_iter(view) {
        let (Some(all), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let open = all.end() - 1;
        let Some(close) = matching_close(view, open) else {
            continue;
        };
        let rest = &view[close + 1..];
        let stop = rest.find(|c| c == '{' || c == ';').unwrap_or(rest.len());
        let between = text.get(close + 1..close + 1 + stop).unwrap_or("");
        let return_type = if between.trim_start().starts_with(':') {
            annotation(between)
        } else {
            None
        };
        spans.push(FnSpan {
            name: name.as_str().to_string(),
            name_at: base + name.start(),
            params: (base + open + 1, base + close),
            return_type,
        });
    }
    spans
}

fn heuristic(file: &SourceFile<'_>) -> FileRecord {
    let ctx = Context::new(file);
    let code = &ctx.masked.code;
    let text = &ctx.masked.text;
    let top = top_level_view(code, |header| NAMESPACE_HEADER.is_match(header));

    let mut located = Located::default();
    for caps in NAMESPACE.captures_iter(&top) {
        if let Some(m) = caps.get(1) {
            located.namespaces.push((m.start(), m.as_str().to_string()));
        }
    }
    for caps in USE.captures_iter(&top) {
        if let Some(m) = caps.get(1) {
            located.uses.extend(use_targets(&text[m.range()]));
        }
    }
    located.requires = REQUIRE.captures_iter(text).map(|c| c[1].to_string()).collect();
    located.functions = function_spans(&FUNCTION, &top, text, 0);

    for caps in CLASS.captures_iter(&top) {
        let (Some(all), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(open) = top[all.end()..].find('{').map(|p| all.end() + p) else {
            continue;
        };
        let close = matching_close(&top, open).unwrap_or(top.len());
        let body = &code[open + 1..close];
        let view = top_level_view(body, |_| false);
        let body_text = &text[open + 1..close];

        let mut properties = Vec::new();
        for stmt in statements(&view, |header| header.contains("function")) {
            let piece = view[stmt.start..stmt.end].trim();
            if PROPERTY.is_match(piece) && !piece.contains("function") {
                properties.extend(properties_of(piece));
            }
        }

        located.classes.push(ClassSpan {
            name: name.as_str().to_string(),
            name_at: name.start(),
            header: (name.end(), open),
            methods: function_spans(&METHOD, &view, body_text, open + 1),
            properties,
        });
    }

    ctx.build(located)
}

#[cfg(feature = "tree-sitter")]
mod grammar {
    use tree_sitter::Node;

    use super::*;
    use crate::indexer::parser::strip_quotes;
    use crate::indexer::parser::tree::{get_node_text, named_children, parse, walk_tree};

    const LOADERS: &[&str] = &[
        "require_expression",
        "require_once_expression",
        "include_expression",
        "include_once_expression",
    ];

    fn fn_span(node: Node<'_>, ctx: &Context<'_>) -> Option<FnSpan> {
        let name = node.child_by_field_name("name")?;
        let params = node.child_by_field_name("parameters")?.byte_range();
        let return_type = node
            .child_by_field_name("return_type")
            .and_then(|t| ctx.masked.text.get(t.byte_range()))
            .and_then(annotation);
        Some(FnSpan {
            name: get_node_text(name, ctx.file.text).to_string(),
            name_at: name.start_byte(),
            params: (params.start + 1, params.end.saturating_sub(1).max(params.start + 1)),
            return_type,
        })
    }

    fn class_span(node: Node<'_>, ctx: &Context<'_>) -> Option<ClassSpan> {
        let name = node.child_by_field_name("name")?;
        let body = node.child_by_field_name("body")?;
        let mut methods = Vec::new();
        let mut properties = Vec::new();
        for member in named_children(body) {
            match member.kind() {
                "method_declaration" => methods.extend(fn_span(member, ctx)),
                "property_declaration" => {
                    let declaration = ctx.masked.code.get(member.byte_range()).unwrap_or("");
                    properties.extend(properties_of(declaration));
                }
                _ => {}
            }
        }
        Some(ClassSpan {
            name: get_node_text(name, ctx.file.text).to_string(),
            name_at: name.start_byte(),
            header: (name.end_byte(), body.start_byte()),
            methods,
            properties,
        })
    }

    fn items<'t>(node: Node<'t>, ctx: &Context<'_>, located: &mut Located) {
        for child in named_children(node) {
            match child.kind() {
                "namespace_definition" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        let ns = get_node_text(name, ctx.file.text).to_string();
                        located.namespaces.push((name.start_byte(), ns));
                    }
                    if let Some(body) = child.child_by_field_name("body") {
                        items(body, ctx, located);
                    }
                }
                "namespace_use_declaration" => {
                    let stmt = ctx.masked.text.get(child.byte_range()).unwrap_or("");
                    let body = stmt.trim().trim_start_matches("use").trim_end_matches(';');
                    located.uses.extend(use_targets(body));
                }
                "function_definition" => located.functions.extend(fn_span(child, ctx)),
                "class_declaration" => located.classes.extend(class_span(child, ctx)),
                _ => {}
            }
        }
    }

    pub(super) fn extract(file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        let ctx = Context::new(file);
        let tree = parse(&tree_sitter_php::LANGUAGE_PHP.into(), file.text, "PHP")?;
        let root = tree.root_node();

        let mut located = Located::default();
        items(root, &ctx, &mut located);

        walk_tree(root, &mut |node| {
            if !LOADERS.contains(&node.kind()) {
                return;
            }
            let mut target = named_children(node).into_iter().next();
            while let Some(t) = target.filter(|t| t.kind() == "parenthesized_expression") {
                target = named_children(t).into_iter().next();
            }
            if let Some(t) = target.filter(|t| matches!(t.kind(), "string" | "encapsed_string")) {
                located.requires.push(strip_quotes(get_node_text(t, file.text)).to_string());
            }
        });

        Ok(ctx.build(located))
    }
}
