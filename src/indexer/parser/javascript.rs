// JavaScript, TypeScript and JSX/TSX extractor

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    collapse_ws, component_symbol, is_capitalized, js_param, mask, matching_close, split_params,
    top_level_view, LineIndex, Masked, RecordBuilder, Syntax,
};
use crate::index::{Extractor, FileRecord, FunctionSymbol, SourceFile, TypeDetail, TypeSymbol};
use crate::indexer::language::Language;

pub struct JsExtractor;

impl JsExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for JsExtractor {
    fn name(&self) -> &'static str {
        "js/react"
    }

    #[cfg(feature = "tree-sitter")]
    fn extract_grammar(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        grammar::extract(file)
    }

    fn extract_heuristic(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        Ok(heuristic(file))
    }
}

/// A top-level declaration located by either strategy. Offsets index the
/// original text.
enum Decl {
    Function {
        name: String,
        name_at: usize,
        params: (usize, usize),
        return_type: Option<String>,
        span: (usize, usize),
    },
    Class {
        name: String,
        name_at: usize,
        base: Option<String>,
        methods: Vec<FunctionSymbol>,
    },
    Variable(String),
}

struct Context<'s> {
    file: &'s SourceFile<'s>,
    masked: Masked,
    lines: LineIndex,
    typescript: bool,
}

impl<'s> Context<'s> {
    fn new(file: &'s SourceFile<'s>) -> Self {
        Self {
            file,
            masked: mask(file.text, Syntax::CLike),
            lines: LineIndex::new(file.text),
            typescript: Language::is_typescript(file.language),
        }
    }

    fn params(&self, range: (usize, usize)) -> Vec<&str> {
        let (s, e) = range;
        match (self.masked.text.get(s..e), self.masked.code.get(s..e)) {
            (Some(raw), Some(code)) => split_params(raw, code, self.typescript),
            _ => Vec::new(),
        }
    }

    fn function(&self, name: &str, name_at: usize, params: (usize, usize), return_type: Option<String>) -> FunctionSymbol {
        FunctionSymbol {
            name: name.to_string(),
            args: self.params(params).into_iter().filter_map(js_param).collect(),
            return_type,
            line: self.lines.line_of(name_at),
            ..Default::default()
        }
    }

    fn build(&self, imports: Vec<String>, decls: Vec<Decl>) -> FileRecord {
        let components = Language::is_component_dialect(self.file.language);
        let mut record = RecordBuilder::new(self.file);
        for import in &imports {
            record.import(import);
        }
        for decl in decls {
            match decl {
                Decl::Function {
                    name,
                    name_at,
                    params,
                    return_type,
                    span,
                } => {
                    if components && is_capitalized(&name) {
                        let first = self.params(params).into_iter().next();
                        let body = self.masked.code.get(span.0..span.1).unwrap_or("");
                        let line = self.lines.line_of(name_at);
                        record.type_symbol(component_symbol(&name, line, first, body, &self.masked.text));
                    } else {
                        record.function(self.function(&name, name_at, params, return_type));
                    }
                }
                Decl::Class {
                    name,
                    name_at,
                    base,
                    methods,
                } => {
                    let mut ty = TypeSymbol::new(name, self.lines.line_of(name_at), TypeDetail::Class);
                    ty.bases = base.into_iter().collect();
                    ty.methods = methods;
                    record.type_symbol(ty);
                }
                Decl::Variable(name) => record.variable(&name),
            }
        }
        record.finish()
    }
}

fn annotation(raw: &str) -> Option<String> {
    let label = collapse_ws(raw.trim().trim_start_matches(':'));
    (!label.is_empty()).then_some(label)
}

static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:\bimport\s+(?:[\w$*{}\s,]+?)\s+from\s*|\bexport\s+(?:[\w$*{}\s,]+?)\s*from\s*|\bimport\s*\(\s*|\bimport\s+|\brequire\s*\(\s*)['"]([^'"\n]+)['"]"#,
    )
    .unwrap()
});
static FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export\s+(?:default\s+)?)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*(?:<[^>]*>\s*)?\(").unwrap()
});
static VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?").unwrap()
});
static FUNCTION_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:function\b\s*\*?\s*[\w$]*\s*(?:<[^>]*>\s*)?\(|(?:<[^>]*>\s*)?\(|([A-Za-z_$][\w$]*)\s*=>)").unwrap()
});
static CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export\s+(?:default\s+)?)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)").unwrap()
});
static EXTENDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bextends\s+([A-Za-z_$][\w$.]*)").unwrap());
static METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:(?:static|async|get|set|public|private|protected|readonly|override|abstract)\s+)*\*?\s*(#?[A-Za-z_$][\w$]*)\s*(?:<[^>]*>\s*)?\(").unwrap()
});

const NOT_METHODS: &[&str] = &["if", "for", "while", "switch", "catch", "return", "function"];

/// Finds the end of a block or expression body starting at or after `from`.
fn body_end(top: &str, from: usize) -> usize {
    let rest = &top[from..];
    let skipped = rest.len() - rest.trim_start().len();
    let at = from + skipped;
    match top.as_bytes().get(at) {
        Some(b'{') | Some(b'(') => matching_close(top, at).map(|c| c + 1).unwrap_or(top.len()),
        _ => top[at..].find('\n').map(|p| at + p).unwrap_or(top.len()),
    }
}

/// Splits what follows a parameter list into a return annotation and the
/// offset where the body starts. `text` and `view` share offsets.
fn after_params(text: &str, view: &str, close: usize, arrow: bool) -> (Option<String>, usize) {
    let rest = &view[close + 1..];
    let stop = if arrow {
        rest.find("=>")
    } else {
        rest.find(|c| c == '{' || c == ';')
    };
    let Some(stop) = stop else {
        return (None, close + 1);
    };
    let between = text.get(close + 1..close + 1 + stop).unwrap_or("");
    let return_type = if between.trim_start().starts_with(':') {
        annotation(between)
    } else {
        None
    };
    let body = close + 1 + stop + if arrow { 2 } else { 0 };
    (return_type, body)
}

fn heuristic(file: &SourceFile<'_>) -> FileRecord {
    let ctx = Context::new(file);
    let top = top_level_view(&ctx.masked.code, |_| false);

    let imports = IMPORT
        .captures_iter(&ctx.masked.text)
        .map(|c| c[1].to_string())
        .collect();

    let mut decls: Vec<(usize, Decl)> = Vec::new();

    for caps in FUNCTION.captures_iter(&top) {
        let (Some(all), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let open = all.end() - 1;
        let Some(close) = matching_close(&top, open) else {
            continue;
        };
        let (return_type, body) = after_params(&ctx.masked.text, &top, close, false);
        decls.push((
            all.start(),
            Decl::Function {
                name: name.as_str().to_string(),
                name_at: name.start(),
                params: (open + 1, close),
                return_type,
                span: (all.start(), body_end(&top, body)),
            },
        ));
    }

    for caps in VARIABLE.captures_iter(&top) {
        let (Some(all), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value_at = all.end();
        let function = FUNCTION_VALUE.captures(&top[value_at..]).and_then(|v| {
            let head = v.get(0)?;
            if let Some(single) = v.get(1) {
                let params = (value_at + single.start(), value_at + single.end());
                let arrow = value_at + head.end();
                return Some((params, None, arrow));
            }
            let open = value_at + head.end() - 1;
            let close = matching_close(&top, open)?;
            let is_function_keyword = top[value_at..].starts_with("function");
            let trailing = top[close + 1..].trim_start();
            if !is_function_keyword && !(trailing.starts_with("=>") || trailing.starts_with(':')) {
                return None;
            }
            let (return_type, body) = after_params(&ctx.masked.text, &top, close, !is_function_keyword);
            Some(((open + 1, close), return_type, body))
        });

        let decl = match function {
            Some((params, return_type, body)) => Decl::Function {
                name: name.as_str().to_string(),
                name_at: name.start(),
                params,
                return_type,
                span: (all.start(), body_end(&top, body)),
            },
            None => Decl::Variable(name.as_str().to_string()),
        };
        decls.push((all.start(), decl));
    }

    for caps in CLASS.captures_iter(&top) {
        let (Some(all), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(open) = top[all.end()..].find('{').map(|p| all.end() + p) else {
            continue;
        };
        let header = &ctx.masked.text[all.end()..open];
        let base = EXTENDS.captures(header).map(|c| c[1].to_string());
        let close = matching_close(&top, open).unwrap_or(top.len());
        let methods = heuristic_methods(&ctx, open + 1, close);
        decls.push((
            all.start(),
            Decl::Class {
                name: name.as_str().to_string(),
                name_at: name.start(),
                base,
                methods,
            },
        ));
    }

    decls.sort_by_key(|(at, _)| *at);
    ctx.build(imports, decls.into_iter().map(|(_, d)| d).collect())
}

fn heuristic_methods(ctx: &Context<'_>, start: usize, end: usize) -> Vec<FunctionSymbol> {
    let Some(body) = ctx.masked.code.get(start..end) else {
        return Vec::new();
    };
    let view = top_level_view(body, |_| false);
    let mut methods = Vec::new();
    for caps in METHOD.captures_iter(&view) {
        let (Some(all), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if NOT_METHODS.contains(&name.as_str()) {
            continue;
        }
        let open = all.end() - 1;
        let Some(close) = matching_close(&view, open) else {
            continue;
        };
        let text = &ctx.masked.text[start..start + view.len()];
        let (return_type, _) = after_params(text, &view, close, false);
        methods.push(ctx.function(
            name.as_str(),
            start + name.start(),
            (start + open + 1, start + close),
            return_type,
        ));
    }
    methods
}

#[cfg(feature = "tree-sitter")]
mod grammar {
    use tree_sitter::Node;

    use super::*;
    use crate::indexer::parser::strip_quotes;
    use crate::indexer::parser::tree::{get_node_text, named_children, parse, walk_tree};

    fn inner(node: Node<'_>) -> (usize, usize) {
        let r = node.byte_range();
        if node.kind() == "formal_parameters" {
            (r.start + 1, r.end.saturating_sub(1).max(r.start + 1))
        } else {
            (r.start, r.end)
        }
    }

    fn return_type(node: Node<'_>, ctx: &Context<'_>) -> Option<String> {
        let t = node.child_by_field_name("return_type")?;
        annotation(ctx.masked.text.get(t.byte_range())?)
    }

    pub(super) fn extract(file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        let ctx = Context::new(file);
        let language: tree_sitter::Language = match file.extension() {
            "ts" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            "tsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
            _ => tree_sitter_javascript::LANGUAGE.into(),
        };
        let tree = parse(&language, file.text, "JavaScript")?;
        let root = tree.root_node();
        let content = file.text;

        let mut imports = Vec::new();
        walk_tree(root, &mut |node| {
            let source = match node.kind() {
                "import_statement" | "export_statement" => node.child_by_field_name("source"),
                "call_expression" => {
                    let callee = node.child_by_field_name("function");
                    let is_loader = callee.is_some_and(|f| {
                        f.kind() == "import" || (f.kind() == "identifier" && get_node_text(f, content) == "require")
                    });
                    node.child_by_field_name("arguments")
                        .filter(|_| is_loader)
                        .and_then(|args| named_children(args).into_iter().next())
                        .filter(|arg| arg.kind() == "string")
                }
                _ => None,
            };
            if let Some(source) = source {
                imports.push(strip_quotes(get_node_text(source, content)).to_string());
            }
        });

        let mut decls = Vec::new();
        for node in named_children(root) {
            let node = match node.kind() {
                "export_statement" => match node
                    .child_by_field_name("declaration")
                    .or_else(|| node.child_by_field_name("value"))
                {
                    Some(decl) => decl,
                    None => continue,
                },
                _ => node,
            };
            declaration(node, &ctx, &mut decls);
        }

        Ok(ctx.build(imports, decls))
    }

    fn declaration(node: Node<'_>, ctx: &Context<'_>, decls: &mut Vec<Decl>) {
        let content = ctx.file.text;
        match node.kind() {
            "function_declaration" | "generator_function_declaration" | "function_expression"
            | "function" | "generator_function" => {
                let (Some(name), Some(params)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("parameters"),
                ) else {
                    return;
                };
                decls.push(Decl::Function {
                    name: get_node_text(name, content).to_string(),
                    name_at: name.start_byte(),
                    params: inner(params),
                    return_type: return_type(node, ctx),
                    span: (node.start_byte(), node.end_byte()),
                });
            }
            "class_declaration" | "abstract_class_declaration" | "class" => {
                let Some(name) = node.child_by_field_name("name") else {
                    return;
                };
                let base = named_children(node)
                    .into_iter()
                    .find(|c| c.kind() == "class_heritage")
                    .and_then(|h| {
                        EXTENDS
                            .captures(get_node_text(h, content))
                            .map(|c| c[1].to_string())
                    });
                let methods = node
                    .child_by_field_name("body")
                    .map(|body| methods(body, ctx))
                    .unwrap_or_default();
                decls.push(Decl::Class {
                    name: get_node_text(name, content).to_string(),
                    name_at: name.start_byte(),
                    base,
                    methods,
                });
            }
            "lexical_declaration" | "variable_declaration" => {
                for declarator in named_children(node) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(name) = declarator.child_by_field_name("name") else {
                        continue;
                    };
                    if name.kind() != "identifier" {
                        continue;
                    }
                    let text = get_node_text(name, content).to_string();
                    let value = declarator.child_by_field_name("value").filter(|v| {
                        matches!(
                            v.kind(),
                            "arrow_function" | "function_expression" | "function" | "generator_function"
                        )
                    });
                    let params = value.and_then(|v| {
                        v.child_by_field_name("parameters")
                            .or_else(|| v.child_by_field_name("parameter"))
                    });
                    match (value, params) {
                        (Some(v), Some(params)) => decls.push(Decl::Function {
                            name: text,
                            name_at: name.start_byte(),
                            params: inner(params),
                            return_type: return_type(v, ctx),
                            span: (declarator.start_byte(), declarator.end_byte()),
                        }),
                        _ => decls.push(Decl::Variable(text)),
                    }
                }
            }
            _ => {}
        }
    }

    fn methods(body: Node<'_>, ctx: &Context<'_>) -> Vec<FunctionSymbol> {
        let content = ctx.file.text;
        named_children(body)
            .into_iter()
            .filter(|m| m.kind() == "method_definition")
            .filter_map(|m| {
                let name = m.child_by_field_name("name")?;
                let params = m.child_by_field_name("parameters")?;
                Some(ctx.function(
                    get_node_text(name, content),
                    name.start_byte(),
                    inner(params),
                    return_type(m, ctx),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionLimits;
    use crate::index::{ExportKind, TypeKind};

    const COMPONENTS: &str = r#"import React, { useState } from 'react';
import Button from "./Button";
import './styles.css';
const api = require('../lib/api');

// function Commented() {}

export default function Profile({ user, onSave = noop, ...rest }) {
  const [name, setName] = useState(user.name);
  const [age, setAge] = useState(0);
  useEffect(() => {
    const inner = () => useMemo(() => 1, []);
  }, []);
  return <div title="it's {fine}">{props.extra}</div>;
}

export const Avatar = (props) => {
  const size = useAvatarSize(props.size);
  return <img src={props.src} />;
};

function formatName(first, last = "") {
  function nested() {}
  return first + last;
}

const MAX = 3;
let counter = (1 + 2);
export { Avatar as default };
"#;

    fn file<'a>(path: &'a str, language: &'a str, text: &'a str, limits: &'a ExtractionLimits) -> SourceFile<'a> {
        SourceFile {
            path,
            language,
            text,
            limits,
        }
    }

    fn check_components(rec: &FileRecord) {
        assert_eq!(rec.imports, vec!["react", "./Button", "./styles.css", "../lib/api"]);

        let components: Vec<&TypeSymbol> = rec.types_of(TypeKind::Component).collect();
        assert_eq!(components.len(), 2);

        let profile = components[0];
        assert_eq!(profile.name, "Profile");
        assert_eq!(profile.line, 8);
        match &profile.detail {
            TypeDetail::Component { props, hooks, export } => {
                assert_eq!(props, &vec!["user", "onSave", "rest", "extra"]);
                assert_eq!(hooks, &vec!["useState", "useEffect", "useMemo"]);
                assert_eq!(*export, ExportKind::Default);
            }
            other => panic!("unexpected detail {other:?}"),
        }

        match &components[1].detail {
            TypeDetail::Component { props, hooks, export } => {
                assert_eq!(props, &vec!["size", "src"]);
                assert_eq!(hooks, &vec!["useAvatarSize"]);
                assert_eq!(*export, ExportKind::Both);
            }
            other => panic!("unexpected detail {other:?}"),
        }

        let names: Vec<&str> = rec.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["formatName"]);
        assert_eq!(rec.functions[0].args, vec!["first", "last"]);
        assert_eq!(rec.variables, vec!["api", "MAX", "counter"]);
    }

    #[test]
    fn test_heuristic_components() {
        let limits = ExtractionLimits::default();
        let f = file("src/Profile.jsx", "react", COMPONENTS, &limits);
        check_components(&JsExtractor::new().extract_heuristic(&f).unwrap());
    }

    #[cfg(feature = "tree-sitter")]
    #[test]
    fn test_grammar_components() {
        let limits = ExtractionLimits::default();
        let f = file("src/Profile.jsx", "react", COMPONENTS, &limits);
        check_components(&JsExtractor::new().extract_grammar(&f).unwrap());
    }

    const TYPESCRIPT: &str = r#"import { Store } from "./store";

export class Cart extends Base {
  private items: string[] = [];

  constructor(store: Store) {
    super();
  }

  add(item: string, qty?: number): void {
    if (qty) {
      this.items.push(item);
    }
  }
}

export async function total(cart: Cart, rate = 0.2): Promise<number> {
  return 0;
}

export const scale = (value: number): number => value * 2;
"#;

    fn check_typescript(rec: &FileRecord) {
        assert_eq!(rec.imports, vec!["./store"]);
        assert_eq!(rec.types.len(), 1);
        let cart = &rec.types[0];
        assert_eq!(cart.name, "Cart");
        assert_eq!(cart.bases, vec!["Base"]);
        let methods: Vec<&str> = cart.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["constructor", "add"]);
        assert_eq!(cart.methods[1].args, vec!["item", "qty"]);
        assert_eq!(cart.methods[1].return_type.as_deref(), Some("void"));

        let total = &rec.functions[0];
        assert_eq!(total.name, "total");
        assert_eq!(total.args, vec!["cart", "rate"]);
        assert_eq!(total.return_type.as_deref(), Some("Promise<number>"));
        assert_eq!(rec.functions[1].name, "scale");
        assert_eq!(rec.functions[1].return_type.as_deref(), Some("number"));
        assert!(rec.variables.is_empty());
    }

    #[test]
    fn test_heuristic_typescript() {
        let limits = ExtractionLimits::default();
        let f = file("src/cart.ts", "typescript", TYPESCRIPT, &limits);
        check_typescript(&JsExtractor::new().extract_heuristic(&f).unwrap());
    }

    #[cfg(feature = "tree-sitter")]
    #[test]
    fn test_grammar_typescript() {
        let limits = ExtractionLimits::default();
        let f = file("src/cart.ts", "typescript", TYPESCRIPT, &limits);
        check_typescript(&JsExtractor::new().extract_grammar(&f).unwrap());
    }

    #[test]
    fn test_capitalized_functions_stay_functions_outside_jsx() {
        let limits = ExtractionLimits::default();
        let f = file("a.js", "javascript", "function Widget(a) { useThing(); }\n", &limits);
        let rec = JsExtractor::new().extract_heuristic(&f).unwrap();
        assert_eq!(rec.functions.len(), 1);
        assert!(rec.types.is_empty());
    }
}
