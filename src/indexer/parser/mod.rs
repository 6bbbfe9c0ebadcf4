// Language extractors and the text utilities they share
//
// Every extractor runs in two strategies: a tree-sitter one that locates
// declarations on a real syntax tree, and a regex one that locates them on a
// masked copy of the source. Both hand the located spans to the same
// normalizers below, so the records they build have the same shape.

pub mod c;
pub mod cpp;
pub mod generic;
pub mod javascript;
pub mod php;
pub mod python;
#[cfg(feature = "tree-sitter")]
pub mod tree;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::config::ExtractionLimits;
use crate::index::{ExportKind, FileRecord, FunctionSymbol, SourceFile, TypeDetail, TypeSymbol};

/// Builds a record while enforcing set semantics and per-category caps.
pub struct RecordBuilder<'a> {
    record: FileRecord,
    limits: &'a ExtractionLimits,
    function_names: HashSet<String>,
    type_names: HashSet<String>,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(file: &SourceFile<'a>) -> Self {
        Self {
            record: FileRecord::minimal(file.path, file.language, file.loc()),
            limits: file.limits,
            function_names: HashSet::new(),
            type_names: HashSet::new(),
        }
    }

    pub fn docstring(&mut self, doc: Option<String>) {
        if self.record.docstring.is_none() {
            self.record.docstring = doc;
        }
    }

    pub fn namespace(&mut self, namespace: &str) {
        let ns = collapse_ws(namespace);
        if self.record.namespace.is_none() && !ns.is_empty() {
            self.record.namespace = Some(ns);
        }
    }

    pub fn import(&mut self, import: &str) {
        push_unique(&mut self.record.imports, import.trim(), self.limits.imports);
    }

    pub fn include(&mut self, include: &str) {
        push_unique(&mut self.record.includes, include.trim(), self.limits.imports);
    }

    pub fn define(&mut self, define: &str) {
        push_unique(&mut self.record.defines, define.trim(), self.limits.defines);
    }

    pub fn declared_namespace(&mut self, namespace: &str) {
        push_unique(&mut self.record.namespaces, namespace.trim(), self.limits.namespaces);
    }

    pub fn variable(&mut self, name: &str) {
        push_unique(&mut self.record.variables, name.trim(), self.limits.variables);
    }

    pub fn function(&mut self, function: FunctionSymbol) {
        if function.name.is_empty() || self.record.functions.len() >= self.limits.functions {
            return;
        }
        if self.function_names.insert(function.name.clone()) {
            self.record.functions.push(function);
        }
    }

    pub fn type_symbol(&mut self, mut ty: TypeSymbol) {
        if ty.name.is_empty() || self.record.types.len() >= self.limits.types {
            return;
        }
        if !self.type_names.insert(ty.name.clone()) {
            return;
        }
        ty.methods = dedup_functions(ty.methods, self.limits.methods);
        ty.bases = dedup_names(ty.bases, self.limits.members);
        let cap = self.limits.members;
        match &mut ty.detail {
            TypeDetail::Class => {}
            TypeDetail::Component { props, hooks, .. } => {
                *props = dedup_names(std::mem::take(props), cap);
                *hooks = dedup_names(std::mem::take(hooks), cap);
            }
            TypeDetail::PhpClass {
                implements,
                properties,
                ..
            } => {
                *implements = dedup_names(std::mem::take(implements), cap);
                *properties = dedup_names(std::mem::take(properties), cap);
            }
            TypeDetail::Struct { members, .. } => {
                *members = dedup_names(std::mem::take(members), cap);
            }
            TypeDetail::CppClass {
                members,
                template_params,
                ..
            } => {
                *members = dedup_names(std::mem::take(members), cap);
                *template_params = dedup_names(std::mem::take(template_params), cap);
            }
        }
        self.record.types.push(ty);
    }

    pub fn finish(self) -> FileRecord {
        self.record
    }
}

/// Appends `item` unless empty, already present, or the list is full.
pub fn push_unique(list: &mut Vec<String>, item: &str, cap: usize) -> bool {
    if item.is_empty() || list.len() >= cap || list.iter().any(|x| x == item) {
        return false;
    }
    list.push(item.to_string());
    true
}

pub fn dedup_names(names: Vec<String>, cap: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(names.len().min(cap));
    for name in names {
        push_unique(&mut out, name.trim(), cap);
    }
    out
}

pub fn dedup_functions(functions: Vec<FunctionSymbol>, cap: usize) -> Vec<FunctionSymbol> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for f in functions {
        if out.len() >= cap {
            break;
        }
        if !f.name.is_empty() && seen.insert(f.name.clone()) {
            out.push(f);
        }
    }
    out
}

/// Byte offset to 1-based line number.
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Python,
    CLike,
    Php,
}

/// Two offset-preserving views of a source text.
pub struct Masked {
    /// Comments and string contents replaced by spaces; quotes kept.
    pub code: String,
    /// Comments replaced by spaces; strings intact.
    pub text: String,
}

fn blank(buf: &mut [u8], start: usize, end: usize) {
    let end = end.min(buf.len());
    for b in buf.iter_mut().take(end).skip(start) {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

fn into_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Scans `src` once, blanking comments in both views and string contents in
/// the code view. Offsets and line breaks are preserved.
pub fn mask(src: &str, syntax: Syntax) -> Masked {
    let b = src.as_bytes();
    let mut code = b.to_vec();
    let mut text = b.to_vec();
    let mut i = 0;
    let starts_with = |at: usize, pat: &[u8]| b.len() >= at + pat.len() && &b[at..at + pat.len()] == pat;

    while i < b.len() {
        let c = b[i];
        let line_comment = match syntax {
            Syntax::Python => c == b'#',
            Syntax::CLike => starts_with(i, b"//"),
            Syntax::Php => starts_with(i, b"//") || (c == b'#' && !starts_with(i, b"#[")),
        };
        if line_comment {
            let end = memchr_from(b, b'\n', i).unwrap_or(b.len());
            blank(&mut code, i, end);
            blank(&mut text, i, end);
            i = end;
            continue;
        }
        if syntax != Syntax::Python && starts_with(i, b"/*") {
            let end = find_from(b, b"*/", i + 2).map(|p| p + 2).unwrap_or(b.len());
            blank(&mut code, i, end);
            blank(&mut text, i, end);
            i = end;
            continue;
        }

        let is_quote = match syntax {
            Syntax::Python | Syntax::Php => c == b'"' || c == b'\'',
            Syntax::CLike => c == b'"' || c == b'\'' || c == b'`',
        };
        if !is_quote {
            i += 1;
            continue;
        }

        let triple = syntax == Syntax::Python && starts_with(i, &[c, c, c]);
        let open = if triple { 3 } else { 1 };
        let multiline = triple || c == b'`' || syntax == Syntax::Php;
        let mut j = i + open;
        let mut close = None;
        while j < b.len() {
            if b[j] == b'\\' {
                j += 2;
                continue;
            }
            if b[j] == b'\n' && !multiline {
                break;
            }
            if triple {
                if starts_with(j, &[c, c, c]) {
                    close = Some(j);
                    break;
                }
            } else if b[j] == c {
                close = Some(j);
                break;
            }
            j += 1;
        }
        match close {
            Some(end) => {
                blank(&mut code, i + open, end);
                i = end + open;
            }
            None => {
                let end = j.min(b.len());
                blank(&mut code, i + open, end);
                i = end;
            }
        }
    }

    Masked {
        code: into_string(code),
        text: into_string(text),
    }
}

fn memchr_from(b: &[u8], needle: u8, from: usize) -> Option<usize> {
    b.get(from..)?.iter().position(|&x| x == needle).map(|p| p + from)
}

fn find_from(b: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    b.get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Blanks preprocessor directives, including backslash continuations.
pub fn blank_preprocessor(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut continued = false;
    for line in code.split_inclusive('\n') {
        let directive = continued || line.trim_start().starts_with('#');
        if directive {
            continued = line.trim_end().ends_with('\\');
            out.extend(line.chars().map(|ch| if ch == '\n' { '\n' } else { ' ' }));
        } else {
            continued = false;
            out.push_str(line);
        }
    }
    out
}

/// Blanks the interior of every brace block whose header is not
/// `transparent`. Opaque blocks keep their outer braces; transparent ones
/// (namespaces, `extern "C"`) turn their braces into `;` so the items they
/// contain read as top-level statements.
pub fn top_level_view(code: &str, transparent: impl Fn(&str) -> bool) -> String {
    let b = code.as_bytes();
    let mut out = b.to_vec();
    let mut stack: Vec<bool> = Vec::new();
    let mut opaque = 0usize;
    let mut boundary = 0usize;

    for (i, &c) in b.iter().enumerate() {
        match c {
            b'{' => {
                if opaque == 0 {
                    let header = &code[boundary..i];
                    if transparent(header) {
                        stack.push(false);
                        out[i] = b';';
                    } else {
                        stack.push(true);
                        opaque += 1;
                    }
                    boundary = i + 1;
                } else {
                    stack.push(true);
                    opaque += 1;
                    out[i] = b' ';
                }
            }
            b'}' => match stack.pop() {
                Some(true) => {
                    opaque -= 1;
                    if opaque > 0 {
                        out[i] = b' ';
                    } else {
                        boundary = i + 1;
                    }
                }
                Some(false) => {
                    out[i] = b';';
                    boundary = i + 1;
                }
                None => out[i] = b' ',
            },
            b'\n' => {}
            _ if opaque > 0 => out[i] = b' ',
            b';' => boundary = i + 1,
            _ => {}
        }
    }
    into_string(out)
}

/// Index of the bracket closing the one at `open`, tracking nesting of the
/// same bracket pair only.
pub fn matching_close(code: &str, open: usize) -> Option<usize> {
    let b = code.as_bytes();
    let (o, c) = match b.get(open)? {
        b'{' => (b'{', b'}'),
        b'(' => (b'(', b')'),
        b'[' => (b'[', b']'),
        b'<' => (b'<', b'>'),
        _ => return None,
    };
    let mut depth = 0usize;
    for (i, &x) in b.iter().enumerate().skip(open) {
        if x == o {
            depth += 1;
        } else if x == c {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Splits on commas outside any brackets. Returns trimmed, non-empty ranges.
pub fn split_top_level(s: &str, angle: bool) -> Vec<(usize, usize)> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '<' if angle => depth += 1,
            '>' if angle => depth -= 1,
            ',' if depth <= 0 => {
                push_trimmed(s, start, i, &mut parts);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_trimmed(s, start, s.len(), &mut parts);
    parts
}

fn push_trimmed(s: &str, start: usize, end: usize, parts: &mut Vec<(usize, usize)>) {
    let piece = &s[start..end];
    let lead = piece.len() - piece.trim_start().len();
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        parts.push((start + lead, start + lead + trimmed.len()));
    }
}

/// Splits `raw` using the bracket structure of `code`, which must have the
/// same length.
pub fn split_params<'s>(raw: &'s str, code: &str, angle: bool) -> Vec<&'s str> {
    let structure = if code.len() == raw.len() { code } else { raw };
    split_top_level(structure, angle)
        .into_iter()
        .filter_map(|(s, e)| raw.get(s..e))
        .collect()
}

pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn before_any<'s>(s: &'s str, stops: &[char]) -> &'s str {
    match s.find(|c| stops.contains(&c)) {
        Some(idx) => &s[..idx],
        None => s,
    }
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

pub fn python_param(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() || t == "*" || t == "/" {
        return None;
    }
    let name = before_any(t, &[':', '=']).trim();
    (!name.is_empty()).then(|| name.to_string())
}

pub fn js_param(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    if t.starts_with('{') || t.starts_with('[') {
        let close = matching_close(t, 0)?;
        return Some(collapse_ws(&t[..=close]));
    }
    let rest = t.starts_with("...");
    let mut name = before_any(t.trim_start_matches("..."), &[':', '=', '?']).trim();
    for modifier in ["public ", "private ", "protected ", "readonly "] {
        name = name.strip_prefix(modifier).unwrap_or(name).trim();
    }
    if name.is_empty() {
        return None;
    }
    Some(if rest { format!("...{name}") } else { name.to_string() })
}

static PHP_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(\w+)").unwrap());

pub fn php_param(raw: &str) -> Option<String> {
    let head = before_any(raw, &['=']);
    PHP_VAR.captures(head).map(|c| c[1].to_string())
}

static C_FN_POINTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*[*&^]+\s*(\w+)\s*\)").unwrap());
static C_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static C_BITFIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*\w+\s*$").unwrap());
static TRAILING_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Za-z_]\w*)\s*$").unwrap());

/// The declared name in a C/C++ parameter or field declarator.
pub fn c_declarator_name(raw: &str) -> Option<String> {
    let t = before_any(raw.trim(), &['=', '{']).trim();
    if t.is_empty() || t == "void" || t == "..." {
        return None;
    }
    if let Some(c) = C_FN_POINTER.captures(t) {
        return Some(c[1].to_string());
    }
    let without_arrays = C_ARRAY.replace_all(t, "");
    let without_bits = C_BITFIELD.replace(&without_arrays, "");
    TRAILING_IDENT
        .captures(&without_bits)
        .map(|c| c[1].to_string())
}

const STORAGE_WORDS: &[&str] = &[
    "static", "extern", "inline", "__inline", "virtual", "explicit", "constexpr", "consteval",
    "friend", "register", "_Noreturn",
];

/// Canonical return-type label from the text preceding a function name.
pub fn type_label(prefix: &str) -> Option<String> {
    let kept: Vec<&str> = prefix
        .split_whitespace()
        .filter(|w| !STORAGE_WORDS.contains(w))
        .collect();
    if kept.is_empty() {
        return None;
    }
    let label = kept.join(" ").replace(" *", "*").replace(" &", "&");
    Some(label.trim().to_string())
}

/// Splits a leading `template <...>` clause off a declaration header.
pub fn strip_template_prefix(header: &str) -> (&str, Option<&str>) {
    let trimmed = header.trim_start();
    let offset = header.len() - trimmed.len();
    let Some(rest) = trimmed.strip_prefix("template") else {
        return (header, None);
    };
    let Some(lt) = rest.find('<') else {
        return (header, None);
    };
    if !rest[..lt].trim().is_empty() {
        return (header, None);
    }
    let open = offset + "template".len() + lt;
    match matching_close(header, open) {
        Some(close) => (&header[close + 1..], Some(&header[open..=close])),
        None => (header, None),
    }
}

/// Names declared in a `<typename T, int N = 3>` list.
pub fn template_param_names(params: &str) -> Vec<String> {
    let inner = params.trim().trim_start_matches('<').trim_end_matches('>');
    split_top_level(inner, true)
        .into_iter()
        .filter_map(|(s, e)| {
            let piece = before_any(&inner[s..e], &['=']).trim();
            TRAILING_IDENT
                .captures(piece)
                .map(|c| c[1].to_string())
                .filter(|n| n != "typename" && n != "class")
        })
        .collect()
}

const NOT_FUNCTION_NAMES: &[&str] = &[
    "if", "for", "while", "switch", "return", "sizeof", "defined", "catch", "decltype",
    "alignas", "__attribute__", "__declspec", "static_assert", "typeof", "do", "else",
];

/// A function header split into its parts. Offsets are relative to the
/// header text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnHeader {
    pub name: String,
    pub name_at: usize,
    pub params: (usize, usize),
    pub after_params: usize,
}

impl FnHeader {
    pub fn is_qualified(&self) -> bool {
        self.name.contains("::")
    }
}

/// Recognizes `<prefix> name(params) <suffix>` where `name` is a plain or
/// qualified identifier.
pub fn parse_fn_header(header: &str) -> Option<FnHeader> {
    let open = header.find('(')?;
    if header[..open].contains('=') {
        return None;
    }
    let name_end = header[..open].trim_end().len();
    let name_start = header[..name_end]
        .char_indices()
        .rev()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_' || c == '~' || c == ':'))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let name = &header[name_start..name_end];
    if name.is_empty()
        || name.starts_with(|c: char| c.is_ascii_digit() || c == ':')
        || NOT_FUNCTION_NAMES.contains(&name)
        || name.ends_with("operator")
    {
        return None;
    }
    let close = matching_close(header, open)?;
    Some(FnHeader {
        name: name.to_string(),
        name_at: name_start,
        params: (open + 1, close),
        after_params: close + 1,
    })
}

/// A top-level statement found by `statements`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement {
    pub start: usize,
    pub end: usize,
    /// Offsets of the opening and closing brace of the statement's block.
    pub block: Option<(usize, usize)>,
}

/// Splits a top-level view into statements. A statement ends at `;` or,
/// when its header satisfies `ends_at_block`, at the close of its block.
pub fn statements(top: &str, ends_at_block: impl Fn(&str) -> bool) -> Vec<Statement> {
    let b = top.as_bytes();
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut block = None;
    let mut i = 0;
    while i < b.len() {
        let c = b[i];
        match c {
            b';' => {
                if let Some(s) = start.take() {
                    out.push(Statement { start: s, end: i, block: block.take() });
                }
                block = None;
            }
            b'{' => {
                let s = *start.get_or_insert(i);
                let close = memchr_from(b, b'}', i).unwrap_or(b.len().saturating_sub(1));
                if block.is_none() && ends_at_block(&top[s..i]) {
                    out.push(Statement {
                        start: s,
                        end: close + 1,
                        block: Some((i, close)),
                    });
                    start = None;
                } else if block.is_none() {
                    block = Some((i, close));
                }
                i = close + 1;
                continue;
            }
            _ if c.is_ascii_whitespace() => {}
            _ => {
                start.get_or_insert(i);
            }
        }
        i += 1;
    }
    if let Some(s) = start {
        if !top[s..].trim().is_empty() {
            out.push(Statement { start: s, end: b.len(), block });
        }
    }
    out
}

/// Module or symbol docstring cleanup: common indentation removed, blank
/// edges trimmed.
pub fn clean_docstring(raw: &str) -> Option<String> {
    let lines: Vec<&str> = raw.lines().collect();
    let first = lines.first().map(|l| l.trim()).unwrap_or("");
    let indent = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut out: Vec<String> = vec![first.to_string()];
    for line in lines.iter().skip(1) {
        out.push(line.get(indent..).unwrap_or("").trim_end().to_string());
    }
    let text = out.join("\n");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Contents of a Python string literal, without prefix or quotes.
pub fn python_string_value(raw: &str) -> Option<&str> {
    let t = raw.trim().trim_start_matches(|c: char| "rRuUbBfF".contains(c));
    for q in ["\"\"\"", "'''", "\"", "'"] {
        if t.len() >= 2 * q.len() && t.starts_with(q) && t.ends_with(q) {
            return Some(&t[q.len()..t.len() - q.len()]);
        }
    }
    None
}

pub fn decorator_name(raw: &str) -> String {
    let t = raw.trim().trim_start_matches('@');
    before_any(t, &['(']).split_whitespace().collect()
}

pub fn strip_quotes(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

/// Classifies how `name` is exported, scanning comment-free module text.
pub fn export_kind(text: &str, name: &str) -> ExportKind {
    let n = regex::escape(name);
    let default_decl = Regex::new(&format!(
        r"\bexport\s+default\s+(?:async\s+)?(?:function\s*\*?\s*|class\s+)?{n}\b"
    ));
    let named_decl = Regex::new(&format!(
        r"\bexport\s+(?:async\s+)?(?:function\s*\*?|const|let|var|class)\s+{n}\b"
    ));
    let (Ok(default_decl), Ok(named_decl)) = (default_decl, named_decl) else {
        return ExportKind::None;
    };

    let mut is_default = default_decl.is_match(text);
    let mut is_named = named_decl.is_match(text);
    for list in EXPORT_LIST.captures_iter(text) {
        for item in list[1].split(',') {
            let mut words = item.split_whitespace();
            if words.next() != Some(name) {
                continue;
            }
            match (words.next(), words.next()) {
                (Some("as"), Some("default")) => is_default = true,
                _ => is_named = true,
            }
        }
    }

    match (is_default, is_named) {
        (true, true) => ExportKind::Both,
        (true, false) => ExportKind::Default,
        (false, true) => ExportKind::Named,
        (false, false) => ExportKind::None,
    }
}

static EXPORT_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bexport\s*\{([^}]*)\}").unwrap());
static HOOK_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(use[A-Z]\w*)\s*\(").unwrap());
static PROPS_ACCESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bprops\.(\w+)").unwrap());

/// Builds a component from its first parameter and its masked body.
pub fn component_symbol(
    name: &str,
    line: usize,
    first_param: Option<&str>,
    body_code: &str,
    module_text: &str,
) -> TypeSymbol {
    let mut props = Vec::new();
    if let Some(param) = first_param.map(str::trim) {
        if param.starts_with('{') {
            if let Some(close) = matching_close(param, 0) {
                let inner = &param[1..close];
                for (s, e) in split_top_level(inner, true) {
                    let key = before_any(inner[s..e].trim_start_matches("..."), &[':', '=']).trim();
                    if is_identifier(key) {
                        props.push(key.to_string());
                    }
                }
            }
        }
    }
    props.extend(PROPS_ACCESS.captures_iter(body_code).map(|c| c[1].to_string()));
    let hooks = HOOK_CALL
        .captures_iter(body_code)
        .map(|c| c[1].to_string())
        .collect();

    TypeSymbol::new(
        name,
        line,
        TypeDetail::Component {
            props,
            hooks,
            export: export_kind(module_text, name),
        },
    )
}

pub fn is_capitalized(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_preserves_offsets() {
        let src = "let a = \"{x}\"; // }\nlet b = 'q';\n/* { */ c";
        let m = mask(src, Syntax::CLike);
        assert_eq!(m.code.len(), src.len());
        assert_eq!(m.text.len(), src.len());
        assert!(!m.code.contains('{'));
        assert!(m.text.contains("\"{x}\""));
        assert!(!m.text.contains("/*"));
        assert_eq!(m.code.lines().count(), src.lines().count());
    }

    #[test]
    fn test_mask_python_triple_quotes() {
        let src = "x = \"\"\"a\n# not a comment\n\"\"\"  # real\ny = 1";
        let m = mask(src, Syntax::Python);
        assert!(!m.code.contains("not a comment"));
        assert!(m.text.contains("# not a comment"));
        assert!(!m.text.contains("real"));
        assert!(m.code.ends_with("y = 1"));
    }

    #[test]
    fn test_mask_handles_multibyte() {
        let src = "s = \"héllo\"; t";
        let m = mask(src, Syntax::CLike);
        assert_eq!(m.code.len(), src.len());
        assert!(m.code.ends_with("; t"));
    }

    #[test]
    fn test_top_level_view() {
        let code = "namespace a {\nint f() { return 1; }\n}\nint g;";
        let ns = |h: &str| h.trim_start().starts_with("namespace");
        let top = top_level_view(code, ns);
        assert_eq!(top.len(), code.len());
        assert!(top.contains("int f() {"));
        assert!(!top.contains("return"));
        assert!(top.starts_with("namespace a ;"));
    }

    #[test]
    fn test_statements() {
        let top = top_level_view("int x;\nint f(void) { }\nstruct S { } s;\n", |_| false);
        let stmts = statements(&top, |h| parse_fn_header(h).is_some());
        assert_eq!(stmts.len(), 3);
        assert!(stmts[1].block.is_some());
        assert!(top[stmts[2].start..stmts[2].end].starts_with("struct S"));
    }

    #[test]
    fn test_split_params() {
        let parts = split_top_level("a, b = (1, 2), {c, d}, e", false);
        assert_eq!(parts.len(), 4);
        let raw = "x: Dict[str, int] = {}, y";
        let pieces = split_params(raw, raw, false);
        assert_eq!(pieces, vec!["x: Dict[str, int] = {}", "y"]);
    }

    #[test]
    fn test_param_normalizers() {
        assert_eq!(python_param("x: int = 3").as_deref(), Some("x"));
        assert_eq!(python_param("**kwargs").as_deref(), Some("**kwargs"));
        assert_eq!(python_param("*"), None);
        assert_eq!(js_param("{ a,  b }: Props").as_deref(), Some("{ a, b }"));
        assert_eq!(js_param("...rest").as_deref(), Some("...rest"));
        assert_eq!(js_param("count?: number").as_deref(), Some("count"));
        assert_eq!(php_param("?int $limit = 10").as_deref(), Some("limit"));
        assert_eq!(c_declarator_name("const char **argv").as_deref(), Some("argv"));
        assert_eq!(c_declarator_name("int (*cb)(int)").as_deref(), Some("cb"));
        assert_eq!(c_declarator_name("char buf[16]").as_deref(), Some("buf"));
        assert_eq!(c_declarator_name("unsigned flags : 3").as_deref(), Some("flags"));
        assert_eq!(c_declarator_name("void"), None);
    }

    #[test]
    fn test_type_label() {
        assert_eq!(type_label("static const char *").as_deref(), Some("const char*"));
        assert_eq!(type_label("inline std::string & ").as_deref(), Some("std::string&"));
        assert_eq!(type_label("  static "), None);
    }

    #[test]
    fn test_fn_header() {
        let h = parse_fn_header("static int add(int a, int b)").unwrap();
        assert_eq!(h.name, "add");
        assert_eq!(&"static int add(int a, int b)"[h.params.0..h.params.1], "int a, int b");
        assert!(parse_fn_header("int values[] = (1)").is_none());
        assert!(parse_fn_header("if (x)").is_none());
        assert!(parse_fn_header("void Foo::bar()").unwrap().is_qualified());
    }

    #[test]
    fn test_fn_header_after_multibyte_char() {
        let header = "int ×add(int a)";
        let h = parse_fn_header(header).unwrap();
        assert_eq!(h.name, "add");
        assert_eq!(&header[h.name_at..h.name_at + 3], "add");
        assert_eq!(parse_fn_header("→ run()").unwrap().name, "run");
    }

    #[test]
    fn test_template_prefix() {
        let (rest, params) = strip_template_prefix("template <typename T, int N = 3> class Box");
        assert_eq!(rest.trim(), "class Box");
        assert_eq!(template_param_names(params.unwrap()), vec!["T", "N"]);
        assert_eq!(strip_template_prefix("int x").1, None);
    }

    #[test]
    fn test_docstrings() {
        assert_eq!(python_string_value("r\"\"\"Doc.\"\"\""), Some("Doc."));
        assert_eq!(python_string_value("'x'"), Some("x"));
        assert_eq!(
            clean_docstring("Summary.\n\n    Details here.\n    ").as_deref(),
            Some("Summary.\n\nDetails here.")
        );
        assert_eq!(clean_docstring("   "), None);
    }

    #[test]
    fn test_export_kind() {
        let src = "function A() {}\nexport default A;\nexport function B() {}\nexport { C, D as default };\nexport { A };";
        assert_eq!(export_kind(src, "A"), ExportKind::Both);
        assert_eq!(export_kind(src, "B"), ExportKind::Named);
        assert_eq!(export_kind(src, "C"), ExportKind::Named);
        assert_eq!(export_kind(src, "D"), ExportKind::Default);
        assert_eq!(export_kind(src, "E"), ExportKind::None);
    }

    #[test]
    fn test_line_index() {
        let idx = LineIndex::new("a\nbb\nccc");
        assert_eq!(idx.line_of(0), 1);
        assert_eq!(idx.line_of(2), 2);
        assert_eq!(idx.line_of(5), 3);
    }

    #[test]
    fn test_builder_dedups_and_caps() {
        let limits = ExtractionLimits {
            functions: 2,
            ..Default::default()
        };
        let file = SourceFile {
            path: "a.py",
            language: "python",
            text: "x\ny\n",
            limits: &limits,
        };
        let mut b = RecordBuilder::new(&file);
        b.import("os");
        b.import("os");
        b.import("  ");
        b.function(FunctionSymbol::new("f", 1));
        b.function(FunctionSymbol::new("f", 5));
        b.function(FunctionSymbol::new("g", 6));
        b.function(FunctionSymbol::new("h", 7));
        let rec = b.finish();
        assert_eq!(rec.imports, vec!["os"]);
        assert_eq!(rec.functions.len(), 2);
        assert_eq!(rec.functions[0].line, 1);
        assert_eq!(rec.loc, 2);
    }
}
