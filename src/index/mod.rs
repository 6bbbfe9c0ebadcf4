// Index data model shared by extraction, caching and assembly

pub mod cache;
pub mod schema;
pub mod summary;

use serde::{Deserialize, Serialize};

use crate::config::ExtractionLimits;

/// The normalized per-file extraction result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the project root, `/`-separated.
    pub path: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    pub loc: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defines: Vec<String>,
    /// Namespaces declared or pulled in with `using namespace`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    /// The file's own namespace (PHP).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionSymbol>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeSymbol>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
}

impl FileRecord {
    /// The record kept for a file whose extraction failed.
    pub fn minimal(path: &str, language: &str, loc: usize) -> Self {
        Self {
            path: path.to_string(),
            language: language.to_string(),
            loc,
            ..Default::default()
        }
    }

    pub fn stem(&self) -> &str {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }

    pub fn types_of(&self, kind: TypeKind) -> impl Iterator<Item = &TypeSymbol> {
        self.types.iter().filter(move |t| t.detail.kind() == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionSymbol {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    pub line: usize,
}

impl FunctionSymbol {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
            ..Default::default()
        }
    }
}

/// A class, struct or component together with its own members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSymbol {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<FunctionSymbol>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    pub detail: TypeDetail,
}

impl TypeSymbol {
    pub fn new(name: impl Into<String>, line: usize, detail: TypeDetail) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            bases: Vec::new(),
            line,
            docstring: None,
            detail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Component,
    PhpClass,
    Struct,
    CppClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDetail {
    Class,
    Component {
        #[serde(default)]
        props: Vec<String>,
        #[serde(default)]
        hooks: Vec<String>,
        export: ExportKind,
    },
    PhpClass {
        #[serde(default)]
        namespace: Option<String>,
        #[serde(default)]
        implements: Vec<String>,
        #[serde(default)]
        properties: Vec<String>,
    },
    Struct {
        #[serde(default)]
        members: Vec<String>,
        is_typedef: bool,
    },
    CppClass {
        #[serde(default)]
        members: Vec<String>,
        is_template: bool,
        #[serde(default)]
        template_params: Vec<String>,
    },
}

impl TypeDetail {
    pub fn kind(&self) -> TypeKind {
        match self {
            TypeDetail::Class => TypeKind::Class,
            TypeDetail::Component { .. } => TypeKind::Component,
            TypeDetail::PhpClass { .. } => TypeKind::PhpClass,
            TypeDetail::Struct { .. } => TypeKind::Struct,
            TypeDetail::CppClass { .. } => TypeKind::CppClass,
        }
    }
}

/// How a component is exported from its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Default,
    Named,
    Both,
    None,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Default => "default",
            ExportKind::Named => "named",
            ExportKind::Both => "both",
            ExportKind::None => "none",
        }
    }
}

/// A file handed to an extractor: already classified, read and decoded.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    pub path: &'a str,
    pub language: &'a str,
    pub text: &'a str,
    pub limits: &'a ExtractionLimits,
}

impl SourceFile<'_> {
    pub fn loc(&self) -> usize {
        self.text.lines().count()
    }

    pub fn extension(&self) -> &str {
        match self.path.rsplit('/').next().and_then(|n| n.rsplit_once('.')) {
            Some((_, ext)) => ext,
            None => "",
        }
    }
}

/// Extraction contract implemented once per language family.
///
/// Both strategies must produce the same record shape; callers cannot tell
/// which one ran.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Grammar-aware strategy.
    #[cfg(feature = "tree-sitter")]
    fn extract_grammar(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord>;

    /// Regex-based strategy, always available.
    fn extract_heuristic(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_stem() {
        let rec = FileRecord::minimal("src/utils/helpers.test.js", "javascript", 3);
        assert_eq!(rec.stem(), "helpers.test");
        let rec = FileRecord::minimal("Makefile", "generic", 0);
        assert_eq!(rec.stem(), "Makefile");
        let rec = FileRecord::minimal("conf/.env", "generic", 0);
        assert_eq!(rec.stem(), ".env");
    }

    #[test]
    fn test_type_detail_json_shape() {
        let ty = TypeSymbol::new(
            "Button",
            4,
            TypeDetail::Component {
                props: vec!["label".to_string()],
                hooks: vec!["useState".to_string()],
                export: ExportKind::Default,
            },
        );
        let json = serde_json::to_value(&ty).unwrap();
        assert_eq!(json["detail"]["kind"], "component");
        assert_eq!(json["detail"]["export"], "default");
        assert!(json.get("methods").is_none());

        let back: TypeSymbol = serde_json::from_value(json).unwrap();
        assert_eq!(back, ty);
    }
}
