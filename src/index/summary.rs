// Output index assembly

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::schema::{ForeignKey, TableDescriptor};
use super::{FileRecord, FunctionSymbol, TypeDetail, TypeKind, TypeSymbol};
use crate::config::SummaryLimits;
use crate::indexer::resolver::Resolution;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub project_overview: ProjectOverview,
    pub dependency_map: BTreeMap<String, Vec<String>>,
    pub files: Vec<FileSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_schema: Option<Vec<TableSummary>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectOverview {
    pub total_files: usize,
    pub total_loc: usize,
    pub languages: BTreeMap<String, LanguageStats>,
    pub external_dependencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub files: usize,
    pub loc: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub language: String,
    pub loc: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<ClassSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub react_components: Vec<ComponentSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub php_classes: Vec<PhpClassSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defines: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structs: Vec<StructSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpp_classes: Vec<CppClassSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSummary {
    pub name: String,
    pub args: Vec<String>,
    pub doc: Option<String>,
    pub return_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub name: String,
    pub bases: Vec<String>,
    pub methods: Vec<String>,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub name: String,
    pub props: Vec<String>,
    pub hooks: Vec<String>,
    pub export_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhpClassSummary {
    pub name: String,
    pub namespace: Option<String>,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub methods: Vec<String>,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructSummary {
    pub name: String,
    pub members: Vec<String>,
    pub is_typedef: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CppClassSummary {
    pub name: String,
    pub methods: Vec<String>,
    pub bases: Vec<String>,
    pub is_template: bool,
    pub template_params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub table: String,
    pub columns: Vec<ColumnSummary>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<String>,
    pub sample_records: usize,
}

impl From<&TableDescriptor> for TableSummary {
    fn from(table: &TableDescriptor) -> Self {
        Self {
            table: table.name.clone(),
            columns: table
                .columns
                .iter()
                .map(|c| ColumnSummary {
                    name: c.name.clone(),
                    data_type: c.data_type.clone(),
                    nullable: c.nullable,
                    key: c.key.clone(),
                })
                .collect(),
            foreign_keys: table.foreign_keys.clone(),
            indexes: table.indexes.clone(),
            sample_records: table.sample_rows,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn capped(items: &[String], cap: usize) -> Vec<String> {
    items.iter().take(cap).cloned().collect()
}

/// The package-level name of an import nothing in the tree resolved to:
/// `lodash/fp` is `lodash`, `@scope/pkg/sub@2` is `@scope/pkg` and
/// `os.path` is `os`. Relative and absolute paths have none.
pub fn external_name(import: &str) -> Option<String> {
    let import = import.trim().trim_start_matches('\\');
    if import.is_empty() || import.starts_with('.') || import.starts_with('/') {
        return None;
    }

    let name = if let Some(scoped) = import.strip_prefix('@') {
        let mut parts = scoped.splitn(3, '/');
        let scope = parts.next().unwrap_or("");
        let package = parts.next().unwrap_or("");
        let package = package.split('@').next().unwrap_or(package);
        if package.is_empty() {
            format!("@{}", scope)
        } else {
            format!("@{}/{}", scope, package)
        }
    } else {
        let head = import.split('@').next().unwrap_or(import);
        let head = head.split(['/', '\\']).next().unwrap_or(head);
        head.split('.').next().unwrap_or(head).to_string()
    };

    (!name.is_empty() && name != "@").then_some(name)
}

/// Builds the output index from the run's records.
pub struct IndexAssembler<'a> {
    limits: &'a SummaryLimits,
}

impl<'a> IndexAssembler<'a> {
    pub fn new(limits: &'a SummaryLimits) -> Self {
        Self { limits }
    }

    pub fn assemble(
        &self,
        records: &[FileRecord],
        resolution: &Resolution,
        schema: Option<&[TableDescriptor]>,
    ) -> Summary {
        let mut sorted: Vec<&FileRecord> = records.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        let mut languages: BTreeMap<String, LanguageStats> = BTreeMap::new();
        for record in &sorted {
            let stats = languages.entry(record.language.clone()).or_default();
            stats.files += 1;
            stats.loc += record.loc;
        }

        let external: BTreeSet<String> = resolution
            .unresolved
            .iter()
            .filter_map(|import| external_name(import))
            .collect();

        Summary {
            project_overview: ProjectOverview {
                total_files: sorted.len(),
                total_loc: sorted.iter().map(|r| r.loc).sum(),
                languages,
                external_dependencies: external.into_iter().collect(),
            },
            dependency_map: resolution.map.clone(),
            files: sorted.iter().map(|r| self.file_summary(r)).collect(),
            database_schema: schema
                .filter(|tables| !tables.is_empty())
                .map(|tables| tables.iter().map(TableSummary::from).collect()),
        }
    }

    fn doc(&self, doc: &Option<String>) -> Option<String> {
        doc.as_deref().map(|d| truncate(d, self.limits.doc))
    }

    fn method_names(&self, ty: &TypeSymbol) -> Vec<String> {
        ty.methods
            .iter()
            .take(self.limits.methods)
            .map(|m| m.name.clone())
            .collect()
    }

    fn function(&self, f: &FunctionSymbol) -> FunctionSummary {
        FunctionSummary {
            name: f.name.clone(),
            args: f.args.clone(),
            doc: self.doc(&f.docstring),
            return_type: f.return_type.clone(),
        }
    }

    pub fn file_summary(&self, record: &FileRecord) -> FileSummary {
        let l = self.limits;
        let types = |kind: TypeKind, cap: usize| record.types_of(kind).take(cap).collect::<Vec<_>>();

        let classes = types(TypeKind::Class, l.classes)
            .into_iter()
            .map(|c| ClassSummary {
                name: c.name.clone(),
                bases: c.bases.clone(),
                methods: self.method_names(c),
                doc: self.doc(&c.docstring),
            })
            .collect();

        let react_components = types(TypeKind::Component, l.components)
            .into_iter()
            .filter_map(|c| match &c.detail {
                TypeDetail::Component { props, hooks, export } => Some(ComponentSummary {
                    name: c.name.clone(),
                    props: props.clone(),
                    hooks: hooks.clone(),
                    export_type: export.as_str().to_string(),
                }),
                _ => None,
            })
            .collect();

        let php_classes = types(TypeKind::PhpClass, l.classes)
            .into_iter()
            .filter_map(|c| match &c.detail {
                TypeDetail::PhpClass {
                    namespace,
                    implements,
                    properties,
                } => Some(PhpClassSummary {
                    name: c.name.clone(),
                    namespace: namespace.clone(),
                    extends: c.bases.first().cloned(),
                    implements: implements.clone(),
                    methods: self.method_names(c),
                    properties: capped(properties, l.properties),
                }),
                _ => None,
            })
            .collect();

        let structs = types(TypeKind::Struct, l.structs)
            .into_iter()
            .filter_map(|s| match &s.detail {
                TypeDetail::Struct { members, is_typedef } => Some(StructSummary {
                    name: s.name.clone(),
                    members: capped(members, l.members),
                    is_typedef: *is_typedef,
                }),
                _ => None,
            })
            .collect();

        let cpp_classes = types(TypeKind::CppClass, l.classes)
            .into_iter()
            .filter_map(|c| match &c.detail {
                TypeDetail::CppClass {
                    is_template,
                    template_params,
                    ..
                } => Some(CppClassSummary {
                    name: c.name.clone(),
                    methods: self.method_names(c),
                    bases: c.bases.clone(),
                    is_template: *is_template,
                    template_params: template_params.clone(),
                }),
                _ => None,
            })
            .collect();

        FileSummary {
            path: record.path.clone(),
            language: record.language.clone(),
            loc: record.loc,
            description: record.docstring.as_deref().map(|d| truncate(d, l.description)),
            imports: capped(&record.imports, l.imports),
            functions: record
                .functions
                .iter()
                .take(l.functions)
                .map(|f| self.function(f))
                .collect(),
            classes,
            react_components,
            php_classes,
            includes: capped(&record.includes, l.includes),
            defines: capped(&record.defines, l.defines),
            structs,
            cpp_classes,
            namespaces: capped(&record.namespaces, l.namespaces),
            namespace: record.namespace.clone(),
            key_variables: capped(&record.variables, l.variables),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::schema::ColumnDescriptor;
    use crate::index::ExportKind;
    use crate::indexer::resolver::DependencyResolver;

    fn python(path: &str, loc: usize, imports: &[&str]) -> FileRecord {
        let mut r = FileRecord::minimal(path, "python", loc);
        r.imports = imports.iter().map(|s| s.to_string()).collect();
        r
    }

    #[test]
    fn test_overview_and_external_dependencies() {
        let mut web = FileRecord::minimal("web/App.jsx", "react", 7);
        web.imports = vec![
            "react".to_string(),
            "@tanstack/react-query/devtools".to_string(),
            "./missing".to_string(),
        ];
        let records = vec![
            python("app/main.py", 10, &["os.path", "app.util", "requests"]),
            python("app/util.py", 5, &[]),
            web,
        ];
        let resolution = DependencyResolver::new(&records).resolve(&records);
        let summary = IndexAssembler::new(&SummaryLimits::default()).assemble(&records, &resolution, None);

        let overview = &summary.project_overview;
        assert_eq!(overview.total_files, 3);
        assert_eq!(overview.total_loc, 22);
        assert_eq!(overview.languages["python"], LanguageStats { files: 2, loc: 15 });
        assert_eq!(overview.languages["react"], LanguageStats { files: 1, loc: 7 });
        assert_eq!(overview.external_dependencies, vec!["@tanstack/react-query", "os", "react", "requests"]);
        assert_eq!(summary.dependency_map["app/main.py"], vec!["os.path", "app/util.py", "requests"]);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("database_schema").is_none());
        assert!(json["files"][0].get("functions").is_none());
    }

    #[test]
    fn test_external_name() {
        assert_eq!(external_name("lodash/fp").as_deref(), Some("lodash"));
        assert_eq!(external_name("lodash@4.17.21").as_deref(), Some("lodash"));
        assert_eq!(external_name("@scope/pkg@2/sub").as_deref(), Some("@scope/pkg"));
        assert_eq!(external_name("sys/types.h").as_deref(), Some("sys"));
        assert_eq!(external_name("\\Illuminate\\Support\\Str").as_deref(), Some("Illuminate"));
        assert_eq!(external_name("../lib/api"), None);
        assert_eq!(external_name(""), None);
    }

    #[test]
    fn test_per_file_caps() {
        let limits = SummaryLimits {
            functions: 2,
            methods: 1,
            doc: 5,
            description: 4,
            ..SummaryLimits::default()
        };
        let mut rec = FileRecord::minimal("ui/Card.jsx", "react", 40);
        rec.docstring = Some("Card widgets".to_string());
        for name in ["a", "b", "c"] {
            let mut f = FunctionSymbol::new(name, 1);
            f.docstring = Some("long documentation".to_string());
            rec.functions.push(f);
        }
        let mut class = TypeSymbol::new("Store", 3, TypeDetail::Class);
        class.methods = vec![FunctionSymbol::new("get", 4), FunctionSymbol::new("set", 5)];
        rec.types.push(class);
        rec.types.push(TypeSymbol::new(
            "Card",
            9,
            TypeDetail::Component {
                props: vec!["title".to_string()],
                hooks: vec!["useState".to_string()],
                export: ExportKind::Both,
            },
        ));

        let entry = IndexAssembler::new(&limits).file_summary(&rec);
        assert_eq!(entry.description.as_deref(), Some("Card"));
        assert_eq!(entry.functions.len(), 2);
        assert_eq!(entry.functions[0].doc.as_deref(), Some("long "));
        assert_eq!(entry.classes[0].methods, vec!["get"]);
        assert_eq!(entry.react_components[0].export_type, "both");

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["react_components"][0]["hooks"][0], "useState");
        assert!(json.get("php_classes").is_none());
    }

    #[test]
    fn test_schema_section() {
        let tables = vec![TableDescriptor {
            name: "users".to_string(),
            columns: vec![ColumnDescriptor {
                name: "id".to_string(),
                data_type: "INTEGER".to_string(),
                nullable: false,
                default: None,
                key: Some("PRI".to_string()),
            }],
            foreign_keys: Vec::new(),
            indexes: vec!["idx_email".to_string()],
            sample_rows: 3,
        }];
        let records = vec![python("a.py", 1, &[])];
        let resolution = DependencyResolver::new(&records).resolve(&records);
        let limits = SummaryLimits::default();
        let assembler = IndexAssembler::new(&limits);

        let summary = assembler.assemble(&records, &resolution, Some(tables.as_slice()));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["database_schema"][0]["table"], "users");
        assert_eq!(json["database_schema"][0]["columns"][0]["type"], "INTEGER");
        assert_eq!(json["database_schema"][0]["sample_records"], 3);
        assert!(json["database_schema"][0]["columns"][0].get("default").is_none());

        let empty = assembler.assemble(&records, &resolution, Some(&[][..]));
        assert!(empty.database_schema.is_none());
    }
}
