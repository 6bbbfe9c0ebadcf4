// Console overview of a finished run

use std::collections::BTreeSet;

use crate::index::{FileRecord, TypeDetail, TypeKind};
use crate::indexer::registry::Capability;
use crate::indexer::RunReport;

/// Dependencies listed before the remainder is elided.
const SHOWN_DEPENDENCIES: usize = 10;
const SHOWN_NAMES: usize = 8;

fn in_languages<'a>(records: &'a [FileRecord], tags: &'a [&str]) -> impl Iterator<Item = &'a FileRecord> {
    records.iter().filter(move |r| tags.contains(&r.language.as_str()))
}

fn first_sorted(names: BTreeSet<&str>, n: usize) -> String {
    names.into_iter().take(n).collect::<Vec<_>>().join(", ")
}

/// Renders the overview as lines.
pub fn render(report: &RunReport, capability: Capability) -> Vec<String> {
    let overview = &report.summary.project_overview;
    let records = &report.records;
    let mut out = vec![
        String::new(),
        "🔍 CODEBASE ANALYSIS SUMMARY".to_string(),
        "=".repeat(40),
        format!("Total Files: {}", overview.total_files),
        format!("Total Lines: {}", overview.total_loc),
        format!("Parsing Method: {}", capability.describe()),
        String::new(),
        "Language Breakdown:".to_string(),
    ];
    for (lang, stats) in &overview.languages {
        out.push(format!("  {}: {} files ({} lines)", lang, stats.files, stats.loc));
    }

    let components: Vec<_> = in_languages(records, &["react", "react_ts"])
        .flat_map(|r| r.types_of(TypeKind::Component))
        .collect();
    if !components.is_empty() {
        out.push(String::new());
        out.push(format!("⚛️  React Components: {}", components.len()));
        let hooks: BTreeSet<&str> = components
            .iter()
            .filter_map(|c| match &c.detail {
                TypeDetail::Component { hooks, .. } => Some(hooks),
                _ => None,
            })
            .flatten()
            .map(String::as_str)
            .collect();
        if !hooks.is_empty() {
            out.push(format!("  Common hooks: {}", first_sorted(hooks, SHOWN_NAMES)));
        }
    }

    let php: Vec<&FileRecord> = in_languages(records, &["php"])
        .filter(|r| r.types_of(TypeKind::PhpClass).next().is_some())
        .collect();
    if !php.is_empty() {
        let classes: usize = php.iter().map(|r| r.types_of(TypeKind::PhpClass).count()).sum();
        out.push(String::new());
        out.push(format!("🐘 PHP Classes: {}", classes));
        let namespaces: BTreeSet<&str> = php.iter().filter_map(|r| r.namespace.as_deref()).collect();
        if !namespaces.is_empty() {
            out.push(format!("  Namespaces: {}", namespaces.into_iter().collect::<Vec<_>>().join(", ")));
        }
    }

    let c: Vec<&FileRecord> = in_languages(records, &["c", "c_header"])
        .filter(|r| !r.functions.is_empty() || r.types_of(TypeKind::Struct).next().is_some())
        .collect();
    if !c.is_empty() {
        let functions: usize = c.iter().map(|r| r.functions.len()).sum();
        let structs: usize = c.iter().map(|r| r.types_of(TypeKind::Struct).count()).sum();
        out.push(String::new());
        out.push(format!("🔧 C Code: {} functions, {} structs", functions, structs));
        let includes: BTreeSet<&str> = c
            .iter()
            .flat_map(|r| r.includes.iter().take(5))
            .map(String::as_str)
            .collect();
        if !includes.is_empty() {
            out.push(format!("  Common includes: {}", first_sorted(includes, SHOWN_NAMES)));
        }
    }

    let cpp: Vec<&FileRecord> = in_languages(records, &["cpp", "cpp_header"])
        .filter(|r| !r.functions.is_empty() || r.types_of(TypeKind::CppClass).next().is_some())
        .collect();
    if !cpp.is_empty() {
        let classes: usize = cpp.iter().map(|r| r.types_of(TypeKind::CppClass).count()).sum();
        let functions: usize = cpp.iter().map(|r| r.functions.len()).sum();
        out.push(String::new());
        out.push(format!("⚙️  C++ Code: {} classes, {} functions", classes, functions));
        let namespaces: BTreeSet<&str> = cpp.iter().flat_map(|r| r.namespaces.iter()).map(String::as_str).collect();
        if !namespaces.is_empty() {
            out.push(format!("  Namespaces: {}", namespaces.into_iter().collect::<Vec<_>>().join(", ")));
        }
    }

    if let Some(tables) = &report.summary.database_schema {
        out.push(String::new());
        out.push(format!("🗄️  Database Tables: {}", tables.len()));
        let related = tables.iter().filter(|t| !t.foreign_keys.is_empty()).count();
        out.push(format!("  Tables with relationships: {}", related));
    }

    out.push(String::new());
    out.push("Key Dependencies:".to_string());
    let deps = &overview.external_dependencies;
    for dep in deps.iter().take(SHOWN_DEPENDENCIES) {
        out.push(format!("  • {}", dep));
    }
    if deps.len() > SHOWN_DEPENDENCIES {
        out.push(format!("  ... and {} more", deps.len() - SHOWN_DEPENDENCIES));
    }
    out
}

pub fn print_summary(report: &RunReport, capability: Capability) {
    for line in render(report, capability) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SummaryLimits;
    use crate::index::summary::IndexAssembler;
    use crate::index::{ExportKind, TypeSymbol};
    use crate::indexer::resolver::DependencyResolver;
    use crate::indexer::ScanStats;
    use std::path::PathBuf;

    fn component(name: &str, hooks: &[&str]) -> TypeSymbol {
        TypeSymbol::new(
            name,
            1,
            TypeDetail::Component {
                props: Vec::new(),
                hooks: hooks.iter().map(|h| h.to_string()).collect(),
                export: ExportKind::Named,
            },
        )
    }

    #[test]
    fn test_render_sections() {
        let mut ui = FileRecord::minimal("ui/App.jsx", "react", 30);
        ui.types = vec![component("App", &["useState", "useEffect"]), component("Nav", &["useState"])];
        let mut util = FileRecord::minimal("util.py", "python", 12);
        util.imports = (0..12).map(|i| format!("pkg{:02}", i)).collect();
        let records = vec![ui, util];

        let resolution = DependencyResolver::new(&records).resolve(&records);
        let summary = IndexAssembler::new(&SummaryLimits::default()).assemble(&records, &resolution, None);
        let report = RunReport {
            summary,
            records,
            stats: ScanStats::default(),
            output: PathBuf::from("codebase_index.json"),
            cache: PathBuf::from(".codebase_cache.json"),
            cache_written: true,
        };

        let lines = render(&report, Capability { grammar: false });
        assert!(lines.contains(&"Total Lines: 42".to_string()));
        assert!(lines.contains(&"Parsing Method: regex (heuristic)".to_string()));
        assert!(lines.contains(&"  python: 1 files (12 lines)".to_string()));
        assert!(lines.contains(&"⚛️  React Components: 2".to_string()));
        assert!(lines.contains(&"  Common hooks: useEffect, useState".to_string()));
        assert!(lines.contains(&"  ... and 2 more".to_string()));
        assert!(!lines.iter().any(|l| l.contains("PHP")));
    }
}
