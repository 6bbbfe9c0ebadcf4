// Import-to-file resolution by file stem

use std::collections::{BTreeMap, BTreeSet};

use crate::index::FileRecord;

/// Dependency references per file, plus the imports nothing in the tree
/// answered to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub map: BTreeMap<String, Vec<String>>,
    pub unresolved: BTreeSet<String>,
}

/// Matches import strings against the stems of the other files in a run.
///
/// This is name matching, not module resolution: an import resolves to the
/// first file in path order whose stem it contains or is contained by, so
/// unrelated files sharing a stem fragment can be picked.
pub struct DependencyResolver<'a> {
    targets: Vec<(&'a str, &'a str)>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(records: &'a [FileRecord]) -> Self {
        let mut targets: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.path.as_str(), r.stem()))
            .filter(|(_, stem)| !stem.is_empty())
            .collect();
        targets.sort_by(|a, b| a.0.cmp(b.0));
        Self { targets }
    }

    pub fn resolve_import(&self, import: &str, from: &str) -> Option<&'a str> {
        if import.is_empty() {
            return None;
        }
        self.targets
            .iter()
            .filter(|(path, _)| *path != from)
            .find(|(_, stem)| import.contains(stem) || stem.contains(import))
            .map(|(path, _)| *path)
    }

    pub fn resolve(&self, records: &[FileRecord]) -> Resolution {
        let mut resolution = Resolution::default();
        for record in records {
            let mut refs: Vec<String> = Vec::with_capacity(record.imports.len());
            for import in &record.imports {
                let reference = match self.resolve_import(import, &record.path) {
                    Some(path) => path.to_string(),
                    None => {
                        resolution.unresolved.insert(import.clone());
                        import.clone()
                    }
                };
                if !refs.contains(&reference) {
                    refs.push(reference);
                }
            }
            resolution.map.insert(record.path.clone(), refs);
        }
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(path: &str, imports: &[&str]) -> FileRecord {
        let mut r = FileRecord::minimal(path, "python", 1);
        r.imports = imports.iter().map(|s| s.to_string()).collect();
        r
    }

    #[test]
    fn test_import_resolves_to_file() {
        let records = vec![rec("app/main.py", &["pkg.helpers", "requests"]), rec("pkg/helpers.py", &[])];
        let resolution = DependencyResolver::new(&records).resolve(&records);
        assert_eq!(resolution.map["app/main.py"], vec!["pkg/helpers.py", "requests"]);
        assert_eq!(resolution.map["pkg/helpers.py"], Vec::<String>::new());
        assert_eq!(resolution.unresolved, BTreeSet::from(["requests".to_string()]));
    }

    #[test]
    fn test_never_resolves_to_self() {
        let records = vec![rec("src/api.js", &["./api-client"])];
        let resolution = DependencyResolver::new(&records).resolve(&records);
        assert_eq!(resolution.map["src/api.js"], vec!["./api-client"]);
    }

    #[test]
    fn test_stem_collision_picks_first_in_path_order() {
        // `config` is contained in the stem `config_loader`; the loader sorts
        // first and wins even though `config.py` is the intended target.
        let records = vec![
            rec("main.py", &["config"]),
            rec("config.py", &[]),
            rec("app/config_loader.py", &[]),
        ];
        let resolution = DependencyResolver::new(&records).resolve(&records);
        assert_eq!(resolution.map["main.py"], vec!["app/config_loader.py"]);
    }

    #[test]
    fn test_references_are_deduplicated() {
        let records = vec![rec("a.py", &["b", "pkg.b"]), rec("b.py", &[])];
        let resolution = DependencyResolver::new(&records).resolve(&records);
        assert_eq!(resolution.map["a.py"], vec!["b.py"]);
        assert!(resolution.unresolved.is_empty());
    }
}
