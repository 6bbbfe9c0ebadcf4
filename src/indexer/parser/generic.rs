// Fallback for recognized languages without a dedicated extractor

use crate::index::{Extractor, FileRecord, SourceFile};

pub struct GenericExtractor;

impl GenericExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for GenericExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    #[cfg(feature = "tree-sitter")]
    fn extract_grammar(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        self.extract_heuristic(file)
    }

    fn extract_heuristic(&self, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        Ok(FileRecord::minimal(file.path, file.language, file.loc()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionLimits;

    #[test]
    fn test_minimal_record() {
        let limits = ExtractionLimits::default();
        let file = SourceFile {
            path: "cmd/main.go",
            language: "go",
            text: "package main\n\nfunc main() {}\n",
            limits: &limits,
        };
        let rec = GenericExtractor::new().extract_heuristic(&file).unwrap();
        assert_eq!(rec, FileRecord::minimal("cmd/main.go", "go", 3));
        assert!(rec.functions.is_empty());
    }
}
