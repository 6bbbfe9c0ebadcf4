// Extractor dispatch and strategy selection

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use super::language::{ExtractorKind, Language};
use super::parser::{c, cpp, generic, javascript, php, python};
use crate::config::ExtractionLimits;
use crate::index::{Extractor, FileRecord, SourceFile};

/// Which extraction strategies this registry may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub grammar: bool,
}

impl Capability {
    /// Grammar extraction needs the `tree-sitter` feature and can be turned
    /// off at runtime.
    pub fn detect(no_grammar: bool) -> Self {
        Self {
            grammar: cfg!(feature = "tree-sitter") && !no_grammar,
        }
    }

    pub fn describe(&self) -> &'static str {
        if self.grammar {
            "tree-sitter (grammar-aware)"
        } else {
            "regex (heuristic)"
        }
    }
}

/// Outcome of extracting one file.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Full(FileRecord),
    /// Extraction failed; the minimal record keeps the file in the index.
    Degraded { record: FileRecord, reason: String },
}

impl Extraction {
    pub fn into_record(self) -> FileRecord {
        match self {
            Extraction::Full(record) | Extraction::Degraded { record, .. } => record,
        }
    }
}

/// Owns one extractor per language family.
pub struct ExtractorRegistry {
    extractors: HashMap<ExtractorKind, Box<dyn Extractor>>,
    capability: Capability,
    limits: ExtractionLimits,
}

impl ExtractorRegistry {
    pub fn new(capability: Capability, limits: ExtractionLimits) -> Self {
        let mut extractors: HashMap<ExtractorKind, Box<dyn Extractor>> = HashMap::new();

        extractors.insert(ExtractorKind::Python, Box::new(python::PythonExtractor::new()));
        extractors.insert(ExtractorKind::JsReact, Box::new(javascript::JsExtractor::new()));
        extractors.insert(ExtractorKind::Php, Box::new(php::PhpExtractor::new()));
        extractors.insert(ExtractorKind::C, Box::new(c::CExtractor::new()));
        extractors.insert(ExtractorKind::Cpp, Box::new(cpp::CppExtractor::new()));
        extractors.insert(ExtractorKind::Generic, Box::new(generic::GenericExtractor::new()));

        Self {
            extractors,
            capability,
            limits,
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Extracts a record from raw file bytes. Never fails: any problem is
    /// reported as a degraded extraction.
    pub fn extract(&self, path: &str, language: Language, bytes: &[u8]) -> Extraction {
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                let loc = String::from_utf8_lossy(bytes).lines().count();
                return Extraction::Degraded {
                    record: FileRecord::minimal(path, language.tag, loc),
                    reason: format!("not valid UTF-8: {}", e),
                };
            }
        };

        let file = SourceFile {
            path,
            language: language.tag,
            text,
            limits: &self.limits,
        };
        let Some(extractor) = self.extractors.get(&language.kind) else {
            return Extraction::Degraded {
                record: FileRecord::minimal(path, language.tag, file.loc()),
                reason: format!("no extractor registered for {}", language.kind),
            };
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(extractor.as_ref(), &file)));
        match outcome {
            Ok(Ok(record)) => Extraction::Full(record),
            Ok(Err(e)) => Extraction::Degraded {
                record: FileRecord::minimal(path, language.tag, file.loc()),
                reason: e.to_string(),
            },
            Err(_) => Extraction::Degraded {
                record: FileRecord::minimal(path, language.tag, file.loc()),
                reason: format!("{} extractor panicked", extractor.name()),
            },
        }
    }

    fn run(&self, extractor: &dyn Extractor, file: &SourceFile<'_>) -> anyhow::Result<FileRecord> {
        #[cfg(feature = "tree-sitter")]
        if self.capability.grammar {
            match extractor.extract_grammar(file) {
                Ok(record) => return Ok(record),
                Err(e) => debug!(
                    "Grammar extraction failed for {}, using heuristics: {}",
                    file.path, e
                ),
            }
        }
        debug!("Heuristic {} extraction for {}", extractor.name(), file.path);
        extractor.extract_heuristic(file)
    }
}
