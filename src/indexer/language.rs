// File extension to language tag mapping

use std::fmt;
use std::path::Path;

/// Extractor family responsible for a language tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    Python,
    JsReact,
    Php,
    C,
    Cpp,
    Generic,
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractorKind::Python => "python",
            ExtractorKind::JsReact => "js/react",
            ExtractorKind::Php => "php",
            ExtractorKind::C => "c",
            ExtractorKind::Cpp => "cpp",
            ExtractorKind::Generic => "generic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub tag: &'static str,
    pub kind: ExtractorKind,
}

/// Extension (lowercase, without dot), language tag, extractor.
pub const LANGUAGES: &[(&str, &str, ExtractorKind)] = &[
    ("py", "python", ExtractorKind::Python),
    ("js", "javascript", ExtractorKind::JsReact),
    ("mjs", "javascript", ExtractorKind::JsReact),
    ("cjs", "javascript", ExtractorKind::JsReact),
    ("ts", "typescript", ExtractorKind::JsReact),
    ("jsx", "react", ExtractorKind::JsReact),
    ("tsx", "react_ts", ExtractorKind::JsReact),
    ("php", "php", ExtractorKind::Php),
    ("c", "c", ExtractorKind::C),
    ("h", "c_header", ExtractorKind::C),
    ("cpp", "cpp", ExtractorKind::Cpp),
    ("cc", "cpp", ExtractorKind::Cpp),
    ("cxx", "cpp", ExtractorKind::Cpp),
    ("c++", "cpp", ExtractorKind::Cpp),
    ("hpp", "cpp_header", ExtractorKind::Cpp),
    ("hh", "cpp_header", ExtractorKind::Cpp),
    ("hxx", "cpp_header", ExtractorKind::Cpp),
    ("h++", "cpp_header", ExtractorKind::Cpp),
    ("cs", "csharp", ExtractorKind::Generic),
    ("java", "java", ExtractorKind::Generic),
    ("go", "go", ExtractorKind::Generic),
    ("rs", "rust", ExtractorKind::Generic),
    ("rb", "ruby", ExtractorKind::Generic),
    ("swift", "swift", ExtractorKind::Generic),
    ("kt", "kotlin", ExtractorKind::Generic),
    ("scala", "scala", ExtractorKind::Generic),
    ("sql", "sql", ExtractorKind::Generic),
    ("sh", "shell", ExtractorKind::Generic),
    ("yaml", "yaml", ExtractorKind::Generic),
    ("yml", "yaml", ExtractorKind::Generic),
    ("json", "json", ExtractorKind::Generic),
    ("xml", "xml", ExtractorKind::Generic),
    ("html", "html", ExtractorKind::Generic),
    ("css", "css", ExtractorKind::Generic),
    ("md", "markdown", ExtractorKind::Generic),
    ("dockerfile", "dockerfile", ExtractorKind::Generic),
    ("toml", "toml", ExtractorKind::Generic),
];

impl Language {
    /// Pure function of the file extension.
    pub fn detect(path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::from_extension(&ext)
    }

    pub fn from_extension(ext: &str) -> Option<Language> {
        LANGUAGES
            .iter()
            .find(|(e, _, _)| *e == ext)
            .map(|&(_, tag, kind)| Language { tag, kind })
    }

    /// Dialects where capitalized declarations are treated as components.
    pub fn is_component_dialect(tag: &str) -> bool {
        matches!(tag, "react" | "react_ts")
    }

    pub fn is_typescript(tag: &str) -> bool {
        matches!(tag, "typescript" | "react_ts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        let lang = Language::detect(Path::new("src/App.TSX")).unwrap();
        assert_eq!(lang.tag, "react_ts");
        assert_eq!(lang.kind, ExtractorKind::JsReact);

        assert_eq!(Language::detect(Path::new("a/b.h")).unwrap().tag, "c_header");
        assert_eq!(Language::detect(Path::new("a/b.hpp")).unwrap().kind, ExtractorKind::Cpp);
        assert_eq!(Language::detect(Path::new("main.go")).unwrap().kind, ExtractorKind::Generic);
        assert!(Language::detect(Path::new("README")).is_none());
        assert!(Language::detect(Path::new("image.png")).is_none());
    }

    #[test]
    fn test_dialects() {
        assert!(Language::is_component_dialect("react"));
        assert!(!Language::is_component_dialect("javascript"));
        assert!(Language::is_typescript("react_ts"));
    }
}
