// Decides which files are worth extracting

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::Context;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{Config, MinifiedConfig};

/// Bytes read when sampling a file for minification.
const MINIFIED_SAMPLE_BYTES: u64 = 64 * 1024;

static LIBRARY_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?)[-._]v?\d+(?:\.\d+)*.*$").unwrap());
static PACKED_OPERATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+[=+\-*/]{1,2}\w+").unwrap());
static SINGLE_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z]\b").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Matched an ignore pattern.
    Pattern(String),
    /// The path runs through a vendor directory.
    VendorPath(String),
    /// The file name is a known third-party library.
    KnownLibrary(String),
    Minified,
    Oversized(u64),
    /// The file header carries a licence or generated-file marker.
    VendorMarker(String),
}

/// Skip tallies the run reports at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCategory {
    Pattern,
    Vendor,
    Minified,
    Oversized,
}

impl IgnoreReason {
    pub fn category(&self) -> SkipCategory {
        match self {
            IgnoreReason::Pattern(_) => SkipCategory::Pattern,
            IgnoreReason::VendorPath(_) | IgnoreReason::KnownLibrary(_) | IgnoreReason::VendorMarker(_) => {
                SkipCategory::Vendor
            }
            IgnoreReason::Minified => SkipCategory::Minified,
            IgnoreReason::Oversized(_) => SkipCategory::Oversized,
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::Pattern(p) => write!(f, "matches ignore pattern '{}'", p),
            IgnoreReason::VendorPath(p) => write!(f, "inside vendor path '{}'", p),
            IgnoreReason::KnownLibrary(l) => write!(f, "known library '{}'", l),
            IgnoreReason::Minified => f.write_str("minified content"),
            IgnoreReason::Oversized(size) => write!(f, "oversized ({} bytes)", size),
            IgnoreReason::VendorMarker(m) => write!(f, "vendor marker '{}'", m),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Ignore(IgnoreReason),
}

/// Ordered path and content heuristics, cheapest first.
#[derive(Debug)]
pub struct PathClassifier {
    /// Patterns compared against single path components.
    names: HashSet<String>,
    /// Patterns spanning several components, e.g. `public/assets`.
    fragments: Vec<String>,
    /// Glob patterns matched against the file name.
    name_globs: GlobSet,
    name_glob_patterns: Vec<String>,
    /// Glob patterns matched against the whole relative path.
    path_globs: GlobSet,
    path_glob_patterns: Vec<String>,
    vendor_indicators: Vec<String>,
    libraries: Vec<String>,
    library_suffixes: Vec<String>,
    markers: Vec<(String, String)>,
    scan_markers: bool,
    marker_sample_bytes: usize,
    max_file_size: u64,
    minified: MinifiedConfig,
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn glob_set(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid ignore pattern '{}'", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

impl PathClassifier {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let indexing = &config.indexing;

        let mut names = HashSet::new();
        let mut fragments = Vec::new();
        let mut name_glob_patterns = Vec::new();
        let mut path_glob_patterns = Vec::new();
        for pattern in &indexing.ignore_patterns {
            let pattern = pattern.trim().trim_matches('/');
            if pattern.is_empty() {
                continue;
            }
            match (is_glob(pattern), pattern.contains('/')) {
                (true, true) => path_glob_patterns.push(pattern.to_string()),
                (true, false) => name_glob_patterns.push(pattern.to_string()),
                (false, true) => fragments.push(pattern.to_string()),
                (false, false) => {
                    names.insert(pattern.to_string());
                }
            }
        }

        Ok(Self {
            names,
            fragments,
            name_globs: glob_set(&name_glob_patterns)?,
            name_glob_patterns,
            path_globs: glob_set(&path_glob_patterns)?,
            path_glob_patterns,
            vendor_indicators: indexing.vendor_indicators.iter().map(|v| v.to_lowercase()).collect(),
            libraries: indexing
                .library_patterns
                .iter()
                .map(|l| library_base(&l.to_lowercase()))
                .filter(|l| !l.is_empty())
                .collect(),
            library_suffixes: indexing.library_suffixes.iter().map(|s| s.to_lowercase()).collect(),
            markers: indexing
                .vendor_markers
                .iter()
                .map(|m| (m.clone(), m.to_lowercase()))
                .collect(),
            scan_markers: indexing.scan_content_markers,
            marker_sample_bytes: indexing.marker_sample_bytes,
            max_file_size: indexing.max_file_size,
            minified: config.minified.clone(),
        })
    }

    /// Classifies a file. `rel` is the `/`-separated path relative to the
    /// project root and `size` its length in bytes.
    pub fn classify(&self, path: &Path, rel: &str, size: u64) -> Verdict {
        if let Some(pattern) = self.pattern_match(rel) {
            return Verdict::Ignore(IgnoreReason::Pattern(pattern));
        }
        if let Some(indicator) = self.vendor_path(rel) {
            return Verdict::Ignore(IgnoreReason::VendorPath(indicator));
        }
        if let Some(library) = self.known_library(rel) {
            return Verdict::Ignore(IgnoreReason::KnownLibrary(library));
        }
        if self.is_minified(path, rel) {
            return Verdict::Ignore(IgnoreReason::Minified);
        }
        if size > self.max_file_size {
            return Verdict::Ignore(IgnoreReason::Oversized(size));
        }
        if self.scan_markers {
            if let Some(marker) = self.vendor_marker(path) {
                return Verdict::Ignore(IgnoreReason::VendorMarker(marker));
            }
        }
        Verdict::Keep
    }

    /// Whether a directory can be skipped without descending into it.
    pub fn is_ignored_dir(&self, rel: &str) -> bool {
        !rel.is_empty() && self.pattern_match(rel).is_some()
    }

    fn pattern_match(&self, rel: &str) -> Option<String> {
        if let Some(component) = rel.split('/').find(|c| self.names.contains(*c)) {
            return Some(component.to_string());
        }

        let framed = format!("/{}/", rel);
        if let Some(fragment) = self.fragments.iter().find(|f| framed.contains(&format!("/{}/", f))) {
            return Some(fragment.clone());
        }

        let name = rel.rsplit('/').next().unwrap_or(rel);
        if let Some(idx) = self.name_globs.matches(name).first() {
            return Some(self.name_glob_patterns[*idx].clone());
        }
        self.path_globs
            .matches(rel)
            .first()
            .map(|idx| self.path_glob_patterns[*idx].clone())
    }

    fn vendor_path(&self, rel: &str) -> Option<String> {
        let framed = format!("/{}", rel.to_lowercase());
        self.vendor_indicators
            .iter()
            .find(|indicator| framed.contains(indicator.as_str()))
            .cloned()
    }

    fn known_library(&self, rel: &str) -> Option<String> {
        let name = rel.rsplit('/').next().unwrap_or(rel).to_lowercase();
        let stem = match name.rfind('.') {
            Some(0) | None => name.as_str(),
            Some(idx) => &name[..idx],
        };

        if let Some(suffix) = self.library_suffixes.iter().find(|s| stem.ends_with(s.as_str())) {
            return Some(suffix.clone());
        }

        let base = library_base(stem);
        self.libraries
            .iter()
            .find(|lib| **lib == stem || **lib == base)
            .cloned()
    }

    fn is_minified(&self, path: &Path, rel: &str) -> bool {
        let ext = rel.rsplit('/').next().and_then(|n| n.rsplit_once('.')).map(|(_, e)| e);
        let Some(ext) = ext else {
            return false;
        };
        if !self.minified.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            return false;
        }

        match sample_lines(path, self.minified.sample_lines) {
            Ok(lines) => looks_minified(&lines, &self.minified),
            Err(e) => {
                tracing::debug!("Could not sample {} for minification: {}", rel, e);
                false
            }
        }
    }

    fn vendor_marker(&self, path: &Path) -> Option<String> {
        let mut head = Vec::with_capacity(self.marker_sample_bytes);
        let file = File::open(path).ok()?;
        file.take(self.marker_sample_bytes as u64).read_to_end(&mut head).ok()?;
        let head = String::from_utf8_lossy(&head).to_lowercase();
        self.markers
            .iter()
            .find(|(_, lowered)| head.contains(lowered.as_str()))
            .map(|(marker, _)| marker.clone())
    }
}

/// Strips the extension-like tail and version suffix of a library name:
/// `jquery-3.6.1` and `jquery.min` both become `jquery`.
fn library_base(name: &str) -> String {
    let name = name.strip_suffix(".min").unwrap_or(name);
    let name = name
        .strip_suffix(".js")
        .or_else(|| name.strip_suffix(".css"))
        .unwrap_or(name);
    let name = name.strip_suffix(".min").unwrap_or(name);
    match LIBRARY_VERSION.captures(name) {
        Some(caps) => caps[1].to_string(),
        None => name.to_string(),
    }
}

fn sample_lines(path: &Path, count: usize) -> std::io::Result<Vec<String>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file.take(MINIFIED_SAMPLE_BYTES));
    let mut lines = Vec::with_capacity(count);
    let mut buf = Vec::new();
    while lines.len() < count {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        lines.push(String::from_utf8_lossy(&buf).trim().to_string());
    }
    Ok(lines)
}

/// Minification signals over sampled, trimmed lines.
fn looks_minified(lines: &[String], cfg: &MinifiedConfig) -> bool {
    if lines.is_empty() {
        return false;
    }

    let long = lines.iter().filter(|l| l.chars().count() > cfg.long_line).count();
    if long as f64 / lines.len() as f64 > cfg.long_line_ratio {
        return true;
    }

    let head = &lines[..lines.len().min(3)];
    let joined = head.concat();
    let signals = [
        PACKED_OPERATOR.find_iter(&joined).count() > cfg.operator_density,
        head.iter().any(|l| l.chars().count() > cfg.very_long_line),
        joined.contains(";var ") || joined.contains(";function"),
        SINGLE_CHAR.find_iter(&joined).count() > cfg.single_char_density,
    ];
    signals.iter().filter(|s| **s).count() >= cfg.min_signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn classifier() -> PathClassifier {
        PathClassifier::new(&Config::default()).unwrap()
    }

    fn verdict_for(rel: &str, content: &str) -> Verdict {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file");
        std::fs::write(&path, content).unwrap();
        classifier().classify(&path, rel, content.len() as u64)
    }

    #[test]
    fn test_pattern_components() {
        let c = classifier();
        assert_eq!(
            c.classify(Path::new("/nope"), "web/node_modules/react/index.js", 10),
            Verdict::Ignore(IgnoreReason::Pattern("node_modules".to_string()))
        );
        assert_eq!(
            c.classify(Path::new("/nope"), "app/cache.pyc", 10),
            Verdict::Ignore(IgnoreReason::Pattern("*.pyc".to_string()))
        );
        assert_eq!(
            c.classify(Path::new("/nope"), "site/public/assets/app.js", 10),
            Verdict::Ignore(IgnoreReason::Pattern("public/assets".to_string()))
        );
        // Component equality, not substring: `lib` does not catch these.
        assert!(c.pattern_match("src/library.py").is_none());
        assert!(c.pattern_match("src/calibrate/run.py").is_none());
        assert!(c.is_ignored_dir("build"));
        assert!(!c.is_ignored_dir("src"));
    }

    #[test]
    fn test_vendor_path_and_library() {
        let c = classifier();
        assert_eq!(
            c.classify(Path::new("/nope"), "web/plugins/widget.py", 10),
            Verdict::Ignore(IgnoreReason::VendorPath("/plugins/".to_string()))
        );
        assert_eq!(c.known_library("static2/jquery-3.6.1.js"), Some("jquery".to_string()));
        assert_eq!(c.known_library("site/jquery.min.js"), Some("jquery".to_string()));
        assert_eq!(c.known_library("charts/chart.js"), Some("chart".to_string()));
        assert_eq!(c.known_library("site/app.bundle.js"), Some(".bundle".to_string()));
        assert_eq!(c.known_library("src/checkout.js"), None);
        assert_eq!(c.known_library("src/prefetcher.js"), None);
    }

    #[test]
    fn test_minified_detection() {
        let cfg = MinifiedConfig::default();
        let packed = "a".repeat(300);
        assert!(looks_minified(&[packed.clone(), packed], &cfg));

        // One very long line among short ones: the ratio stays low but two
        // signatures fire.
        let code = "!function(e,t){var n=e+t;var r=n*2;return r};var a=b+c;function q(x){return x}";
        let sample = vec![code.repeat(8), "x".to_string(), "y".to_string()];
        assert!(looks_minified(&sample, &cfg));

        let readable: Vec<String> = ["function add(a, b) {", "  return a + b;", "}"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(!looks_minified(&readable, &cfg));
        assert!(!looks_minified(&[], &cfg));
    }

    #[test]
    fn test_check_order() {
        // A minified file inside a vendor path reports the cheaper reason.
        let line = "x".repeat(400);
        assert_eq!(
            verdict_for("a/vendor/lib.min.css", &line),
            Verdict::Ignore(IgnoreReason::Pattern("vendor".to_string()))
        );
        assert_eq!(verdict_for("a/styles.css", &format!("{line}\n{line}\n")), Verdict::Ignore(IgnoreReason::Minified));
        assert_eq!(
            verdict_for("src/gen.py", "# AUTO-GENERATED by protoc\nx = 1\n"),
            Verdict::Ignore(IgnoreReason::VendorMarker("AUTO-GENERATED".to_string()))
        );
        assert_eq!(verdict_for("src/app.py", "def main():\n    pass\n"), Verdict::Keep);
    }

    #[test]
    fn test_oversized() {
        let mut config = Config::default();
        config.indexing.max_file_size = 16;
        let c = PathClassifier::new(&config).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.py");
        std::fs::write(&path, "x = 1\n".repeat(10)).unwrap();
        assert_eq!(c.classify(&path, "big.py", 60), Verdict::Ignore(IgnoreReason::Oversized(60)));
        assert_eq!(IgnoreReason::Oversized(60).category(), SkipCategory::Oversized);
    }

    #[test]
    fn test_markers_can_be_disabled() {
        let mut config = Config::default();
        config.indexing.scan_content_markers = false;
        let c = PathClassifier::new(&config).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("gen.py");
        std::fs::write(&path, "# DO NOT EDIT\n").unwrap();
        assert_eq!(c.classify(&path, "gen.py", 14), Verdict::Keep);
    }

    #[test]
    fn test_invalid_glob_is_rejected() {
        let mut config = Config::default();
        config.indexing.ignore_patterns.push("src/[".to_string());
        assert!(PathClassifier::new(&config).is_err());
    }

    proptest! {
        #[test]
        fn classify_is_deterministic(content in "[ -~\n]{0,600}", name in "[a-z]{1,8}\\.(js|py|css)") {
            let dir = tempdir().unwrap();
            let path = dir.path().join(&name);
            std::fs::write(&path, &content).unwrap();
            let c = classifier();
            let first = c.classify(&path, &name, content.len() as u64);
            let second = c.classify(&path, &name, content.len() as u64);
            prop_assert_eq!(first, second);
        }
    }
}
