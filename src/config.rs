// Configuration management for the indexer

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::IndexerError;

/// Name of the optional per-project configuration file.
pub const PROJECT_CONFIG_FILE: &str = ".codebase-indexer.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub indexing: IndexingConfig,
    pub minified: MinifiedConfig,
    pub limits: LimitsConfig,
    pub cache: CacheConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Directory names, path fragments (containing `/`) and file globs.
    pub ignore_patterns: Vec<String>,
    /// Third-party library base names matched against file stems.
    pub library_patterns: Vec<String>,
    /// Generic suffixes such as `.bundle` or `.polyfill`.
    pub library_suffixes: Vec<String>,
    /// Path fragments that mark vendored directories.
    pub vendor_indicators: Vec<String>,
    /// Header markers of licensed or generated content.
    pub vendor_markers: Vec<String>,
    pub scan_content_markers: bool,
    pub marker_sample_bytes: usize,
    /// Size ceiling in bytes.
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinifiedConfig {
    pub extensions: Vec<String>,
    pub sample_lines: usize,
    pub long_line: usize,
    pub long_line_ratio: f64,
    pub very_long_line: usize,
    pub operator_density: usize,
    pub single_char_density: usize,
    pub min_signals: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub extraction: ExtractionLimits,
    pub summary: SummaryLimits,
}

/// Caps applied while a record is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionLimits {
    pub imports: usize,
    pub functions: usize,
    pub types: usize,
    pub methods: usize,
    pub members: usize,
    pub variables: usize,
    pub defines: usize,
    pub namespaces: usize,
}

/// Caps applied to the per-file entries of the output index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryLimits {
    pub description: usize,
    pub doc: usize,
    pub imports: usize,
    pub functions: usize,
    pub classes: usize,
    pub methods: usize,
    pub components: usize,
    pub properties: usize,
    pub includes: usize,
    pub defines: usize,
    pub structs: usize,
    pub members: usize,
    pub namespaces: usize,
    pub variables: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache file, relative to the project root unless absolute.
    pub file: String,
    pub force_refresh: bool,
    /// Drop entries for files not seen in the current scan.
    pub prune_stale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: strings(&[
                "node_modules", "__pycache__", ".git", ".venv", "venv", "env", "dist", "build",
                "target", ".next", ".nuxt", "coverage", ".pytest_cache", ".mypy_cache", ".tox",
                "htmlcov", "vendor", "public/assets", "static/vendor", "assets/vendor", "lib",
                "libs", "third-party", "third_party", "vendors", "bower_components", "external",
                "deps", "dependencies", "cmake", "CMakeFiles", ".vs", "Debug", "Release", "x64",
                "Win32", "out", "*.pyc", "*.pyo", "*.pyd", "*.so", "*.dll", "*.dylib", "*.log",
                "*.tmp", "*.temp", "*.bak", "*.swp", "*.swo", ".DS_Store", "Thumbs.db",
                "*.min.js", "*.min.css", "package-lock.json", "yarn.lock", "poetry.lock",
                "composer.lock", "*.o", "*.obj", "*.a", "*.lib", "*.pdb", "*.ilk", "*.exp",
                "*.exe", "*.out", "CMakeCache.txt", "Makefile", "*.vcxproj", "*.vcxproj.filters",
                "*.vcxproj.user", "*.sln", "*.suo",
            ]),
            library_patterns: strings(&[
                // CSS frameworks
                "bootstrap", "bulma", "tailwind", "foundation", "materialize", "semantic-ui",
                "ui-kit", "ant-design", "chakra-ui", "material-ui",
                // JavaScript libraries
                "jquery", "lodash", "underscore", "moment", "axios", "fetch", "react-dom", "vue",
                "angular", "backbone", "ember", "knockout", "handlebars", "mustache", "chart.js",
                "chartist", "d3", "three.js", "babylonjs", "pixi.js", "fabric.js", "konva",
                // UI widgets
                "typeahead", "select2", "chosen", "dropzone", "sortable", "datepicker",
                "timepicker", "slider", "carousel", "modal", "tooltip", "popover", "accordion",
                "tabs", "dropdown",
                // CDN libraries
                "popper", "tether", "perfect-scrollbar", "swiper", "owl-carousel", "fancybox",
                "lightbox", "magnific-popup", "photoswipe",
                // C/C++ libraries
                "imgui", "glfw", "glad", "glew", "stb_image", "stb_truetype", "glm", "eigen",
                "bullet", "box2d", "chipmunk", "reactphysics3d", "assimp", "tinyobjloader",
                "rapidjson", "nlohmann", "fmt", "spdlog", "catch2", "gtest", "boost", "poco",
                "curl", "openssl", "zlib", "libpng", "libjpeg", "freetype", "sdl2", "sfml",
                "allegro",
                // Build and dev tools
                "webpack", "rollup", "parcel", "browserify", "gulp", "grunt", "babel",
                "typescript", "eslint", "prettier", "jest", "mocha",
            ]),
            library_suffixes: strings(&[
                ".bundle", ".vendor", ".lib", ".plugin", ".widget", ".polyfill", ".shim",
                ".compat", ".legacy",
            ]),
            vendor_indicators: strings(&[
                "/vendor/", "/vendors/", "/third-party/", "/third_party/", "/libs/", "/lib/",
                "/assets/js/", "/assets/css/", "/public/js/", "/public/css/", "/static/js/",
                "/static/css/", "/cdn/", "/external/", "/plugins/", "/addons/",
            ]),
            vendor_markers: strings(&[
                "* @license", "* @copyright", "* @author", "DO NOT EDIT", "GENERATED FILE",
                "AUTO-GENERATED", "This file is part of", "Licensed under", "(c) 2",
                "Copyright (c)", "* jQuery", "* Bootstrap", "Distributed under", "MIT License",
                "Apache License", "@preserve", "minified", "compressed",
            ]),
            scan_content_markers: true,
            marker_sample_bytes: 1024,
            max_file_size: 500 * 1024,
        }
    }
}

impl Default for MinifiedConfig {
    fn default() -> Self {
        Self {
            extensions: strings(&["js", "css"]),
            sample_lines: 10,
            long_line: 200,
            long_line_ratio: 0.8,
            very_long_line: 500,
            operator_density: 10,
            single_char_density: 20,
            min_signals: 2,
        }
    }
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            imports: 200,
            functions: 200,
            types: 100,
            methods: 100,
            members: 100,
            variables: 100,
            defines: 200,
            namespaces: 50,
        }
    }
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self {
            description: 200,
            doc: 100,
            imports: 10,
            functions: 20,
            classes: 10,
            methods: 15,
            components: 15,
            properties: 10,
            includes: 15,
            defines: 10,
            structs: 10,
            members: 10,
            namespaces: 10,
            variables: 10,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file: ".codebase_cache.json".to_string(),
            force_refresh: false,
            prune_stale: true,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Command-line values layered on top of the file configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ignore: Vec<String>,
    pub ignore_library: Vec<String>,
    pub max_file_size_kb: Option<u64>,
    pub cache_file: Option<String>,
    pub force_refresh: bool,
    pub threads: Option<usize>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from project directory
    /// Looks for .codebase-indexer.toml in the project root
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> Self {
        let config_path = project_dir.as_ref().join(PROJECT_CONFIG_FILE);
        if !config_path.exists() {
            tracing::debug!("No {} in project, using defaults", PROJECT_CONFIG_FILE);
            return Self::default();
        }

        match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Could not load config from {}: {}", config_path.display(), e);
                tracing::info!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Resolve the configuration for a run. An explicit path must load.
    pub fn load(project_dir: &Path, explicit: Option<&Path>) -> Result<Self, IndexerError> {
        match explicit {
            Some(path) => Self::from_file(path)
                .map_err(|e| IndexerError::Config(format!("{}: {}", path.display(), e))),
            None => Ok(Self::from_project_dir(project_dir)),
        }
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        for pattern in &overrides.ignore {
            if !self.indexing.ignore_patterns.contains(pattern) {
                self.indexing.ignore_patterns.push(pattern.clone());
            }
        }
        for pattern in &overrides.ignore_library {
            if !self.indexing.library_patterns.contains(pattern) {
                self.indexing.library_patterns.push(pattern.clone());
            }
        }
        if let Some(kb) = overrides.max_file_size_kb {
            self.indexing.max_file_size = kb.saturating_mul(1024);
        }
        if let Some(file) = &overrides.cache_file {
            self.cache.file = file.clone();
        }
        if overrides.force_refresh {
            self.cache.force_refresh = true;
        }
        if let Some(threads) = overrides.threads {
            self.performance.threads = threads;
        }
    }

    /// Absolute location of the cache file for a project root.
    pub fn cache_path(&self, root: &Path) -> PathBuf {
        let file = Path::new(&self.cache.file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            root.join(file)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.indexing.max_file_size == 0 {
            return Err(anyhow::anyhow!("Max file size must be greater than 0"));
        }
        if self.indexing.marker_sample_bytes == 0 {
            return Err(anyhow::anyhow!("Marker sample size must be greater than 0"));
        }

        let m = &self.minified;
        if m.sample_lines == 0 || m.long_line == 0 || m.very_long_line == 0 {
            return Err(anyhow::anyhow!("Minification thresholds must be greater than 0"));
        }
        if !(m.long_line_ratio > 0.0 && m.long_line_ratio <= 1.0) {
            return Err(anyhow::anyhow!(
                "Long-line ratio must be in (0, 1], got {}",
                m.long_line_ratio
            ));
        }
        if m.min_signals == 0 {
            return Err(anyhow::anyhow!("Minification signal count must be greater than 0"));
        }

        let e = &self.limits.extraction;
        let caps = [
            e.imports, e.functions, e.types, e.methods, e.members, e.variables, e.defines,
            e.namespaces,
        ];
        if caps.contains(&0) {
            return Err(anyhow::anyhow!("Extraction limits must be greater than 0"));
        }
        let s = &self.limits.summary;
        let caps = [
            s.description, s.doc, s.imports, s.functions, s.classes, s.methods, s.components,
            s.properties, s.includes, s.defines, s.structs, s.members, s.namespaces, s.variables,
        ];
        if caps.contains(&0) {
            return Err(anyhow::anyhow!("Summary limits must be greater than 0"));
        }

        if self.cache.file.trim().is_empty() {
            return Err(anyhow::anyhow!("Cache file name cannot be empty"));
        }
        if self.performance.threads == 0 {
            return Err(anyhow::anyhow!("Thread count must be greater than 0"));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level));
        }
        let valid_formats = ["compact", "pretty", "full"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!("Invalid log format: {}", self.logging.format));
        }

        Ok(())
    }
}
