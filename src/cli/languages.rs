// `languages` command: the extension map and extractor coverage

use std::collections::BTreeMap;

use crate::indexer::language::{ExtractorKind, LANGUAGES};
use crate::indexer::registry::Capability;

/// Language tags with their extensions, in tag order.
fn by_tag() -> BTreeMap<&'static str, (ExtractorKind, Vec<&'static str>)> {
    let mut tags: BTreeMap<&str, (ExtractorKind, Vec<&str>)> = BTreeMap::new();
    for &(ext, tag, kind) in LANGUAGES {
        tags.entry(tag).or_insert_with(|| (kind, Vec::new())).1.push(ext);
    }
    tags
}

pub fn list_languages() {
    let capability = Capability::detect(false);

    println!("Supported languages:");
    for (tag, (kind, extensions)) in by_tag() {
        let extensions: Vec<String> = extensions.iter().map(|e| format!(".{}", e)).collect();
        println!("  {:<12} {:<10} {}", tag, kind.to_string(), extensions.join(" "));
    }

    println!();
    let grammar = if cfg!(feature = "tree-sitter") {
        "compiled in"
    } else {
        "not compiled in"
    };
    println!("Grammar support: {}", grammar);
    println!("Default parsing method: {}", capability.describe());
}
