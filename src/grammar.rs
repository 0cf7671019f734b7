/// Tree-sitter grammar resolution by file extension.
use std::path::Path;

use tree_sitter::Language;

use crate::error::Error;

/// Which set of outline rules applies to a grammar's syntax tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Go declarations and type specs.
    Go,
    /// Markdown heading sections.
    Markdown,
    /// Python classes and functions.
    Python,
    /// Rust items, impl blocks, fields, and variants.
    Rust,
    /// TypeScript and JavaScript declarations.
    TypeScript,
}

/// Map a file extension to its tree-sitter language and outline flavor.
///
/// # Errors
///
/// Returns `Error::UnsupportedLanguage` for unknown extensions.
pub fn language_for_path(path: &Path) -> Result<(Language, Flavor), Error> {
    let ext = path.extension().and_then(|e| return e.to_str()).unwrap_or("");

    return match ext {
        "go" => Ok((tree_sitter_go::LANGUAGE.into(), Flavor::Go)),
        "js" | "mjs" | "cjs" | "ts" | "mts" => {
            Ok((tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(), Flavor::TypeScript))
        },
        "jsx" | "tsx" => Ok((tree_sitter_typescript::LANGUAGE_TSX.into(), Flavor::TypeScript)),
        "md" | "markdown" => Ok((tree_sitter_md::LANGUAGE.into(), Flavor::Markdown)),
        "py" | "pyi" => Ok((tree_sitter_python::LANGUAGE.into(), Flavor::Python)),
        "rs" => Ok((tree_sitter_rust::LANGUAGE.into(), Flavor::Rust)),
        _ => Err(Error::UnsupportedLanguage {
            ext: ext.to_string(),
        }),
    };
}
