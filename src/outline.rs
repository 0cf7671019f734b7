//! Tree-sitter outliner: turns a parsed syntax tree into the hierarchical
//! [`SymbolNode`] outline consumed by the anchor resolver.

use std::path::{Path, PathBuf};

use tree_sitter::{Language, Node, Parser, Tree};

use crate::document::DocumentAccessor;
use crate::error::Error;
use crate::grammar::{Flavor, language_for_path};
use crate::provider::SymbolProvider;
use crate::types::{SymbolKind, SymbolNode};

/// Maximum source file size (16 MiB).
const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Outlines documents of one language with tree-sitter.
pub struct Outliner {
    /// Which outline rules apply.
    flavor: Flavor,
    /// Grammar used by the parser.
    language: Language,
    /// Source path, for diagnostics.
    path: PathBuf,
}

impl std::fmt::Debug for Outliner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("Outliner")
            .field("flavor", &self.flavor)
            .field("path", &self.path)
            .finish_non_exhaustive();
    }
}

impl Outliner {
    /// Outliner for the grammar matching `path`'s extension.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedLanguage` for unknown extensions.
    pub fn for_path(path: &Path) -> Result<Self, Error> {
        let (language, flavor) = language_for_path(path)?;
        return Ok(Self { flavor, language, path: path.to_path_buf() });
    }

    /// Parse `source` and return its symbol outline.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileTooLarge` if the source exceeds the size limit,
    /// or `Error::ParseFailed` if tree-sitter cannot parse the source.
    pub fn outline(&self, source: &str) -> Result<Vec<SymbolNode>, Error> {
        let source_len: u64 = source.len().try_into().unwrap_or(u64::MAX);
        if source_len > MAX_FILE_SIZE {
            return Err(Error::FileTooLarge {
                file: self.path.clone(),
                max_bytes: MAX_FILE_SIZE,
                size_bytes: source_len,
            });
        }

        let tree = self.parse(source)?;
        let mut symbols = Vec::new();
        collect(tree.root_node(), source, self.flavor, Scope::Top, &mut symbols);
        return Ok(symbols);
    }

    /// Parse source into a tree-sitter tree.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseFailed` if the language cannot be set or parsing fails.
    fn parse(&self, source: &str) -> Result<Tree, Error> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).map_err(|e| {
            return Error::ParseFailed { file: self.path.clone(), reason: e.to_string() };
        })?;

        return parser.parse(source, None).ok_or_else(|| {
            return Error::ParseFailed {
                file: self.path.clone(),
                reason: "tree-sitter returned None".to_string(),
            };
        });
    }
}

impl SymbolProvider for Outliner {
    fn document_symbols(&self, document: &dyn DocumentAccessor) -> Result<Vec<SymbolNode>, Error> {
        return self.outline(&document.text());
    }
}

/// What kind of region the walker is inside; decides how nested nodes classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Function or method body: local bindings are not symbols.
    Body,
    /// Class, trait, impl, or interface body: functions are methods.
    Members,
    /// Module level.
    Top,
}

/// A node recognized as a symbol, and the scope its children live in.
struct Classified {
    /// Scope for nested nodes.
    inner: Scope,
    /// Symbol category.
    kind: SymbolKind,
    /// Declared name.
    name: String,
}

/// Walk `node`'s named children. Recognized declarations become symbols with
/// their own nested outline; every other node is transparent.
fn collect(node: Node<'_>, source: &str, flavor: Flavor, scope: Scope, out: &mut Vec<SymbolNode>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let Some(found) = classify(child, source, flavor, scope) else {
            collect(child, source, flavor, scope, out);
            continue;
        };
        let (start, end) = line_span(child);
        let mut children = Vec::new();
        collect(child, source, flavor, found.inner, &mut children);
        out.push(SymbolNode::new(found.name, found.kind, start, end).with_children(children));
    }
}

/// Dispatch to the flavor's classifier.
fn classify(node: Node<'_>, source: &str, flavor: Flavor, scope: Scope) -> Option<Classified> {
    return match flavor {
        Flavor::Go => classify_go(node, source),
        Flavor::Markdown => classify_markdown(node, source),
        Flavor::Python => classify_python(node, source, scope),
        Flavor::Rust => classify_rust(node, source, scope),
        Flavor::TypeScript => classify_typescript(node, source, scope),
    };
}

/// 1-based inclusive line span. A node ending at column 0 ends on the
/// previous line (its trailing newline belongs to it).
fn line_span(node: Node<'_>) -> (u32, u32) {
    let start = node.start_position();
    let end = node.end_position();
    let first = u32::try_from(start.row).unwrap_or(u32::MAX).saturating_add(1);
    let last_row = if end.column == 0 && end.row > start.row { end.row } else { end.row.saturating_add(1) };
    let last = u32::try_from(last_row).unwrap_or(u32::MAX).max(first);
    return (first, last);
}

/// Text of the node's `name` field.
fn name_field(node: Node<'_>, source: &str) -> Option<String> {
    let name = node.child_by_field_name("name")?;
    return text_of(name, source);
}

/// Source text of a node.
fn text_of(node: Node<'_>, source: &str) -> Option<String> {
    return node.utf8_text(source.as_bytes()).ok().map(String::from);
}

/// Shorthand for a classified symbol.
fn symbol(name: String, kind: SymbolKind, inner: Scope) -> Option<Classified> {
    return Some(Classified { inner, kind, name });
}

// ── Rust ───────────────────────────────────────────────────────────────

/// Rust items, impl blocks, fields, and enum variants.
fn classify_rust(node: Node<'_>, source: &str, scope: Scope) -> Option<Classified> {
    return match node.kind() {
        "function_item" | "function_signature_item" => {
            let kind = if scope == Scope::Members { SymbolKind::Method } else { SymbolKind::Function };
            symbol(name_field(node, source)?, kind, Scope::Body)
        },
        "const_item" | "static_item" => symbol(name_field(node, source)?, SymbolKind::Constant, Scope::Body),
        "enum_item" => symbol(name_field(node, source)?, SymbolKind::Enum, Scope::Top),
        "enum_variant" => symbol(name_field(node, source)?, SymbolKind::EnumMember, Scope::Top),
        "field_declaration" => symbol(name_field(node, source)?, SymbolKind::Field, Scope::Top),
        "impl_item" => symbol(rust_impl_name(node, source)?, SymbolKind::Impl, Scope::Members),
        "mod_item" => symbol(name_field(node, source)?, SymbolKind::Module, Scope::Top),
        "struct_item" | "union_item" => symbol(name_field(node, source)?, SymbolKind::Struct, Scope::Top),
        "trait_item" => symbol(name_field(node, source)?, SymbolKind::Trait, Scope::Members),
        "type_item" => symbol(name_field(node, source)?, SymbolKind::TypeAlias, Scope::Top),
        _ => None,
    };
}

/// `impl Type` or `impl Trait for Type`. The `impl` prefix keeps impl blocks
/// from sharing a path with the type they implement.
fn rust_impl_name(node: Node<'_>, source: &str) -> Option<String> {
    let type_name = text_of(node.child_by_field_name("type")?, source)?;
    let Some(trait_node) = node.child_by_field_name("trait") else {
        return Some(format!("impl {type_name}"));
    };
    let trait_name = text_of(trait_node, source)?;
    return Some(format!("impl {trait_name} for {type_name}"));
}

// ── TypeScript ─────────────────────────────────────────────────────────

/// TypeScript/JavaScript declarations. Variables count only outside
/// function bodies; arrow functions bound to a name count as functions.
fn classify_typescript(node: Node<'_>, source: &str, scope: Scope) -> Option<Classified> {
    return match node.kind() {
        "abstract_class_declaration" | "class_declaration" => {
            symbol(name_field(node, source)?, SymbolKind::Class, Scope::Members)
        },
        "enum_declaration" => symbol(name_field(node, source)?, SymbolKind::Enum, Scope::Top),
        "function_declaration" | "generator_function_declaration" => {
            symbol(name_field(node, source)?, SymbolKind::Function, Scope::Body)
        },
        "interface_declaration" => symbol(name_field(node, source)?, SymbolKind::Interface, Scope::Members),
        "internal_module" => symbol(name_field(node, source)?, SymbolKind::Namespace, Scope::Top),
        "method_definition" | "method_signature" | "abstract_method_signature" => {
            symbol(name_field(node, source)?, SymbolKind::Method, Scope::Body)
        },
        "property_signature" | "public_field_definition" => {
            symbol(name_field(node, source)?, SymbolKind::Field, Scope::Body)
        },
        "type_alias_declaration" => symbol(name_field(node, source)?, SymbolKind::TypeAlias, Scope::Top),
        "variable_declarator" if scope != Scope::Body => {
            let is_function = node
                .child_by_field_name("value")
                .is_some_and(|v| return matches!(v.kind(), "arrow_function" | "function_expression"));
            let kind = if is_function { SymbolKind::Function } else { SymbolKind::Variable };
            symbol(name_field(node, source)?, kind, Scope::Body)
        },
        _ => None,
    };
}

// ── Python ─────────────────────────────────────────────────────────────

/// Python classes and functions; functions inside a class are methods.
fn classify_python(node: Node<'_>, source: &str, scope: Scope) -> Option<Classified> {
    return match node.kind() {
        "class_definition" => symbol(name_field(node, source)?, SymbolKind::Class, Scope::Members),
        "function_definition" => {
            let kind = if scope == Scope::Members { SymbolKind::Method } else { SymbolKind::Function };
            symbol(name_field(node, source)?, kind, Scope::Body)
        },
        _ => None,
    };
}

// ── Go ─────────────────────────────────────────────────────────────────

/// Go functions, methods, and named types.
fn classify_go(node: Node<'_>, source: &str) -> Option<Classified> {
    return match node.kind() {
        "function_declaration" => symbol(name_field(node, source)?, SymbolKind::Function, Scope::Body),
        "method_declaration" => symbol(name_field(node, source)?, SymbolKind::Method, Scope::Body),
        "type_spec" => {
            let kind = match node.child_by_field_name("type").map(|t| return t.kind()) {
                Some("interface_type") => SymbolKind::Interface,
                Some("struct_type") => SymbolKind::Struct,
                _ => SymbolKind::TypeAlias,
            };
            symbol(name_field(node, source)?, kind, Scope::Top)
        },
        _ => None,
    };
}

// ── Markdown ───────────────────────────────────────────────────────────

/// Heading sections, named by their heading text. Nested headings become
/// nested sections.
fn classify_markdown(node: Node<'_>, source: &str) -> Option<Classified> {
    if node.kind() != "section" {
        return None;
    }
    let mut cursor = node.walk();
    let heading = node.named_children(&mut cursor).find(|c| {
        return c.kind() == "atx_heading" || c.kind() == "setext_heading";
    })?;
    let name = heading_text(heading, source)?;
    if name.is_empty() {
        return None;
    }
    return symbol(name, SymbolKind::Section, Scope::Top);
}

/// Heading text without the `#` markers or setext underline.
fn heading_text(heading: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = heading.walk();
    for child in heading.named_children(&mut cursor) {
        if child.kind() == "inline" || child.kind() == "paragraph" {
            return text_of(child, source).map(|t| return t.trim().to_string());
        }
    }
    let text = text_of(heading, source)?;
    let first_line = text.lines().next().unwrap_or("");
    return Some(first_line.trim_start_matches('#').trim().to_string());
}
