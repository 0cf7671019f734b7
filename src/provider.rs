//! The symbol-provider seam. Anything that can outline a document (a language
//! server, the tree-sitter [`crate::outline::Outliner`], a fixed list) plugs in here.

use crate::document::DocumentAccessor;
use crate::error::Error;
use crate::types::SymbolNode;

/// Produces the hierarchical symbol outline of a document.
///
/// Returning an empty list or an error both mean "no symbolic anchoring
/// available"; the engine then tracks by content fingerprint alone.
pub trait SymbolProvider {
    /// Outline the document's current contents.
    ///
    /// # Errors
    ///
    /// Implementations return an error when the document cannot be outlined.
    fn document_symbols(&self, document: &dyn DocumentAccessor) -> Result<Vec<SymbolNode>, Error>;
}

/// A provider that always returns the same outline, regardless of contents.
/// Useful for hosts that compute outlines elsewhere, and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbols(
    /// The outline handed back on every call.
    pub Vec<SymbolNode>,
);

impl SymbolProvider for StaticSymbols {
    fn document_symbols(&self, _document: &dyn DocumentAccessor) -> Result<Vec<SymbolNode>, Error> {
        return Ok(self.0.clone());
    }
}
