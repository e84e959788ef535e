//! Resource limits applied while decoding untrusted documents.

/// Maximum nesting depth of mappings and sequences below the document root.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Maximum document size in bytes.
pub const MAX_DOCUMENT_LEN: usize = 4 * 1024 * 1024;
