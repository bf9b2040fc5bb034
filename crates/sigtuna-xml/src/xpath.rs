#![forbid(unsafe_code)]

//! Same-document URI references as used by XML-DSig.
//!
//! Only the forms SAML signatures use are supported:
//! - `""`: the whole document
//! - `#id-value`: an element by registered ID
//! - `#xpointer(id('id-value'))`: the same, in XPointer syntax

use crate::document::{Document, NodeId};
use sigtuna_core::Error;

/// Parse a same-document reference (e.g., `#foo` → `foo`).
pub fn parse_same_document_ref(uri: &str) -> Option<&str> {
    let fragment = uri.strip_prefix('#')?;
    Some(parse_xpointer_id(fragment).unwrap_or(fragment))
}

/// Parse an `xpointer(id('...'))` expression and return the ID value.
pub fn parse_xpointer_id(expr: &str) -> Option<&str> {
    let inner = expr.strip_prefix("xpointer(id(")?.strip_suffix("))")?;
    inner
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
}

/// Resolve an ID value against the document's registered IDs.
pub fn resolve_id(doc: &Document, id: &str) -> Result<NodeId, Error> {
    doc.find_by_id(id)
        .ok_or_else(|| Error::InvalidUri(format!("ID not found: {id}")))
}
