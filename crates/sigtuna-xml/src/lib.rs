#![forbid(unsafe_code)]

//! XML document model for the sigtuna SAML signature library.
//!
//! Parsing and serialization go through `uppsala`.  On top of that this
//! crate keeps an owned, editable tree, element lookup by registered ID
//! attribute, and the `NodeSet` type used by canonicalization and
//! signature transforms.

pub mod document;
pub mod encoding;
pub mod nodeset;
pub mod writer;
pub mod xpath;

pub use document::{Attribute, Document, Element, NodeId, NodeKind, QName};
pub use nodeset::NodeSet;
