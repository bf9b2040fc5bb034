#![forbid(unsafe_code)]

//! URI resolution for XML-DSig references.
//!
//! Handles:
//! - Empty URI (`""`): the entire document minus comments
//! - Same-document references (`#id`, `#xpointer(id('id'))`)
//!
//! Any other URI is rejected.

use sigtuna_core::Error;
use sigtuna_xml::{xpath, Document, NodeId, NodeSet};

/// What a reference URI points at.
#[derive(Debug)]
pub struct ResolvedReference {
    /// The referenced element; `None` for the whole document.
    pub target: Option<NodeId>,
    pub node_set: NodeSet,
}

/// Resolve a reference URI against the document's registered IDs.
pub fn resolve_uri(doc: &Document, uri: &str) -> Result<ResolvedReference, Error> {
    if uri.is_empty() {
        return Ok(ResolvedReference {
            target: None,
            node_set: NodeSet::all_without_comments(doc),
        });
    }
    let fragment = uri
        .strip_prefix('#')
        .ok_or_else(|| Error::InvalidUri(format!("external URI not supported: {uri}")))?;
    let id = xpath::parse_same_document_ref(uri).unwrap_or(fragment);
    let target = xpath::resolve_id(doc, id)?;
    // The XPointer form keeps comments; a bare fragment drops them.
    let node_set = if xpath::parse_xpointer_id(fragment).is_some() {
        NodeSet::tree_with_comments(target, doc)
    } else {
        NodeSet::tree_without_comments(target, doc)
    };
    Ok(ResolvedReference {
        target: Some(target),
        node_set,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_forms() {
        let mut doc = Document::parse(r#"<r><a ID="x"><!--c--></a></r>"#).unwrap();
        doc.register_id_attribute("ID").unwrap();
        let a = doc.find_by_id("x").unwrap();

        let whole = resolve_uri(&doc, "").unwrap();
        assert!(whole.target.is_none());
        assert!(whole.node_set.contains_id(a));

        let bare = resolve_uri(&doc, "#x").unwrap();
        assert_eq!(bare.target, Some(a));
        assert_eq!(bare.node_set.len(), 1);

        let xp = resolve_uri(&doc, "#xpointer(id('x'))").unwrap();
        assert_eq!(xp.node_set.len(), 2);
    }

    #[test]
    fn test_rejected_uris() {
        let doc = Document::parse("<r/>").unwrap();
        assert!(matches!(resolve_uri(&doc, "#missing"), Err(Error::InvalidUri(_))));
        assert!(matches!(
            resolve_uri(&doc, "http://example.org/doc.xml"),
            Err(Error::InvalidUri(_))
        ));
    }
}
