#![forbid(unsafe_code)]

//! NodeSet type for XML canonicalization and transforms.
//!
//! A `NodeSet` selects the nodes of a [`Document`] that take part in a
//! document-subset canonicalization.  Same-document references produce a
//! subtree set, and the enveloped-signature transform subtracts the
//! `<Signature>` subtree from it.

use crate::document::{Document, NodeId, NodeKind};
use std::collections::HashSet;

/// A set of XML document nodes identified by `NodeId`.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<usize>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every node of the document, comments excluded.
    /// Per XML-DSig, `URI=""` selects the document without comments.
    pub fn all_without_comments(doc: &Document) -> Self {
        Self::tree_without_comments(doc.root(), doc)
    }

    /// A subtree rooted at the given node, comments excluded.
    pub fn tree_without_comments(root_id: NodeId, doc: &Document) -> Self {
        let mut nodes = HashSet::new();
        collect_subtree(root_id, doc, &mut nodes, false);
        Self { nodes }
    }

    /// A subtree rooted at the given node, comments included.
    pub fn tree_with_comments(root_id: NodeId, doc: &Document) -> Self {
        let mut nodes = HashSet::new();
        collect_subtree(root_id, doc, &mut nodes, true);
        Self { nodes }
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.nodes.contains(&id.index())
    }

    pub fn insert_id(&mut self, id: NodeId) {
        self.nodes.insert(id.index());
    }

    pub fn remove_id(&mut self, id: NodeId) {
        self.nodes.remove(&id.index());
    }

    /// Remove a node and all of its descendants.
    pub fn remove_subtree(&mut self, id: NodeId, doc: &Document) {
        self.remove_id(id);
        for d in doc.descendants(id) {
            self.remove_id(d);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

fn collect_subtree(id: NodeId, doc: &Document, set: &mut HashSet<usize>, include_comments: bool) {
    if !include_comments && matches!(doc.node_kind(id), Some(NodeKind::Comment(_))) {
        return;
    }
    set.insert(id.index());
    for child in doc.children(id) {
        collect_subtree(child, doc, set, include_comments);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtree_without_comments() {
        let doc = Document::parse("<r><a><!--c--><b/></a><d/></r>").unwrap();
        let r = doc.document_element().unwrap();
        let a = doc.child_elements(r).next().unwrap();
        let set = NodeSet::tree_without_comments(a, &doc);
        // a and b, not the comment
        assert_eq!(set.len(), 2);
        assert!(set.contains_id(a));
        assert!(!set.contains_id(r));

        let mut all = NodeSet::all_without_comments(&doc);
        all.remove_subtree(a, &doc);
        assert!(all.contains_id(r));
        assert!(!all.contains_id(a));
    }
}
