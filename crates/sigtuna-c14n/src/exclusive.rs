#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0.
//!
//! Only namespaces visibly utilized by an output element (its own prefix
//! and the prefixes of its attributes) are rendered, plus any prefix named
//! in the InclusiveNamespaces PrefixList, which is treated the inclusive way.

use crate::render::{self, NsDecl};
use sigtuna_core::Error;
use sigtuna_xml::{Document, NodeId, NodeKind, NodeSet};
use std::collections::{BTreeMap, BTreeSet};

/// Canonicalize `doc`, optionally restricted to `node_set`.
///
/// `#default` in `inclusive_prefixes` stands for the default namespace.
pub fn canonicalize(
    doc: &Document,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let inclusive = inclusive_prefixes
        .iter()
        .map(|p| if p == "#default" { String::new() } else { p.clone() })
        .collect();
    let mut walker = Walker {
        doc,
        with_comments,
        node_set,
        inclusive,
        out: Vec::new(),
    };
    for child in doc.children(doc.root()) {
        walker.node(child, &BTreeMap::new());
    }
    Ok(walker.out)
}

struct Walker<'a> {
    doc: &'a Document,
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    inclusive: BTreeSet<String>,
    out: Vec<u8>,
}

impl Walker<'_> {
    fn visible(&self, id: NodeId) -> bool {
        self.node_set.map_or(true, |ns| ns.contains_id(id))
    }

    fn node(&mut self, id: NodeId, rendered: &BTreeMap<String, String>) {
        let doc = self.doc;
        match doc.node_kind(id) {
            Some(NodeKind::Element(elem)) => {
                if !self.visible(id) {
                    for child in doc.children(id) {
                        self.node(child, rendered);
                    }
                    return;
                }

                let mut utilized: BTreeSet<String> = self.inclusive.clone();
                utilized.insert(elem.name.prefix.clone().unwrap_or_default());
                for attr in &elem.attributes {
                    if let Some(p) = attr.name.prefix.as_deref().filter(|p| !p.is_empty()) {
                        utilized.insert(p.to_string());
                    }
                }
                utilized.remove("xml");

                let scope = doc.in_scope_namespaces(id);
                let mut decls = Vec::new();
                for prefix in &utilized {
                    match scope.get(prefix) {
                        Some(uri) if rendered.get(prefix) != Some(uri) => decls.push(NsDecl {
                            prefix: prefix.clone(),
                            uri: uri.clone(),
                        }),
                        Some(_) => {}
                        None if prefix.is_empty()
                            && rendered.get("").is_some_and(|u| !u.is_empty()) =>
                        {
                            decls.push(NsDecl {
                                prefix: String::new(),
                                uri: String::new(),
                            })
                        }
                        None => {}
                    }
                }
                decls.sort();

                let attrs = render::sorted_attrs(doc, id);
                let mut child_rendered = rendered.clone();
                for d in &decls {
                    child_rendered.insert(d.prefix.clone(), d.uri.clone());
                }

                let name = elem.name.qualified();
                render::write_start_tag(&mut self.out, &name, &decls, &attrs);
                for child in doc.children(id) {
                    self.node(child, &child_rendered);
                }
                render::write_end_tag(&mut self.out, &name);
            }
            Some(NodeKind::Text(text)) => {
                let in_element = doc.parent(id).is_some_and(|p| doc.is_element(p));
                if in_element && self.visible(id) {
                    render::push_text(&mut self.out, text);
                }
            }
            Some(NodeKind::Comment(_)) => {
                if self.with_comments && self.visible(id) {
                    render::write_misc(&mut self.out, doc, id);
                }
            }
            Some(NodeKind::ProcessingInstruction(_)) => {
                if self.visible(id) {
                    render::write_misc(&mut self.out, doc, id);
                }
            }
            Some(NodeKind::Document) | None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn subset(xml: &str, ns: &str, local: &str, prefixes: &[&str]) -> String {
        let doc = Document::parse(xml).unwrap();
        let apex = doc.find_element(ns, local).unwrap();
        let set = NodeSet::tree_without_comments(apex, &doc);
        let prefixes: Vec<String> = prefixes.iter().map(|p| p.to_string()).collect();
        String::from_utf8(canonicalize(&doc, false, Some(&set), &prefixes).unwrap()).unwrap()
    }

    #[test]
    fn test_only_utilized_namespaces() {
        let xml = r#"<r xmlns:p="urn:p" xmlns:q="urn:q" xmlns:s="urn:s"><p:a s:x="1"><q:b/></p:a></r>"#;
        assert_eq!(
            subset(xml, "urn:p", "a", &[]),
            r#"<p:a xmlns:p="urn:p" xmlns:s="urn:s" s:x="1"><q:b xmlns:q="urn:q"></q:b></p:a>"#
        );
    }

    #[test]
    fn test_inclusive_prefix_list() {
        let xml = r#"<r xmlns:p="urn:p" xmlns:q="urn:q"><p:a/></r>"#;
        assert_eq!(
            subset(xml, "urn:p", "a", &["q"]),
            r#"<p:a xmlns:p="urn:p" xmlns:q="urn:q"></p:a>"#
        );
    }

    #[test]
    fn test_attribute_prefix_sharing_a_uri() {
        let xml = r#"<r xmlns:a="urn:x" xmlns:b="urn:x"><e b:attr="1"/></r>"#;
        assert_eq!(
            subset(xml, "", "e", &[]),
            r#"<e xmlns:b="urn:x" b:attr="1"></e>"#
        );
    }

    #[test]
    fn test_default_namespace_undeclared() {
        let xml = r#"<a xmlns="urn:x"><b xmlns=""><c/></b></a>"#;
        let doc = Document::parse(xml).unwrap();
        let out = String::from_utf8(canonicalize(&doc, false, None, &[]).unwrap()).unwrap();
        assert_eq!(out, r#"<a xmlns="urn:x"><b xmlns=""><c></c></b></a>"#);
    }

    #[test]
    fn test_unused_default_not_rendered_on_prefixed_child() {
        let xml = r#"<a xmlns="urn:x" xmlns:p="urn:p"><p:b/></a>"#;
        assert_eq!(
            subset(xml, "urn:p", "b", &[]),
            r#"<p:b xmlns:p="urn:p"></p:b>"#
        );
    }
}
