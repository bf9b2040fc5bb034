#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 and 1.1.
//!
//! Every in-scope namespace of an output element is rendered unless the
//! nearest output ancestor already rendered the same binding.  The two
//! versions differ only for document subsets: 1.1 does not inherit
//! `xml:id` and joins the `xml:base` values of omitted ancestors.

use crate::render::{self, Attr, NsDecl};
use sigtuna_core::Error;
use sigtuna_xml::{Document, NodeId, NodeKind, NodeSet};
use std::collections::BTreeMap;

/// Canonical XML 1.0 of `doc`, optionally restricted to `node_set`.
pub fn canonicalize(
    doc: &Document,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    walk(doc, with_comments, node_set, false)
}

/// Canonical XML 1.1 of `doc`, optionally restricted to `node_set`.
pub fn canonicalize_11(
    doc: &Document,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    walk(doc, with_comments, node_set, true)
}

fn walk(
    doc: &Document,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    v11: bool,
) -> Result<Vec<u8>, Error> {
    let mut walker = Walker {
        doc,
        with_comments,
        node_set,
        v11,
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
    v11: bool,
    out: Vec<u8>,
}

impl Walker<'_> {
    fn visible(&self, id: NodeId) -> bool {
        self.node_set.map_or(true, |ns| ns.contains_id(id))
    }

    /// `rendered` holds the bindings in effect at the nearest output ancestor.
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

                let scope = doc.in_scope_namespaces(id);
                let mut decls: Vec<NsDecl> = scope
                    .iter()
                    .filter(|(p, _)| p.as_str() != "xml")
                    .filter(|(p, u)| rendered.get(*p) != Some(*u))
                    .map(|(p, u)| NsDecl {
                        prefix: p.clone(),
                        uri: u.clone(),
                    })
                    .collect();
                let parent_default = rendered.get("").filter(|u| !u.is_empty());
                if parent_default.is_some() && !scope.contains_key("") {
                    decls.push(NsDecl {
                        prefix: String::new(),
                        uri: String::new(),
                    });
                }
                decls.sort();

                let mut attrs = render::sorted_attrs(doc, id);
                if self.node_set.is_some() {
                    self.inherit_xml_attrs(id, &mut attrs);
                }

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

    /// In a document subset, an output element whose parent is omitted
    /// picks up the `xml:*` attributes of its omitted ancestors.
    fn inherit_xml_attrs(&self, id: NodeId, attrs: &mut Vec<Attr>) {
        let doc = self.doc;
        let parent_visible = doc
            .parent(id)
            .is_some_and(|p| doc.is_element(p) && self.visible(p));
        if parent_visible {
            return;
        }
        // nearest omitted ancestor first
        let mut bases: Vec<String> = Vec::new();
        let mut ancestor = doc.parent(id);
        while let Some(a) = ancestor {
            if self.visible(a) {
                break;
            }
            if let Some(e) = doc.element(a) {
                for attr in &e.attributes {
                    if attr.name.prefix.as_deref() != Some("xml") {
                        continue;
                    }
                    if self.v11 {
                        match attr.name.local_name.as_str() {
                            "id" => continue,
                            "base" => {
                                bases.push(attr.value.clone());
                                continue;
                            }
                            _ => {}
                        }
                    }
                    if attrs.iter().any(|x| x.qualified_name == attr.name.qualified()) {
                        continue;
                    }
                    attrs.push(Attr {
                        ns_uri: sigtuna_core::ns::XML.to_string(),
                        local_name: attr.name.local_name.clone(),
                        qualified_name: attr.name.qualified(),
                        value: attr.value.clone(),
                    });
                }
            }
            ancestor = doc.parent(a);
        }
        if let Some(inherited) = bases.into_iter().rev().reduce(|acc, b| join_base(&acc, &b)) {
            match attrs.iter_mut().find(|a| a.qualified_name == "xml:base") {
                Some(own) => own.value = join_base(&inherited, &own.value),
                None => attrs.push(Attr {
                    ns_uri: sigtuna_core::ns::XML.to_string(),
                    local_name: "base".into(),
                    qualified_name: "xml:base".into(),
                    value: inherited,
                }),
            }
        }
        attrs.sort();
    }
}

/// Resolve `reference` against `base` (RFC 3986 when `base` is absolute).
fn join_base(base: &str, reference: &str) -> String {
    if reference.is_empty() {
        return base.to_owned();
    }
    if url::Url::parse(reference).is_ok() {
        return reference.to_owned();
    }
    if let Ok(joined) = url::Url::parse(base).and_then(|b| b.join(reference)) {
        return joined.to_string();
    }
    if reference.starts_with('/') {
        return reference.to_owned();
    }
    match base.rfind('/') {
        Some(slash) => format!("{}{reference}", &base[..=slash]),
        None => reference.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn c14n(xml: &str, with_comments: bool) -> String {
        let doc = Document::parse(xml).unwrap();
        String::from_utf8(canonicalize(&doc, with_comments, None).unwrap()).unwrap()
    }

    #[test]
    fn test_attribute_order_and_empty_elements() {
        assert_eq!(
            c14n(r#"<doc b="2" a="1" xmlns:z="urn:z" z:c="3"><e/></doc>"#, false),
            r#"<doc xmlns:z="urn:z" a="1" b="2" z:c="3"><e></e></doc>"#
        );
    }

    #[test]
    fn test_redundant_declarations_dropped() {
        assert_eq!(
            c14n(r#"<a xmlns="urn:x"><b xmlns="urn:x"><c xmlns=""/></b></a>"#, false),
            r#"<a xmlns="urn:x"><b><c xmlns=""></c></b></a>"#
        );
    }

    #[test]
    fn test_comments_and_pis() {
        let xml = "<?pi data?><!--pre--><r><!--in-->t</r><!--post-->";
        assert_eq!(c14n(xml, false), "<?pi data?>\n<r>t</r>");
        assert_eq!(
            c14n(xml, true),
            "<?pi data?>\n<!--pre-->\n<r><!--in-->t</r>\n<!--post-->"
        );
    }

    fn subset(xml: &str, local: &str, v11: bool) -> String {
        let doc = Document::parse(xml).unwrap();
        let apex = doc.find_element("", local).unwrap();
        let set = NodeSet::tree_without_comments(apex, &doc);
        let out = if v11 {
            canonicalize_11(&doc, false, Some(&set))
        } else {
            canonicalize(&doc, false, Some(&set))
        };
        String::from_utf8(out.unwrap()).unwrap()
    }

    const XML_ATTRS: &str = r#"<r xml:base="http://example.org/dir/" xml:id="top" xml:lang="en"><a xml:base="sub/"><b/></a></r>"#;

    #[test]
    fn test_c14n10_inherits_every_xml_attribute() {
        assert_eq!(
            subset(XML_ATTRS, "a", false),
            r#"<a xml:base="sub/" xml:id="top" xml:lang="en"><b></b></a>"#
        );
    }

    #[test]
    fn test_c14n11_joins_base_and_drops_id() {
        assert_eq!(
            subset(XML_ATTRS, "a", true),
            r#"<a xml:base="http://example.org/dir/sub/" xml:lang="en"><b></b></a>"#
        );
        // An apex without its own xml:base takes the joined ancestor value.
        assert_eq!(
            subset(XML_ATTRS, "b", true),
            r#"<b xml:base="http://example.org/dir/sub/" xml:lang="en"></b>"#
        );
    }

    #[test]
    fn test_c14n11_matches_c14n10_on_whole_documents() {
        let doc = Document::parse(XML_ATTRS).unwrap();
        assert_eq!(
            canonicalize_11(&doc, false, None).unwrap(),
            canonicalize(&doc, false, None).unwrap()
        );
    }

    #[test]
    fn test_join_base() {
        assert_eq!(join_base("http://example.org/a/b", "c"), "http://example.org/a/c");
        assert_eq!(join_base("http://example.org/a/", "urn:x"), "urn:x");
        assert_eq!(join_base("dir/", "sub/"), "dir/sub/");
        assert_eq!(join_base("dir/x", ""), "dir/x");
    }

    #[test]
    fn test_subset_renders_ancestor_namespaces() {
        let xml = r#"<r xmlns:p="urn:p" xmlns:q="urn:q" xml:lang="en"><p:a><b/></p:a></r>"#;
        let doc = Document::parse(xml).unwrap();
        let a = doc.find_element("urn:p", "a").unwrap();
        let set = NodeSet::tree_without_comments(a, &doc);
        let out = String::from_utf8(canonicalize(&doc, false, Some(&set)).unwrap()).unwrap();
        assert_eq!(
            out,
            r#"<p:a xmlns:p="urn:p" xmlns:q="urn:q" xml:lang="en"><b></b></p:a>"#
        );
    }
}
