#![forbid(unsafe_code)]

//! Serialization of a [`Document`] through uppsala's `XmlWriter`.
//!
//! Output keeps prefixes, namespace declarations and attribute order as
//! stored in the tree.  Elements without children are written as empty
//! tags.

use crate::document::{Document, Element, NodeId, NodeKind};

/// XML text builder over a [`Document`] tree.
pub struct XmlWriter {
    writer: uppsala::XmlWriter,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            writer: uppsala::XmlWriter::new(),
        }
    }

    /// Write the XML declaration.
    pub fn write_declaration(&mut self) {
        self.writer.write_declaration();
    }

    /// Write every top-level node of a document.
    pub fn write_document(&mut self, doc: &Document) {
        for child in doc.children(doc.root()) {
            self.write_node(doc, child);
        }
    }

    /// Write a node and its subtree.
    pub fn write_node(&mut self, doc: &Document, id: NodeId) {
        match doc.node_kind(id) {
            Some(NodeKind::Document) => {
                for child in doc.children(id) {
                    self.write_node(doc, child);
                }
            }
            Some(NodeKind::Element(elem)) => {
                let name = elem.name.qualified();
                let owned = start_tag_attributes(elem);
                let attrs: Vec<(&str, &str)> = owned
                    .iter()
                    .map(|(n, v)| (n.as_str(), v.as_str()))
                    .collect();
                if doc.children(id).next().is_none() {
                    self.writer.empty_element(&name, &attrs);
                    return;
                }
                self.writer.start_element(&name, &attrs);
                for child in doc.children(id) {
                    self.write_node(doc, child);
                }
                self.writer.end_element(&name);
            }
            Some(NodeKind::Text(text)) => self.writer.text(text),
            Some(NodeKind::Comment(text)) => self.writer.comment(text),
            Some(NodeKind::ProcessingInstruction(pi)) => {
                let data = pi.data.as_deref().filter(|d| !d.is_empty());
                self.writer.processing_instruction(&pi.target, data);
            }
            None => {}
        }
    }

    pub fn into_string(self) -> String {
        self.writer.into_string()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_bytes()
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Namespace declarations first, then attributes, as `(qname, value)`.
fn start_tag_attributes(elem: &Element) -> Vec<(String, String)> {
    let decls = elem.namespace_declarations.iter().map(|(prefix, uri)| {
        let name = if prefix.is_empty() {
            "xmlns".to_owned()
        } else {
            format!("xmlns:{prefix}")
        };
        (name, uri.clone())
    });
    let attrs = elem
        .attributes
        .iter()
        .map(|a| (a.name.qualified(), a.value.clone()));
    decls.chain(attrs).collect()
}

#[cfg(test)]
mod tests {
    use crate::Document;
    use pretty_assertions::assert_eq;

    /// Serialized output without the XML declaration.
    fn body(doc: &Document) -> String {
        let xml = doc.to_xml_string();
        let rest = match xml.strip_prefix("<?xml") {
            Some(rest) => rest.split_once("?>").map_or("", |(_, b)| b),
            None => xml.as_str(),
        };
        rest.trim().to_owned()
    }

    #[test]
    fn test_serialize_keeps_prefixes() {
        let xml = r#"<p:a xmlns:p="urn:p" x="1&amp;2"><p:b/>t&lt;u<!--c--><?pi data?></p:a>"#;
        let doc = Document::parse(xml).unwrap();
        assert!(doc.to_xml_string().starts_with("<?xml"));
        assert_eq!(body(&doc), xml);
    }

    #[test]
    fn test_shared_uri_prefixes_round_trip() {
        let xml = r#"<r xmlns:a="urn:x" xmlns:b="urn:x"><e b:attr="1"/></r>"#;
        let doc = Document::parse(xml).unwrap();
        assert_eq!(body(&doc), xml);
    }

    #[test]
    fn test_reparse_is_structurally_equal() {
        let xml = "<r xmlns=\"urn:d\"><e xmlns=\"\" a=\"x &lt; y\">x</e></r>";
        let doc = Document::parse(xml).unwrap();
        let again = Document::parse(&doc.to_xml_string()).unwrap();
        assert_eq!(body(&again), body(&doc));
        let e = again.child_elements(again.document_element().unwrap()).next().unwrap();
        assert_eq!(again.attribute(e, "a"), Some("x < y"));
        assert!(again.element(e).unwrap().name.namespace_uri.is_none());
    }
}
