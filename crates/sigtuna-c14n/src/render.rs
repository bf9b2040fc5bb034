#![forbid(unsafe_code)]

//! Output primitives shared by the C14N variants: escaping, namespace
//! declarations and attributes in canonical order.

use sigtuna_xml::{Document, NodeId, NodeKind};
use std::cmp::Ordering;

/// Append text node content with C14N escaping (`& < > CR`).
pub fn push_text(out: &mut Vec<u8>, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '>' => out.extend_from_slice(b"&gt;"),
            '\r' => out.extend_from_slice(b"&#xD;"),
            _ => push_char(out, ch),
        }
    }
}

/// Append an attribute value with C14N escaping (`& < " TAB LF CR`).
pub fn push_attr_value(out: &mut Vec<u8>, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '"' => out.extend_from_slice(b"&quot;"),
            '\t' => out.extend_from_slice(b"&#x9;"),
            '\n' => out.extend_from_slice(b"&#xA;"),
            '\r' => out.extend_from_slice(b"&#xD;"),
            _ => push_char(out, ch),
        }
    }
}

fn push_char(out: &mut Vec<u8>, ch: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
}

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// `""` for the default namespace.
    pub prefix: String,
    pub uri: String,
}

impl NsDecl {
    pub fn write(&self, out: &mut Vec<u8>) {
        if self.prefix.is_empty() {
            out.extend_from_slice(b" xmlns=\"");
        } else {
            out.extend_from_slice(b" xmlns:");
            out.extend_from_slice(self.prefix.as_bytes());
            out.extend_from_slice(b"=\"");
        }
        push_attr_value(out, &self.uri);
        out.push(b'"');
    }
}

// Default namespace first, then by prefix.
impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> Ordering {
        (!self.prefix.is_empty(), &self.prefix).cmp(&(!other.prefix.is_empty(), &other.prefix))
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// `""` for attributes in no namespace.
    pub ns_uri: String,
    pub local_name: String,
    pub qualified_name: String,
    pub value: String,
}

impl Attr {
    pub fn write(&self, out: &mut Vec<u8>) {
        out.push(b' ');
        out.extend_from_slice(self.qualified_name.as_bytes());
        out.extend_from_slice(b"=\"");
        push_attr_value(out, &self.value);
        out.push(b'"');
    }
}

// Un-namespaced attributes first, then by (namespace URI, local name).
impl Ord for Attr {
    fn cmp(&self, other: &Self) -> Ordering {
        (!self.ns_uri.is_empty(), &self.ns_uri, &self.local_name).cmp(&(
            !other.ns_uri.is_empty(),
            &other.ns_uri,
            &other.local_name,
        ))
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The element's own attributes in canonical order.
pub fn sorted_attrs(doc: &Document, id: NodeId) -> Vec<Attr> {
    let Some(elem) = doc.element(id) else {
        return Vec::new();
    };
    let mut attrs: Vec<Attr> = elem
        .attributes
        .iter()
        .map(|a| Attr {
            ns_uri: a.name.namespace_uri.clone().unwrap_or_default(),
            local_name: a.name.local_name.clone(),
            qualified_name: a.name.qualified(),
            value: a.value.clone(),
        })
        .collect();
    attrs.sort();
    attrs
}

pub fn write_start_tag(out: &mut Vec<u8>, name: &str, ns_decls: &[NsDecl], attrs: &[Attr]) {
    out.push(b'<');
    out.extend_from_slice(name.as_bytes());
    for d in ns_decls {
        d.write(out);
    }
    for a in attrs {
        a.write(out);
    }
    out.push(b'>');
}

pub fn write_end_tag(out: &mut Vec<u8>, name: &str) {
    out.extend_from_slice(b"</");
    out.extend_from_slice(name.as_bytes());
    out.push(b'>');
}

/// Write a comment or processing instruction.  Nodes outside the document
/// element are separated from it by a line feed.
pub fn write_misc(out: &mut Vec<u8>, doc: &Document, id: NodeId) {
    let top_level = doc
        .parent(id)
        .is_some_and(|p| matches!(doc.node_kind(p), Some(NodeKind::Document)));
    let before = top_level && sibling_element(doc, id, Document::previous_sibling);
    let after = top_level && sibling_element(doc, id, Document::next_sibling);

    if before {
        out.push(b'\n');
    }
    match doc.node_kind(id) {
        Some(NodeKind::Comment(text)) => {
            out.extend_from_slice(b"<!--");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b"-->");
        }
        Some(NodeKind::ProcessingInstruction(pi)) => {
            out.extend_from_slice(b"<?");
            out.extend_from_slice(pi.target.as_bytes());
            if let Some(data) = pi.data.as_deref().filter(|d| !d.is_empty()) {
                out.push(b' ');
                out.extend_from_slice(data.replace('\r', "&#xD;").as_bytes());
            }
            out.extend_from_slice(b"?>");
        }
        _ => {}
    }
    if after {
        out.push(b'\n');
    }
}

fn sibling_element(
    doc: &Document,
    id: NodeId,
    step: fn(&Document, NodeId) -> Option<NodeId>,
) -> bool {
    let mut sib = step(doc, id);
    while let Some(s) = sib {
        if doc.is_element(s) {
            return true;
        }
        sib = step(doc, s);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> String {
        let mut out = Vec::new();
        push_text(&mut out, s);
        String::from_utf8(out).unwrap()
    }

    fn attr(s: &str) -> String {
        let mut out = Vec::new();
        push_attr_value(&mut out, s);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_escaping() {
        assert_eq!(text("a&b<c>d\r"), "a&amp;b&lt;c&gt;d&#xD;");
        assert_eq!(attr("a&b\"c>"), "a&amp;b&quot;c>");
        assert_eq!(attr("a\tb\nc\rd"), "a&#x9;b&#xA;c&#xD;d");
        assert_eq!(text("åäö"), "åäö");
    }

    #[test]
    fn test_canonical_order() {
        let mut decls = vec![
            NsDecl { prefix: "b".into(), uri: "u".into() },
            NsDecl { prefix: "".into(), uri: "d".into() },
            NsDecl { prefix: "a".into(), uri: "u".into() },
        ];
        decls.sort();
        let prefixes: Vec<&str> = decls.iter().map(|d| d.prefix.as_str()).collect();
        assert_eq!(prefixes, ["", "a", "b"]);

        let mk = |ns: &str, local: &str| Attr {
            ns_uri: ns.into(),
            local_name: local.into(),
            qualified_name: local.into(),
            value: String::new(),
        };
        let mut attrs = vec![mk("urn:z", "a"), mk("", "b"), mk("urn:a", "z"), mk("", "a")];
        attrs.sort();
        let keys: Vec<(&str, &str)> = attrs
            .iter()
            .map(|a| (a.ns_uri.as_str(), a.local_name.as_str()))
            .collect();
        assert_eq!(keys, [("", "a"), ("", "b"), ("urn:a", "z"), ("urn:z", "a")]);
    }
}
