#![forbid(unsafe_code)]

//! Owned, mutable XML document with ID attribute registration.
//!
//! Text is parsed by `uppsala`; the resulting tree is copied into an arena
//! addressed by [`NodeId`] so that it can be edited in place (the signature
//! engine inserts a `<ds:Signature>` subtree and fills in digest and
//! signature values).  Detached nodes stay in the arena but are no longer
//! reachable from the document root.

use crate::encoding;
use sigtuna_core::{ns, Error};
use std::collections::{BTreeMap, HashMap};

/// Index of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The arena index of this node.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A namespace-qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    /// The prefix as written in the source (`None` for unprefixed names).
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace_uri: Option<String>,
}

impl QName {
    pub fn new(prefix: Option<&str>, local_name: &str, namespace_uri: Option<&str>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_owned),
            local_name: local_name.to_owned(),
            namespace_uri: namespace_uri.filter(|u| !u.is_empty()).map(str::to_owned),
        }
    }

    /// Check the expanded name; `ns_uri` of `""` matches no namespace.
    pub fn matches(&self, ns_uri: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace_uri.as_deref().unwrap_or("") == ns_uri
    }

    /// The name as written: `prefix:local` or `local`.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local_name),
            None => self.local_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    /// Namespace declarations made on this element, as `(prefix, uri)`.
    /// The prefix is `""` for the default namespace; an empty URI
    /// undeclares the default namespace.
    pub namespace_declarations: Vec<(String, String)>,
}

impl Element {
    /// Value of an attribute without a namespace.
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace_uri.is_none() && a.name.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Value of an attribute looked up by its qualified (`prefix:local`) name.
    pub fn attribute_qualified(&self, qname: &str) -> Option<&str> {
        match qname.split_once(':') {
            None => self.attribute(qname),
            Some((prefix, local)) => self
                .attributes
                .iter()
                .find(|a| a.name.prefix.as_deref() == Some(prefix) && a.name.local_name == local)
                .map(|a| a.value.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingInstruction {
    pub target: String,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction(ProcessingInstruction),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed XML document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    /// Registered ID value → element.
    ids: HashMap<String, NodeId>,
    /// Element covered by the last successful signature verification.
    verified: Option<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            ids: HashMap::new(),
            verified: None,
        }
    }

    /// Parse XML text into an owned document.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let src = uppsala::parse(text).map_err(|e| Error::XmlParse(e.to_string()))?;
        let mut doc = Self::new();
        let root = doc.root();
        for child in src.children(src.root()) {
            doc.import(&src, child, root);
        }
        if doc.document_element().is_none() {
            return Err(Error::XmlParse("no document element".into()));
        }
        Ok(doc)
    }

    /// Parse XML from bytes, decoding by BOM or declared encoding.
    pub fn parse_bytes(data: &[u8]) -> Result<Self, Error> {
        let text = encoding::decode(data)?;
        Self::parse(&text)
    }

    fn import(&mut self, src: &uppsala::Document<'_>, from: uppsala::NodeId, parent: NodeId) {
        let kind = match src.node_kind(from) {
            Some(uppsala::NodeKind::Element(elem)) => NodeKind::Element(Element {
                name: QName::new(
                    elem.name.prefix.as_deref(),
                    &elem.name.local_name.to_string(),
                    elem.name.namespace_uri.as_deref(),
                ),
                attributes: elem.attributes.iter().map(import_attribute).collect(),
                namespace_declarations: elem
                    .namespace_declarations
                    .iter()
                    .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
                    .filter(|(prefix, _)| prefix != "xml")
                    .collect(),
            }),
            Some(uppsala::NodeKind::Text(text)) | Some(uppsala::NodeKind::CData(text)) => {
                NodeKind::Text(text.to_string())
            }
            Some(uppsala::NodeKind::Comment(text)) => NodeKind::Comment(text.to_string()),
            Some(uppsala::NodeKind::ProcessingInstruction(pi)) => {
                NodeKind::ProcessingInstruction(ProcessingInstruction {
                    target: pi.target.to_string(),
                    data: pi.data.as_deref().map(str::to_owned),
                })
            }
            _ => return,
        };
        let id = self.push(kind);
        self.nodes[id.0].parent = Some(parent);
        self.nodes[parent.0].children.push(id);
        for child in src.children(from) {
            self.import(src, child, id);
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The document (root) element.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root()).find(|&c| self.element(c).is_some())
    }

    pub fn node_kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.node_kind(id) {
            Some(NodeKind::Element(e)) => Some(e),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element, Error> {
        self.verified = None;
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(e)) => Ok(e),
            _ => Err(Error::XmlStructure(format!("node {} is not an element", id.0))),
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = &self.nodes[self.parent(id)?.0].children;
        let pos = siblings.iter().position(|&c| c == id)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = &self.nodes[self.parent(id)?.0].children;
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// All descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).collect();
        stack.reverse();
        while let Some(n) = stack.pop() {
            out.push(n);
            let start = stack.len();
            stack.extend(self.children(n));
            stack[start..].reverse();
        }
        out
    }

    /// Child elements of `id`.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(move |&c| self.is_element(c))
    }

    /// First child element with the given expanded name.
    pub fn find_child(&self, id: NodeId, ns_uri: &str, local_name: &str) -> Option<NodeId> {
        self.child_elements(id)
            .find(|&c| self.is_named(c, ns_uri, local_name))
    }

    /// All child elements with the given expanded name.
    pub fn find_children(&self, id: NodeId, ns_uri: &str, local_name: &str) -> Vec<NodeId> {
        self.child_elements(id)
            .filter(|&c| self.is_named(c, ns_uri, local_name))
            .collect()
    }

    /// First descendant element (document order) with the given expanded name.
    pub fn find_descendant(&self, id: NodeId, ns_uri: &str, local_name: &str) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|&n| self.is_named(n, ns_uri, local_name))
    }

    /// First element anywhere in the document with the given expanded name.
    pub fn find_element(&self, ns_uri: &str, local_name: &str) -> Option<NodeId> {
        self.find_descendant(self.root(), ns_uri, local_name)
    }

    pub fn is_named(&self, id: NodeId, ns_uri: &str, local_name: &str) -> bool {
        self.element(id)
            .is_some_and(|e| e.name.matches(ns_uri, local_name))
    }

    /// Value of an un-namespaced attribute on an element.
    pub fn attribute(&self, id: NodeId, local_name: &str) -> Option<&str> {
        self.element(id)?.attribute(local_name)
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(NodeKind::Text(t)) = self.node_kind(id) {
            out.push_str(t);
        }
        for d in self.descendants(id) {
            if let Some(NodeKind::Text(t)) = self.node_kind(d) {
                out.push_str(t);
            }
        }
        out
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Whether the node is reachable from the document node.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len() && self.is_ancestor_or_self(self.root(), id)
    }

    /// In-scope namespace bindings of an element, `prefix → uri`.
    pub fn in_scope_namespaces(&self, id: NodeId) -> BTreeMap<String, String> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(n) = current {
            if let Some(e) = self.element(n) {
                chain.push(e);
            }
            current = self.parent(n);
        }
        let mut result = BTreeMap::new();
        for e in chain.into_iter().rev() {
            for (prefix, uri) in &e.namespace_declarations {
                if uri.is_empty() {
                    result.remove(prefix);
                } else {
                    result.insert(prefix.clone(), uri.clone());
                }
            }
        }
        result
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Create a detached element.
    pub fn create_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
    ) -> NodeId {
        self.push(NodeKind::Element(Element {
            name: QName::new(prefix, local_name, namespace_uri),
            attributes: Vec::new(),
            namespace_declarations: Vec::new(),
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_owned()))
    }

    /// Set an un-namespaced attribute, replacing an existing value.
    pub fn set_attribute(&mut self, id: NodeId, local_name: &str, value: &str) -> Result<(), Error> {
        let elem = self.element_mut(id)?;
        if let Some(a) = elem
            .attributes
            .iter_mut()
            .find(|a| a.name.namespace_uri.is_none() && a.name.local_name == local_name)
        {
            a.value = value.to_owned();
        } else {
            elem.attributes.push(Attribute {
                name: QName::new(None, local_name, None),
                value: value.to_owned(),
            });
        }
        Ok(())
    }

    /// Declare a namespace on an element (`""` prefix for the default).
    pub fn declare_namespace(&mut self, id: NodeId, prefix: &str, uri: &str) -> Result<(), Error> {
        let elem = self.element_mut(id)?;
        elem.namespace_declarations.retain(|(p, _)| p != prefix);
        elem.namespace_declarations.push((prefix.to_owned(), uri.to_owned()));
        Ok(())
    }

    /// Replace all children of an element with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), Error> {
        self.element_mut(id)?;
        for child in std::mem::take(&mut self.nodes[id.0].children) {
            self.nodes[child.0].parent = None;
        }
        let t = self.create_text(text);
        self.append_child(id, t)
    }

    /// Append a detached node as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        let index = self.nodes.get(parent.0).map_or(0, |n| n.children.len());
        self.insert_child(parent, index, child)
    }

    /// Insert a detached node at position `index` among `parent`'s children.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), Error> {
        self.check_insertable(parent, child)?;
        self.verified = None;
        let siblings = &mut self.nodes[parent.0].children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    /// Insert a detached node immediately after `sibling`.
    pub fn insert_after(&mut self, sibling: NodeId, child: NodeId) -> Result<(), Error> {
        let parent = self
            .parent(sibling)
            .ok_or_else(|| Error::XmlStructure("sibling has no parent".into()))?;
        let pos = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == sibling)
            .ok_or_else(|| Error::XmlStructure("sibling not found under its parent".into()))?;
        self.insert_child(parent, pos + 1, child)
    }

    /// Detach a node (and its subtree) from the tree.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            self.verified = None;
            self.nodes[parent.0].children.retain(|&c| c != id);
            self.nodes[id.0].parent = None;
        }
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        if parent.0 >= self.nodes.len() || child.0 >= self.nodes.len() {
            return Err(Error::XmlStructure("node does not belong to this document".into()));
        }
        if !matches!(self.nodes[parent.0].kind, NodeKind::Element(_) | NodeKind::Document) {
            return Err(Error::XmlStructure("parent cannot have children".into()));
        }
        if child == self.root() || self.nodes[child.0].parent.is_some() {
            return Err(Error::XmlStructure("node is already attached".into()));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(Error::XmlStructure("insertion would create a cycle".into()));
        }
        Ok(())
    }

    // ── ID attributes ────────────────────────────────────────────────

    /// Index every element carrying `attr_name` by that attribute's value.
    ///
    /// `attr_name` is either a local name (un-namespaced attribute) or a
    /// qualified `prefix:local` name.  Fails without changing the index if
    /// two elements carry the same value.  Returns how many elements were
    /// indexed.
    pub fn register_id_attribute(&mut self, attr_name: &str) -> Result<usize, Error> {
        let mut found: HashMap<String, NodeId> = HashMap::new();
        for node in self.descendants(self.root()) {
            let Some(value) = self
                .element(node)
                .and_then(|e| e.attribute_qualified(attr_name))
            else {
                continue;
            };
            let owner = found.get(value).copied().or_else(|| {
                self.ids
                    .get(value)
                    .copied()
                    .filter(|&n| self.is_attached(n))
            });
            if owner.is_some_and(|n| n != node) {
                return Err(Error::IdRegistration(format!("duplicate ID value: {value}")));
            }
            found.insert(value.to_owned(), node);
        }
        let count = found.len();
        tracing::trace!(attr = attr_name, count, "registered ID attribute");
        self.ids.extend(found);
        Ok(count)
    }

    /// Register a single element under an ID value.
    pub fn register_id(&mut self, value: &str, node: NodeId) -> Result<(), Error> {
        if !self.is_element(node) {
            return Err(Error::IdRegistration("ID target is not an element".into()));
        }
        match self.ids.get(value) {
            Some(&existing) if existing != node && self.is_attached(existing) => Err(
                Error::IdRegistration(format!("duplicate ID value: {value}")),
            ),
            _ => {
                self.ids.insert(value.to_owned(), node);
                Ok(())
            }
        }
    }

    /// Find an attached element by a registered ID value.
    pub fn find_by_id(&self, value: &str) -> Option<NodeId> {
        self.ids
            .get(value)
            .copied()
            .filter(|&n| self.is_attached(n))
    }

    // ── Verified scope ───────────────────────────────────────────────

    /// Record the element a verified signature covers (`None` clears it).
    ///
    /// Any later edit of the tree clears the record again.
    pub fn set_verified(&mut self, element: Option<NodeId>) {
        self.verified = element.filter(|&e| self.is_element(e));
    }

    /// The element covered by the last successful verification, if the
    /// tree has not been edited since.
    pub fn verified_element(&self) -> Option<NodeId> {
        self.verified.filter(|&e| self.is_attached(e))
    }

    /// Serialize the document with an XML declaration.
    pub fn to_xml_string(&self) -> String {
        let mut w = crate::writer::XmlWriter::new();
        w.write_declaration();
        w.write_document(self);
        w.into_string()
    }
}

fn import_attribute(attr: &uppsala::Attribute<'_>) -> Attribute {
    let namespace_uri = attr.name.namespace_uri.as_deref();
    // Keep the prefix as written: two prefixes bound to one URI stay distinct.
    let prefix = match namespace_uri {
        Some(ns::XML) => Some("xml"),
        Some(_) => attr.name.prefix.as_deref(),
        None => None,
    };
    Attribute {
        name: QName::new(prefix, &attr.name.local_name.to_string(), namespace_uri),
        value: attr.value.to_string(),
    }
}
