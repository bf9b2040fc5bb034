#![forbid(unsafe_code)]

//! Transform pipeline and trait definitions.

use crate::enveloped::EnvelopedSignatureTransform;
use sigtuna_c14n::C14nMode;
use sigtuna_core::{algorithm, ns, Error};
use sigtuna_xml::{Document, NodeId, NodeSet};

/// Data flowing through the transform pipeline.
pub enum TransformData<'a> {
    /// A node set over a document (for XML-aware transforms like C14N).
    Xml {
        doc: &'a Document,
        node_set: NodeSet,
    },
    /// Raw octets.
    Binary(Vec<u8>),
}

impl TransformData<'_> {
    /// Convert to octets.  A node set left over at the end of the chain is
    /// serialized with inclusive C14N, as XML-DSig requires.
    pub fn into_binary(self) -> Result<Vec<u8>, Error> {
        match self {
            TransformData::Binary(data) => Ok(data),
            TransformData::Xml { doc, node_set } => {
                sigtuna_c14n::canonicalize(doc, C14nMode::Inclusive, Some(&node_set), &[])
            }
        }
    }
}

/// Trait for individual transforms.
pub trait Transform {
    /// The algorithm URI for this transform.
    fn uri(&self) -> &str;

    /// Execute the transform on the given data.
    fn execute<'a>(&self, input: TransformData<'a>) -> Result<TransformData<'a>, Error>;
}

/// A pipeline of transforms executed in sequence.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transform to the pipeline.
    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Build the pipeline described by a `<ds:Transforms>` element.
    /// `signature` is the enclosing `<ds:Signature>`, removed by the
    /// enveloped-signature transform.
    pub fn from_element(doc: &Document, transforms: NodeId, signature: NodeId) -> Result<Self, Error> {
        let mut pipeline = Self::new();
        for t in doc.find_children(transforms, ns::DSIG, ns::node::TRANSFORM) {
            let uri = doc.attribute(t, ns::attr::ALGORITHM).ok_or_else(|| {
                Error::MissingAttribute("Algorithm on Transform".into())
            })?;
            if uri == algorithm::ENVELOPED_SIGNATURE {
                pipeline.push(Box::new(EnvelopedSignatureTransform::new(signature)));
            } else if let Some(mode) = C14nMode::from_uri(uri) {
                let prefixes = inclusive_prefixes(doc, t);
                pipeline.push(Box::new(C14nTransform::new(mode, prefixes)));
            } else {
                return Err(Error::UnsupportedAlgorithm(format!("transform: {uri}")));
            }
        }
        Ok(pipeline)
    }

    /// Execute all transforms in order.
    pub fn execute<'a>(&self, input: TransformData<'a>) -> Result<TransformData<'a>, Error> {
        let mut data = input;
        for transform in &self.transforms {
            data = transform.execute(data)?;
        }
        Ok(data)
    }

    /// Algorithm URIs, in order.
    pub fn uris(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.uri()).collect()
    }

    /// Number of transforms in the pipeline.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check if pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

/// PrefixList of an `<ec:InclusiveNamespaces>` child, if any.
pub fn inclusive_prefixes(doc: &Document, method: NodeId) -> Vec<String> {
    doc.find_child(method, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|n| doc.attribute(n, ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

// ── C14N Transform ───────────────────────────────────────────────────

/// A canonicalization transform.
pub struct C14nTransform {
    mode: C14nMode,
    inclusive_prefixes: Vec<String>,
}

impl C14nTransform {
    pub fn new(mode: C14nMode, inclusive_prefixes: Vec<String>) -> Self {
        Self {
            mode,
            inclusive_prefixes,
        }
    }
}

impl Transform for C14nTransform {
    fn uri(&self) -> &str {
        self.mode.uri()
    }

    fn execute<'a>(&self, input: TransformData<'a>) -> Result<TransformData<'a>, Error> {
        let bytes = match input {
            TransformData::Xml { doc, node_set } => sigtuna_c14n::canonicalize(
                doc,
                self.mode,
                Some(&node_set),
                &self.inclusive_prefixes,
            )?,
            TransformData::Binary(data) => {
                let doc = Document::parse_bytes(&data)
                    .map_err(|e| Error::Transform(format!("C14N input: {e}")))?;
                sigtuna_c14n::canonicalize(&doc, self.mode, None, &self.inclusive_prefixes)?
            }
        };
        Ok(TransformData::Binary(bytes))
    }
}
