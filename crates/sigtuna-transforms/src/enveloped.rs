#![forbid(unsafe_code)]

//! Enveloped signature transform: removes the `<Signature>` element that
//! contains the reference from the node set.

use crate::pipeline::{Transform, TransformData};
use sigtuna_core::{algorithm, Error};
use sigtuna_xml::NodeId;

pub struct EnvelopedSignatureTransform {
    signature: NodeId,
}

impl EnvelopedSignatureTransform {
    pub fn new(signature: NodeId) -> Self {
        Self { signature }
    }
}

impl Transform for EnvelopedSignatureTransform {
    fn uri(&self) -> &str {
        algorithm::ENVELOPED_SIGNATURE
    }

    fn execute<'a>(&self, input: TransformData<'a>) -> Result<TransformData<'a>, Error> {
        match input {
            TransformData::Xml { doc, mut node_set } => {
                node_set.remove_subtree(self.signature, doc);
                Ok(TransformData::Xml { doc, node_set })
            }
            TransformData::Binary(_) => Err(Error::Transform(
                "enveloped-signature transform requires XML input".into(),
            )),
        }
    }
}
