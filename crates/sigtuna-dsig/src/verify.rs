#![forbid(unsafe_code)]

//! XML-DSig signature verification.
//!
//! Processing order:
//! 1. Register ID attributes, locate the first `<Signature>`
//! 2. Read `<SignedInfo>`: CanonicalizationMethod, SignatureMethod
//! 3. Check the Signature sits on the document element or on an Assertion
//!    directly under it
//! 4. For each `<Reference>`: resolve URI, run transforms, compare digest
//! 5. Canonicalize `<SignedInfo>`
//! 6. Check `<SignatureValue>` against candidate keys from the manager
//!
//! Every semantic failure yields the same [`VerifyOutcome::Invalid`];
//! the reason is only logged.  On success the covered element is recorded
//! on the document ([`Document::verified_element`]) so that field
//! extraction reads the content the signature vouches for.

use crate::context::{SignContext, VerifyOptions};
use crate::sign::canonical_signed_info;
use base64::Engine;
use sigtuna_core::{ns, Error};
use sigtuna_crypto::{digest::constant_time_eq, HashAlg, TransformId};
use sigtuna_keys::{keyinfo, KeysManager};
use sigtuna_transforms::{uri, TransformData, TransformPipeline};
use sigtuna_xml::{Document, NodeId};

/// Result of a completed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid,
    Invalid,
}

impl VerifyOutcome {
    pub fn is_valid(self) -> bool {
        self == VerifyOutcome::Valid
    }
}

impl From<bool> for VerifyOutcome {
    fn from(valid: bool) -> Self {
        if valid {
            VerifyOutcome::Valid
        } else {
            VerifyOutcome::Invalid
        }
    }
}

fn invalid(reason: &str) -> Result<VerifyOutcome, Error> {
    tracing::debug!(reason, "signature invalid");
    Ok(VerifyOutcome::Invalid)
}

/// Verify the enveloped signature of `doc` against the keys in `manager`.
///
/// `Err` is reserved for documents that cannot be processed at all:
/// no Signature, missing required children, duplicate IDs, unsupported
/// algorithms.
pub fn verify_document(
    manager: &KeysManager,
    doc: &mut Document,
    opts: &VerifyOptions,
) -> Result<VerifyOutcome, Error> {
    doc.set_verified(None);
    doc.register_id_attribute(opts.id_attr())?;
    let outcome = verify_signature(manager, doc, opts)?;
    if outcome.is_valid() {
        let covered = doc
            .find_element(ns::DSIG, ns::node::SIGNATURE)
            .and_then(|signature| signed_scope(doc, signature));
        doc.set_verified(covered);
    }
    Ok(outcome)
}

/// The element a SAML signature vouches for.
///
/// The Signature must be a child of the document element or of an
/// Assertion directly under it.  A `""` Reference covers the whole
/// document; `#id` References cover the Signature's parent.
pub fn signed_scope(doc: &Document, signature: NodeId) -> Option<NodeId> {
    let root = doc.document_element()?;
    let parent = doc.parent(signature)?;
    let placed = parent == root
        || (doc.parent(parent) == Some(root)
            && doc.is_named(parent, ns::SAML_ASSERTION, ns::node::ASSERTION));
    if !placed {
        return None;
    }
    let whole_document = doc
        .find_child(signature, ns::DSIG, ns::node::SIGNED_INFO)
        .map(|si| {
            doc.find_children(si, ns::DSIG, ns::node::REFERENCE)
                .into_iter()
                .any(|r| doc.attribute(r, ns::attr::URI).unwrap_or("").is_empty())
        })
        .unwrap_or(false);
    Some(if whole_document { root } else { parent })
}

fn verify_signature(
    manager: &KeysManager,
    doc: &Document,
    opts: &VerifyOptions,
) -> Result<VerifyOutcome, Error> {
    let signature = doc
        .find_element(ns::DSIG, ns::node::SIGNATURE)
        .ok_or_else(|| Error::MissingElement("Signature".into()))?;
    let signed_info = required_child(doc, signature, ns::node::SIGNED_INFO)?;

    let method = required_child(doc, signed_info, ns::node::SIGNATURE_METHOD)?;
    let method_uri = required_algorithm(doc, method)?;
    let transform = TransformId::require(method_uri)?;
    if !transform.is_signature() {
        return Err(Error::UnsupportedAlgorithm(format!(
            "{method_uri} is not a signature algorithm"
        )));
    }

    let references = doc.find_children(signed_info, ns::DSIG, ns::node::REFERENCE);
    if references.is_empty() {
        return Err(Error::MissingElement("Reference".into()));
    }
    if signed_scope(doc, signature).is_none() {
        return invalid("Signature is not on the document element or a top-level Assertion");
    }
    for reference in references {
        if verify_reference(doc, signature, reference, opts.debug)? == VerifyOutcome::Invalid {
            return Ok(VerifyOutcome::Invalid);
        }
    }

    let signed_info_octets = canonical_signed_info(doc, signed_info)?;
    if opts.debug {
        tracing::trace!(data = %String::from_utf8_lossy(&signed_info_octets), "pre-signature");
    }

    let value_node = required_child(doc, signature, ns::node::SIGNATURE_VALUE)?;
    let Some(signature_value) = decode_base64(&doc.text_content(value_node)) else {
        return invalid("SignatureValue is not base64");
    };

    let key_info = doc.find_child(signature, ns::DSIG, ns::node::KEY_INFO);
    let candidates = keyinfo::candidate_keys(doc, key_info, manager, transform);
    for key in &candidates {
        let mut ctx = match SignContext::new(key, transform) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::debug!(error = %e, "skipping key");
                continue;
            }
        };
        ctx.update(&signed_info_octets);
        match ctx.finalize_verify(&signature_value) {
            Ok(true) => {
                tracing::debug!(%transform, key = ?key.data, "signature valid");
                return Ok(VerifyOutcome::Valid);
            }
            Ok(false) => {}
            Err(e) => tracing::debug!(error = %e, "key failed to verify"),
        }
    }
    if candidates.is_empty() {
        invalid("no matching key")
    } else {
        invalid("signature value mismatch")
    }
}

fn verify_reference(
    doc: &Document,
    signature: NodeId,
    reference: NodeId,
    debug: bool,
) -> Result<VerifyOutcome, Error> {
    let ref_uri = doc.attribute(reference, ns::attr::URI).unwrap_or("");
    if !ref_uri.is_empty() && !ref_uri.starts_with('#') {
        return invalid("reference is not a same-document URI");
    }

    let digest_method = required_child(doc, reference, ns::node::DIGEST_METHOD)?;
    let digest_uri = required_algorithm(doc, digest_method)?;
    let hash = HashAlg::from_uri(digest_uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("digest: {digest_uri}")))?;
    let digest_value = required_child(doc, reference, ns::node::DIGEST_VALUE)?;
    let Some(expected) = decode_base64(&doc.text_content(digest_value)) else {
        return invalid("DigestValue is not base64");
    };

    let resolved = match uri::resolve_uri(doc, ref_uri) {
        Ok(r) => r,
        Err(Error::InvalidUri(reason)) => return invalid(&reason),
        Err(e) => return Err(e),
    };
    // A SAML signature covers exactly the element that contains it.
    if let Some(target) = resolved.target {
        if doc.parent(signature) != Some(target) {
            return invalid("reference does not point at the signed element");
        }
    }

    let pipeline = match doc.find_child(reference, ns::DSIG, ns::node::TRANSFORMS) {
        Some(t) => TransformPipeline::from_element(doc, t, signature)?,
        None => TransformPipeline::new(),
    };
    let data = TransformData::Xml {
        doc,
        node_set: resolved.node_set,
    };
    let octets = pipeline.execute(data)?.into_binary()?;
    if debug {
        tracing::trace!(uri = ref_uri, data = %String::from_utf8_lossy(&octets), "pre-digest");
    }

    if constant_time_eq(&hash.digest(&octets), &expected) {
        Ok(VerifyOutcome::Valid)
    } else {
        invalid("digest mismatch")
    }
}

fn required_child(doc: &Document, parent: NodeId, local_name: &str) -> Result<NodeId, Error> {
    doc.find_child(parent, ns::DSIG, local_name)
        .ok_or_else(|| Error::MissingElement(local_name.into()))
}

fn required_algorithm(doc: &Document, node: NodeId) -> Result<&str, Error> {
    doc.attribute(node, ns::attr::ALGORITHM).ok_or_else(|| {
        let name = doc.element(node).map(|e| e.name.local_name.as_str()).unwrap_or("");
        Error::MissingAttribute(format!("Algorithm on {name}"))
    })
}

fn decode_base64(text: &str) -> Option<Vec<u8>> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD.decode(clean).ok()
}
