#![forbid(unsafe_code)]

//! Enveloped XML-DSig signature creation.
//!
//! The document element is signed.  Digests and the signature value are
//! computed in the tree, through the same transform pipeline verification
//! uses.

use crate::context::{SignContext, SignOptions};
use crate::template::{self, SignatureTemplate};
use base64::Engine;
use sigtuna_c14n::C14nMode;
use sigtuna_core::{ns, Error};
use sigtuna_crypto::TransformId;
use sigtuna_keys::Key;
use sigtuna_transforms::{uri, TransformData, TransformPipeline};
use sigtuna_xml::{Document, NodeId, NodeSet};

/// Sign the document element of `doc` in place.
///
/// On error the document content is unchanged.  (IDs found under
/// `opts.id_attr` may stay registered.)
pub fn sign_document(key: &Key, transform: TransformId, doc: &mut Document, opts: &SignOptions) -> Result<(), Error> {
    // Fail early on an unusable key before touching the tree.
    SignContext::new(key, transform)?;

    let root = doc
        .document_element()
        .ok_or_else(|| Error::MissingElement("document element".into()))?;
    if doc.find_child(root, ns::DSIG, ns::node::SIGNATURE).is_some() {
        return Err(Error::AlreadySigned(
            "document element already carries a Signature".into(),
        ));
    }

    let id_attr = opts.id_attr();
    doc.register_id_attribute(id_attr)?;
    let reference_uri = match doc.element(root).and_then(|e| e.attribute_qualified(id_attr)) {
        Some(id) => {
            let id = id.to_owned();
            doc.register_id(&id, root)?;
            format!("#{id}")
        }
        None => String::new(),
    };

    let anchor = match &opts.insert_after {
        Some(after) => Some(
            doc.find_child(root, &after.namespace, &after.local_name)
                .ok_or_else(|| {
                    Error::InsertionPoint(format!(
                        "no {{{}}}{} child to insert the signature after",
                        after.namespace, after.local_name
                    ))
                })?,
        ),
        None => None,
    };

    let tpl = template::create(doc, key, transform, &reference_uri)?;
    match anchor {
        Some(sibling) => doc.insert_after(sibling, tpl.signature)?,
        None => doc.insert_child(root, 0, tpl.signature)?,
    }

    if let Err(e) = compute(key, transform, doc, &tpl, &reference_uri, opts.debug) {
        doc.detach(tpl.signature);
        return Err(e);
    }
    tracing::debug!(%transform, uri = %reference_uri, "signed document");
    Ok(())
}

/// Parse, sign and serialize in one step.
pub fn sign_xml_text(key: &Key, transform: TransformId, xml: &str, opts: &SignOptions) -> Result<String, Error> {
    let mut doc = Document::parse(xml)?;
    sign_document(key, transform, &mut doc, opts)?;
    Ok(doc.to_xml_string())
}

fn compute(
    key: &Key,
    transform: TransformId,
    doc: &mut Document,
    tpl: &SignatureTemplate,
    reference_uri: &str,
    debug: bool,
) -> Result<(), Error> {
    let engine = base64::engine::general_purpose::STANDARD;

    let digest = {
        let resolved = uri::resolve_uri(doc, reference_uri)?;
        let pipeline = TransformPipeline::from_element(doc, tpl.transforms, tpl.signature)?;
        let data = TransformData::Xml {
            doc: &*doc,
            node_set: resolved.node_set,
        };
        let octets = pipeline.execute(data)?.into_binary()?;
        if debug {
            tracing::trace!(data = %String::from_utf8_lossy(&octets), "pre-digest");
        }
        transform.hash().digest(&octets)
    };
    doc.set_text(tpl.digest_value, &engine.encode(digest))?;

    let signed_info = canonical_signed_info(doc, tpl.signed_info)?;
    if debug {
        tracing::trace!(data = %String::from_utf8_lossy(&signed_info), "pre-signature");
    }
    let mut ctx = SignContext::new(key, transform)?;
    ctx.update(&signed_info);
    let value = ctx.finalize_sign()?;
    doc.set_text(tpl.signature_value, &engine.encode(value))
}

pub(crate) fn canonical_signed_info(doc: &Document, signed_info: NodeId) -> Result<Vec<u8>, Error> {
    let method = doc
        .find_child(signed_info, ns::DSIG, ns::node::CANONICALIZATION_METHOD)
        .ok_or_else(|| Error::MissingElement("CanonicalizationMethod".into()))?;
    let c14n_uri = doc
        .attribute(method, ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute("Algorithm on CanonicalizationMethod".into()))?;
    let mode = C14nMode::from_uri(c14n_uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("C14N: {c14n_uri}")))?;
    let prefixes = sigtuna_transforms::pipeline::inclusive_prefixes(doc, method);
    let subset = NodeSet::tree_without_comments(signed_info, doc);
    sigtuna_c14n::canonicalize(doc, mode, Some(&subset), &prefixes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sigtuna_core::algorithm;
    use sigtuna_keys::loader;

    const RSA_KEY: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/keys/rsakey.pem"));
    const UNSIGNED: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/saml/response-unsigned.xml"));

    fn rsa_sha256() -> TransformId {
        TransformId::require(algorithm::RSA_SHA256).unwrap()
    }

    fn child_names(doc: &Document, id: NodeId) -> Vec<String> {
        doc.child_elements(id)
            .filter_map(|c| doc.element(c).map(|e| e.name.local_name.clone()))
            .collect()
    }

    #[test]
    fn test_signature_inserted_first() {
        let key = loader::load_key(RSA_KEY).unwrap();
        let mut doc = Document::parse(UNSIGNED).unwrap();
        sign_document(&key, rsa_sha256(), &mut doc, &SignOptions::new()).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(child_names(&doc, root)[0], "Signature");

        let reference = doc.find_element(ns::DSIG, ns::node::REFERENCE).unwrap();
        assert_eq!(doc.attribute(reference, ns::attr::URI), Some("#_resp1"));
        let value = doc.find_element(ns::DSIG, ns::node::SIGNATURE_VALUE).unwrap();
        assert!(!doc.text_content(value).is_empty());
    }

    #[test]
    fn test_insert_after_issuer() {
        let key = loader::load_key(RSA_KEY).unwrap();
        let mut doc = Document::parse(UNSIGNED).unwrap();
        let opts = SignOptions::new().with_insert_after(ns::SAML_ASSERTION, "Issuer");
        sign_document(&key, rsa_sha256(), &mut doc, &opts).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(child_names(&doc, root)[..3], ["Issuer", "Signature", "Status"]);
    }

    #[test]
    fn test_missing_insertion_point_leaves_document_alone() {
        let key = loader::load_key(RSA_KEY).unwrap();
        let mut doc = Document::parse(UNSIGNED).unwrap();
        let before = doc.to_xml_string();
        let opts = SignOptions::new().with_insert_after(ns::SAML_ASSERTION, "Nope");
        let err = sign_document(&key, rsa_sha256(), &mut doc, &opts).unwrap_err();
        assert!(matches!(err, Error::InsertionPoint(_)));
        assert_eq!(doc.to_xml_string(), before);
    }

    #[test]
    fn test_already_signed_rejected() {
        let key = loader::load_key(RSA_KEY).unwrap();
        let mut doc = Document::parse(UNSIGNED).unwrap();
        sign_document(&key, rsa_sha256(), &mut doc, &SignOptions::new()).unwrap();
        let signed = doc.to_xml_string();
        let err = sign_document(&key, rsa_sha256(), &mut doc, &SignOptions::new()).unwrap_err();
        assert!(matches!(err, Error::AlreadySigned(_)));
        assert_eq!(doc.to_xml_string(), signed);
    }

    #[test]
    fn test_without_id_reference_is_whole_document() {
        let key = loader::load_key(RSA_KEY).unwrap();
        let signed = sign_xml_text(&key, rsa_sha256(), "<doc><a/></doc>", &SignOptions::new()).unwrap();
        assert!(signed.starts_with("<?xml"));
        assert!(signed.contains(r#"<ds:Reference URI="">"#));
    }

    #[test]
    fn test_duplicate_ids_fail() {
        let key = loader::load_key(RSA_KEY).unwrap();
        let err = sign_xml_text(&key, rsa_sha256(), r#"<r ID="a"><c ID="a"/></r>"#, &SignOptions::new())
            .unwrap_err();
        assert!(matches!(err, Error::IdRegistration(_)));
    }

    #[test]
    fn test_public_key_cannot_sign() {
        let cert = loader::load_cert(include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/keys/rsacert.pem"))).unwrap();
        let mut doc = Document::parse(UNSIGNED).unwrap();
        let before = doc.to_xml_string();
        assert!(sign_document(&cert, rsa_sha256(), &mut doc, &SignOptions::new()).is_err());
        assert_eq!(doc.to_xml_string(), before);
    }

    #[test]
    fn test_parse_failure() {
        let key = loader::load_key(RSA_KEY).unwrap();
        assert!(matches!(
            sign_xml_text(&key, rsa_sha256(), "<unclosed>", &SignOptions::new()),
            Err(Error::XmlParse(_))
        ));
    }
}
