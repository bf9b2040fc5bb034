#![forbid(unsafe_code)]

//! Builds the `<ds:Signature>` skeleton for an enveloped SAML signature.
//!
//! ```text
//! <ds:Signature>
//!   <ds:SignedInfo>
//!     <ds:CanonicalizationMethod Algorithm="exc-c14n"/>
//!     <ds:SignatureMethod Algorithm="..."/>
//!     <ds:Reference URI="#id">
//!       <ds:Transforms> enveloped-signature, exc-c14n </ds:Transforms>
//!       <ds:DigestMethod Algorithm="..."/>
//!       <ds:DigestValue/>
//!     </ds:Reference>
//!   </ds:SignedInfo>
//!   <ds:SignatureValue/>
//!   <ds:KeyInfo>?
//! </ds:Signature>
//! ```

use sigtuna_core::{algorithm, ns, Error};
use sigtuna_crypto::TransformId;
use sigtuna_keys::{keyinfo, Key};
use sigtuna_xml::{Document, NodeId};

/// Handles to the parts of a freshly built, still detached, signature.
#[derive(Debug, Clone, Copy)]
pub struct SignatureTemplate {
    pub signature: NodeId,
    pub signed_info: NodeId,
    pub transforms: NodeId,
    pub digest_value: NodeId,
    pub signature_value: NodeId,
}

/// Create a detached signature template in `doc` referencing `uri`.
pub fn create(doc: &mut Document, key: &Key, transform: TransformId, uri: &str) -> Result<SignatureTemplate, Error> {
    if !transform.is_signature() {
        return Err(Error::UnsupportedAlgorithm(format!(
            "{transform} is not a signature algorithm"
        )));
    }

    let signature = element(doc, ns::node::SIGNATURE);
    doc.declare_namespace(signature, ns::DSIG_PREFIX, ns::DSIG)?;

    let signed_info = child(doc, signature, ns::node::SIGNED_INFO)?;
    let c14n = child(doc, signed_info, ns::node::CANONICALIZATION_METHOD)?;
    doc.set_attribute(c14n, ns::attr::ALGORITHM, algorithm::EXC_C14N)?;
    let method = child(doc, signed_info, ns::node::SIGNATURE_METHOD)?;
    doc.set_attribute(method, ns::attr::ALGORITHM, transform.uri())?;

    let reference = child(doc, signed_info, ns::node::REFERENCE)?;
    doc.set_attribute(reference, ns::attr::URI, uri)?;
    let transforms = child(doc, reference, ns::node::TRANSFORMS)?;
    for uri in [algorithm::ENVELOPED_SIGNATURE, algorithm::EXC_C14N] {
        let t = child(doc, transforms, ns::node::TRANSFORM)?;
        doc.set_attribute(t, ns::attr::ALGORITHM, uri)?;
    }
    let digest_method = child(doc, reference, ns::node::DIGEST_METHOD)?;
    doc.set_attribute(digest_method, ns::attr::ALGORITHM, transform.digest_uri())?;
    let digest_value = child(doc, reference, ns::node::DIGEST_VALUE)?;

    let signature_value = child(doc, signature, ns::node::SIGNATURE_VALUE)?;
    add_key_info(doc, signature, key)?;

    Ok(SignatureTemplate {
        signature,
        signed_info,
        transforms,
        digest_value,
        signature_value,
    })
}

/// `KeyName` for a named key, then `X509Data` when a certificate is
/// attached, or `RSAKeyValue` for a bare RSA key.  Nothing else is
/// published; HMAC secrets in particular never are.
fn add_key_info(doc: &mut Document, signature: NodeId, key: &Key) -> Result<(), Error> {
    let cert = keyinfo::certificate_value(key);
    let rsa = if cert.is_none() { keyinfo::rsa_key_value(key) } else { None };
    if key.name.is_none() && cert.is_none() && rsa.is_none() {
        return Ok(());
    }

    let key_info = child(doc, signature, ns::node::KEY_INFO)?;
    if let Some(name) = &key.name {
        let n = child(doc, key_info, ns::node::KEY_NAME)?;
        doc.set_text(n, name)?;
    }
    if let Some(cert) = cert {
        let data = child(doc, key_info, ns::node::X509_DATA)?;
        let c = child(doc, data, ns::node::X509_CERTIFICATE)?;
        doc.set_text(c, &cert)?;
    } else if let Some((modulus, exponent)) = rsa {
        let value = child(doc, key_info, ns::node::KEY_VALUE)?;
        let rsa_value = child(doc, value, ns::node::RSA_KEY_VALUE)?;
        let m = child(doc, rsa_value, ns::node::RSA_MODULUS)?;
        doc.set_text(m, &modulus)?;
        let e = child(doc, rsa_value, ns::node::RSA_EXPONENT)?;
        doc.set_text(e, &exponent)?;
    }
    Ok(())
}

fn element(doc: &mut Document, local_name: &str) -> NodeId {
    doc.create_element(Some(ns::DSIG_PREFIX), local_name, Some(ns::DSIG))
}

fn child(doc: &mut Document, parent: NodeId, local_name: &str) -> Result<NodeId, Error> {
    let e = element(doc, local_name);
    doc.append_child(parent, e)?;
    Ok(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigtuna_keys::loader;

    const RSA_KEY: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/keys/rsakey.pem"));
    const RSA_CERT: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/keys/rsacert.pem"));

    fn key_info_children(doc: &Document, t: &SignatureTemplate) -> Vec<String> {
        match doc.find_child(t.signature, ns::DSIG, ns::node::KEY_INFO) {
            Some(ki) => doc
                .child_elements(ki)
                .filter_map(|c| doc.element(c).map(|e| e.name.local_name.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    #[test]
    fn test_template_structure() {
        let mut doc = Document::parse("<r/>").unwrap();
        let key = loader::load_key(RSA_KEY).unwrap();
        let t = TransformId::require(algorithm::RSA_SHA256).unwrap();
        let tpl = create(&mut doc, &key, t, "#x").unwrap();

        assert!(!doc.is_attached(tpl.signature));
        let xml = {
            let mut w = sigtuna_xml::writer::XmlWriter::new();
            w.write_node(&doc, tpl.signature);
            w.into_string()
        };
        assert!(xml.starts_with(r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo>"#));
        assert!(xml.contains(r##"<ds:Reference URI="#x">"##));
        assert!(xml.contains(&format!(r#"<ds:DigestMethod Algorithm="{}"/>"#, algorithm::SHA256)));
        assert_eq!(key_info_children(&doc, &tpl), ["KeyValue"]);
    }

    #[test]
    fn test_key_info_variants() {
        let t = TransformId::require(algorithm::RSA_SHA256).unwrap();
        let mut doc = Document::parse("<r/>").unwrap();

        let mut key = loader::load_key(RSA_KEY).unwrap().with_name("idp");
        loader::attach_cert(&mut key, RSA_CERT).unwrap();
        let tpl = create(&mut doc, &key, t, "").unwrap();
        assert_eq!(key_info_children(&doc, &tpl), ["KeyName", "X509Data"]);

        let hmac = loader::load_hmac_key(b"secret");
        let h = TransformId::require(algorithm::HMAC_SHA256).unwrap();
        let tpl = create(&mut doc, &hmac, h, "").unwrap();
        assert!(key_info_children(&doc, &tpl).is_empty());
    }

    #[test]
    fn test_digest_transform_rejected() {
        let mut doc = Document::parse("<r/>").unwrap();
        let key = loader::load_hmac_key(b"secret");
        let t = TransformId::require(algorithm::SHA256).unwrap();
        assert!(create(&mut doc, &key, t, "").is_err());
    }
}
