#![forbid(unsafe_code)]

//! `<ds:KeyInfo>` processing: selecting candidate verification keys from a
//! manager, and the values written into generated KeyInfo elements.

use crate::key::Key;
use crate::loader;
use crate::manager::KeysManager;
use base64::Engine;
use sigtuna_core::ns;
use sigtuna_crypto::TransformId;
use sigtuna_xml::{Document, NodeId};

/// Manager keys worth trying for a signature made with `transform`.
///
/// Selection falls through three rules, stopping at the first that yields
/// anything: keys matching an embedded `X509Certificate`, the key named by
/// `KeyName`, then every manager key `transform` accepts.
pub fn candidate_keys<'a>(
    doc: &Document,
    key_info: Option<NodeId>,
    manager: &'a KeysManager,
    transform: TransformId,
) -> Vec<&'a Key> {
    let usable = |k: &&Key| transform.accepts(&k.to_signing_key());

    if let Some(ki) = key_info {
        for cert_der in embedded_certificates(doc, ki) {
            let Ok(cert_key) = loader::load_cert_der(&cert_der) else {
                tracing::debug!("unparseable X509Certificate in KeyInfo");
                continue;
            };
            let mut found = manager.find_by_public_key(&cert_key);
            found.retain(usable);
            if !found.is_empty() {
                return found;
            }
        }

        if let Some(name_node) = doc.find_child(ki, ns::DSIG, ns::node::KEY_NAME) {
            let name = doc.text_content(name_node);
            if let Some(key) = manager.find_by_name(name.trim()).filter(usable) {
                return vec![key];
            }
        }
    }

    manager.keys().iter().filter(usable).collect()
}

/// DER bytes of every `X509Data/X509Certificate` under `key_info`.
pub fn embedded_certificates(doc: &Document, key_info: NodeId) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    for data in doc.find_children(key_info, ns::DSIG, ns::node::X509_DATA) {
        for cert in doc.find_children(data, ns::DSIG, ns::node::X509_CERTIFICATE) {
            let text: String = doc
                .text_content(cert)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if let Ok(der) = base64::engine::general_purpose::STANDARD.decode(text) {
                out.push(der);
            }
        }
    }
    out
}

/// Base64 `(Modulus, Exponent)` of an RSA key, for `<RSAKeyValue>`.
pub fn rsa_key_value(key: &Key) -> Option<(String, String)> {
    use rsa::traits::PublicKeyParts;
    let public = key.rsa_public_key()?;
    let engine = base64::engine::general_purpose::STANDARD;
    Some((
        engine.encode(public.n().to_bytes_be()),
        engine.encode(public.e().to_bytes_be()),
    ))
}

/// Base64 DER of the key's certificate, for `<X509Certificate>`.
pub fn certificate_value(key: &Key) -> Option<String> {
    key.certificate
        .as_deref()
        .map(|der| base64::engine::general_purpose::STANDARD.encode(der))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::create_keys_manager;
    use sigtuna_core::algorithm;

    const RSA_CERT: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/keys/rsacert.pem"));
    const OTHER_CERT: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/keys/othercert.pem"));

    fn key_info_doc(inner: &str) -> (Document, NodeId) {
        let xml = format!(
            r#"<ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">{inner}</ds:KeyInfo>"#
        );
        let doc = Document::parse(&xml).unwrap();
        let ki = doc.document_element().unwrap();
        (doc, ki)
    }

    #[test]
    fn test_select_by_certificate() {
        let rsa = loader::load_cert(RSA_CERT).unwrap();
        let cert_b64 = certificate_value(&rsa).unwrap();
        let manager = create_keys_manager(vec![
            loader::load_cert(OTHER_CERT).unwrap(),
            rsa,
        ])
        .unwrap();
        let (doc, ki) = key_info_doc(&format!(
            "<ds:X509Data><ds:X509Certificate>{cert_b64}</ds:X509Certificate></ds:X509Data>"
        ));
        let t = TransformId::require(algorithm::RSA_SHA256).unwrap();
        let found = candidate_keys(&doc, Some(ki), &manager, t);
        assert_eq!(found.len(), 1);
        assert!(found[0].certificate_subject().unwrap().unwrap().contains("test signer"));
    }

    #[test]
    fn test_select_by_name_and_fallback() {
        let manager = create_keys_manager(vec![
            loader::load_hmac_key(b"k1").with_name("first"),
            loader::load_hmac_key(b"k2").with_name("second"),
            loader::load_cert(RSA_CERT).unwrap(),
        ])
        .unwrap();
        let hmac = TransformId::require(algorithm::HMAC_SHA256).unwrap();

        let (doc, ki) = key_info_doc("<ds:KeyName>second</ds:KeyName>");
        let found = candidate_keys(&doc, Some(ki), &manager, hmac);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name.as_deref(), Some("second"));

        assert_eq!(candidate_keys(&doc, None, &manager, hmac).len(), 2);
        let rsa = TransformId::require(algorithm::RSA_SHA256).unwrap();
        assert_eq!(candidate_keys(&doc, Some(ki), &manager, rsa).len(), 1);
    }

    #[test]
    fn test_rsa_key_value() {
        let key = loader::load_cert(RSA_CERT).unwrap();
        let (_, exponent) = rsa_key_value(&key).unwrap();
        assert_eq!(exponent, "AQAB");
        assert!(rsa_key_value(&loader::load_hmac_key(b"x")).is_none());
    }
}
