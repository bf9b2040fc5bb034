//! Full sign/verify/extract workflow through the runtime.
//!
//! The lifecycle is process-wide, so the whole workflow runs inside one test.

use pretty_assertions::assert_eq;
use sigtuna::core::algorithm;
use sigtuna::{init, AttributeValue, Error, InitOptions, SamlAttribute, SignOptions, VerifyOptions, VerifyOutcome};
use std::error::Error as _;

const ASSERTION: &str = r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_e2e" IssueInstant="2024-06-01T12:00:00Z" Version="2.0"><saml:Issuer>https://idp.example.org/metadata</saml:Issuer><saml:AttributeStatement><saml:Attribute Name="email"><saml:AttributeValue>a@b.com</saml:AttributeValue></saml:Attribute></saml:AttributeStatement></saml:Assertion>"#;

const FORGED: &str = r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_forged" IssueInstant="2024-06-01T12:00:00Z" Version="2.0"><saml:Issuer>https://attacker.example.com</saml:Issuer><saml:AttributeStatement><saml:Attribute Name="email"><saml:AttributeValue>admin@b.com</saml:AttributeValue></saml:Attribute></saml:AttributeStatement></saml:Assertion>"#;

/// A Response carrying `children` after an Issuer and Status.
fn response(children: &str) -> String {
    format!(
        r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_wrap" IssueInstant="2024-06-01T12:00:00Z" Version="2.0"><saml:Issuer>https://attacker.example.com</saml:Issuer>{children}</samlp:Response>"#
    )
}

#[test]
fn test_end_to_end() {
    let rt = init(InitOptions::new().with_resource_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data"))).unwrap();

    // Keys resolved against the resource directory.
    let mut key = rt.load_key_file("keys/rsakey.pem").unwrap();
    rt.attach_cert_file(&mut key, "keys/rsacert.pem").unwrap();
    let trusted = rt.load_cert_file("keys/rsacert.pem").unwrap();
    let unrelated = rt.load_cert_file("keys/othercert.pem").unwrap();

    let transform = rt.resolve_transform(algorithm::RSA_SHA256).unwrap();
    assert!(rt.resolve_transform("not-a-real-uri").is_none());

    // Sign a minimal assertion in place.
    let mut doc = rt.parse(ASSERTION.as_bytes()).unwrap();
    rt.sign_document(&key, transform, &mut doc, &SignOptions::new().with_insert_after(sigtuna::core::ns::SAML_ASSERTION, "Issuer"))
        .unwrap();
    let signed = rt.serialize(&doc).unwrap();
    rt.release_document(doc).unwrap();

    // Matching certificate: valid.
    let manager = rt.create_keys_manager(vec![trusted]).unwrap();
    let mut doc = rt.parse(&signed).unwrap();
    assert_eq!(rt.verify_document(&manager, &mut doc, &VerifyOptions::new()).unwrap(), VerifyOutcome::Valid);
    assert_eq!(
        rt.attributes(&doc).unwrap(),
        vec![SamlAttribute::new("email", AttributeValue::Single("a@b.com".into()))]
    );
    assert_eq!(rt.issuer(&doc).as_deref(), Some("https://idp.example.org/metadata"));
    assert_eq!(rt.session_index(&doc), None);
    assert!(rt.validate_document(&doc));

    // Unrelated certificate: invalid, not an error.
    let other = rt.create_keys_manager(vec![unrelated]).unwrap();
    assert_eq!(rt.verify_document(&other, &mut doc, &VerifyOptions::new()).unwrap(), VerifyOutcome::Invalid);

    // Serialize/parse round trip keeps the signature verifiable.
    let again = rt.serialize(&doc).unwrap();
    let mut reparsed = rt.parse(&again).unwrap();
    assert_eq!(rt.serialize(&reparsed).unwrap(), again);
    assert_eq!(rt.verify_document(&manager, &mut reparsed, &VerifyOptions::new()).unwrap(), VerifyOutcome::Valid);

    // Text convenience.
    let text = rt.sign_xml_text(&key, transform, ASSERTION, &SignOptions::new()).unwrap();
    let mut doc = rt.parse(text.as_bytes()).unwrap();
    assert_eq!(rt.verify_document(&manager, &mut doc, &VerifyOptions::new()).unwrap(), VerifyOutcome::Valid);

    // Signing twice fails cleanly and the first signature survives.
    let err = rt.sign_document(&key, transform, &mut doc, &SignOptions::new()).unwrap_err();
    assert!(err.to_string().starts_with("saml sign failed"));
    assert!(matches!(&err, Error::SamlSign(inner) if matches!(**inner, Error::AlreadySigned(_))));
    assert!(err.source().is_some());
    assert_eq!(rt.verify_document(&manager, &mut doc, &VerifyOptions::new()).unwrap(), VerifyOutcome::Valid);

    let err = rt.sign_xml_text(&key, transform, "<broken", &SignOptions::new()).unwrap_err();
    assert_eq!(err.to_string(), "unable to parse xml string");
    assert!(matches!(err.source(), Some(e) if e.to_string().starts_with("XML parsing error")));
    assert!(rt.parse(b"<broken").is_none());
    assert!(rt.parse_file("saml/does-not-exist.xml").is_none());

    // Unsigned documents cannot be verified at all.
    let mut unsigned = rt.parse_file("saml/response-unsigned.xml").unwrap();
    let err = rt.verify_document(&manager, &mut unsigned, &VerifyOptions::new()).unwrap_err();
    assert!(err.to_string().starts_with("saml verify failed"));
    assert!(matches!(err, Error::SamlVerify(_)));

    // A signed assertion moved below the document element no longer counts.
    let signed_text = String::from_utf8(signed.clone()).unwrap();
    let signed_assertion = &signed_text[signed_text.find("<saml:Assertion").unwrap()..];
    let hidden = response(&format!("<samlp:Extensions>{signed_assertion}</samlp:Extensions>"));
    let mut doc = rt.parse(hidden.as_bytes()).unwrap();
    assert_eq!(rt.verify_document(&manager, &mut doc, &VerifyOptions::new()).unwrap(), VerifyOutcome::Invalid);

    // With a forged sibling in front, fields come from the signed assertion.
    let wrapped = response(&format!("{FORGED}{signed_assertion}"));
    let mut doc = rt.parse(wrapped.as_bytes()).unwrap();
    assert_eq!(rt.verify_document(&manager, &mut doc, &VerifyOptions::new()).unwrap(), VerifyOutcome::Valid);
    assert_eq!(rt.issuer(&doc).as_deref(), Some("https://idp.example.org/metadata"));
    assert_eq!(
        rt.attributes(&doc).unwrap(),
        vec![SamlAttribute::new("email", AttributeValue::Single("a@b.com".into()))]
    );

    // Attribute prefixes survive when two prefixes share a namespace.
    let aliased = rt.parse(br#"<r xmlns:a="urn:x" xmlns:b="urn:x"><e b:attr="1"/></r>"#).unwrap();
    let out = String::from_utf8(rt.serialize(&aliased).unwrap()).unwrap();
    assert!(out.contains(r#"<e b:attr="1"/>"#), "{out}");

    // Binary signatures.
    let data = b"SAMLRequest=abc&RelayState=xyz&SigAlg=rsa-sha256";
    let sig = rt.sign_binary(&key, transform, data).unwrap();
    let cert = rt.load_cert_file("keys/rsacert.pem").unwrap();
    assert_eq!(rt.verify_binary(&cert, transform, data, &sig).unwrap(), VerifyOutcome::Valid);
    assert_eq!(rt.verify_binary(&cert, transform, b"tampered", &sig).unwrap(), VerifyOutcome::Invalid);

    // Duplicate names make manager creation fail as a whole.
    let a = rt.load_cert_file("keys/rsacert.pem").unwrap().with_name("idp");
    let b = rt.load_cert_file("keys/othercert.pem").unwrap().with_name("idp");
    let err = rt.create_keys_manager(vec![a, b]).unwrap_err();
    assert_eq!(err.to_string(), "create keys manager failed");

    rt.shutdown().unwrap();
}
