#![forbid(unsafe_code)]

//! Validation against the SAML 2.0 XSD set.
//!
//! The OASIS assertion and protocol schemas, with the W3C XML-DSig and
//! XML-Encryption schemas they import, ship in this crate's `xsd/`
//! directory.  Imports use sibling `schemaLocation`s, so a set can be
//! relocated as a whole (an `xsd/` directory under the resource
//! directory takes precedence over the bundled copy).
//!
//! A serialized copy of the document is handed to libxml2, which compiles
//! the protocol schema and validates against it.  The document element
//! must additionally be a SAML message or an assertion.

use libxml::parser::Parser;
use libxml::schemas::{SchemaParserContext, SchemaValidationContext};
use sigtuna_core::{ns, Error};
use sigtuna_xml::Document;
use std::path::{Path, PathBuf};

/// Entry point of the set; imports the remaining files.
pub const PROTOCOL_XSD: &str = "saml-schema-protocol-2.0.xsd";

/// Every file a schema directory must hold.
pub const SCHEMA_FILES: [&str; 4] = [
    PROTOCOL_XSD,
    "saml-schema-assertion-2.0.xsd",
    "xmldsig-core-schema.xsd",
    "xenc-schema.xsd",
];

/// Document elements accepted for validation.
const ROOTS: &[(&str, &str)] = &[
    (ns::SAML_ASSERTION, "Assertion"),
    (ns::SAML_PROTOCOL, "Response"),
    (ns::SAML_PROTOCOL, "AuthnRequest"),
    (ns::SAML_PROTOCOL, "LogoutRequest"),
    (ns::SAML_PROTOCOL, "LogoutResponse"),
    (ns::SAML_PROTOCOL, "ArtifactResolve"),
    (ns::SAML_PROTOCOL, "ArtifactResponse"),
    (ns::SAML_PROTOCOL, "AssertionIDRequest"),
    (ns::SAML_PROTOCOL, "AttributeQuery"),
    (ns::SAML_PROTOCOL, "AuthnQuery"),
    (ns::SAML_PROTOCOL, "AuthzDecisionQuery"),
    (ns::SAML_PROTOCOL, "ManageNameIDRequest"),
    (ns::SAML_PROTOCOL, "ManageNameIDResponse"),
    (ns::SAML_PROTOCOL, "NameIDMappingRequest"),
    (ns::SAML_PROTOCOL, "NameIDMappingResponse"),
];

/// A directory holding the SAML 2.0 XSD set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSet {
    dir: PathBuf,
}

impl SchemaSet {
    /// The set bundled with this crate.
    pub fn bundled() -> Self {
        Self {
            dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/xsd")),
        }
    }

    /// The set in `dir`, which must contain every file of [`SCHEMA_FILES`].
    pub fn from_dir(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        if let Some(missing) = SCHEMA_FILES.iter().find(|f| !dir.join(f).is_file()) {
            return Err(Error::Schema(format!(
                "{} is missing from {}",
                missing,
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    /// `<resource_dir>/xsd` when it holds a schema set, the bundled set
    /// otherwise.
    pub fn locate(resource_dir: Option<&Path>) -> Self {
        let Some(dir) = resource_dir.map(|d| d.join("xsd")) else {
            return Self::bundled();
        };
        if !dir.join(PROTOCOL_XSD).is_file() {
            return Self::bundled();
        }
        match Self::from_dir(&dir) {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(error = %e, "incomplete schema directory, using bundled schemas");
                Self::bundled()
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `doc` is a schema-valid SAML 2.0 message or assertion.
    ///
    /// The reason for a rejection is only logged.
    pub fn validate(&self, doc: &Document) -> bool {
        match self.check(doc) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!(schemas = %self.dir.display(), %reason, "schema validation failed");
                false
            }
        }
    }

    fn check(&self, doc: &Document) -> Result<(), Error> {
        check_root(doc)?;

        let xml = doc.to_xml_string();
        let parsed = Parser::default()
            .parse_string(xml.as_bytes())
            .map_err(|e| Error::XmlParse(format!("{e:?}")))?;

        let entry = self.dir.join(PROTOCOL_XSD);
        let entry = entry
            .to_str()
            .ok_or_else(|| Error::Schema(format!("non UTF-8 path {}", entry.display())))?;
        let mut parser_ctx = SchemaParserContext::from_file(entry);
        let mut ctx = SchemaValidationContext::from_parser(&mut parser_ctx)
            .map_err(|errors| Error::Schema(format!("{entry} does not compile: {errors:?}")))?;

        ctx.validate_document(&parsed)
            .map_err(|errors| Error::Schema(format!("{errors:?}")))
    }
}

impl Default for SchemaSet {
    fn default() -> Self {
        Self::bundled()
    }
}

fn check_root(doc: &Document) -> Result<(), Error> {
    let root = doc
        .document_element()
        .and_then(|id| doc.element(id))
        .ok_or_else(|| Error::Schema("document has no root element".into()))?;
    let namespace = root.name.namespace_uri.as_deref().unwrap_or("");
    if ROOTS
        .iter()
        .any(|&(n, l)| n == namespace && l == root.name.local_name)
    {
        Ok(())
    } else {
        Err(Error::Schema(format!(
            "{} is not a SAML document element",
            root.name.qualified()
        )))
    }
}

/// Validate against the bundled set.
pub fn validate_document(doc: &Document) -> bool {
    SchemaSet::bundled().validate(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSIGNED: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/saml/response-unsigned.xml"));
    const SIGNED: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/saml/response-signed-rsa-sha256.xml"));
    const ATTRIBUTES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/saml/response-attributes.xml"));
    const INVALID: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/saml/response-schema-invalid.xml"));

    fn valid(xml: &str) -> bool {
        validate_document(&Document::parse(xml).unwrap())
    }

    #[test]
    fn test_fixtures() {
        assert!(valid(UNSIGNED));
        assert!(valid(SIGNED));
        assert!(valid(ATTRIBUTES));
        assert!(!valid(INVALID));
    }

    #[test]
    fn test_authn_request() {
        let xml = r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_r1" Version="2.0" IssueInstant="2024-01-01T00:00:00+01:00" AssertionConsumerServiceURL="https://sp.example.org/acs" ForceAuthn="false">
  <saml:Issuer>https://sp.example.org</saml:Issuer>
  <samlp:NameIDPolicy AllowCreate="true" Format="urn:oasis:names:tc:SAML:2.0:nameid-format:transient"/>
  <samlp:RequestedAuthnContext Comparison="exact"><saml:AuthnContextClassRef>urn:x</saml:AuthnContextClassRef></samlp:RequestedAuthnContext>
</samlp:AuthnRequest>"#;
        assert!(valid(xml));
        assert!(!valid(&xml.replace("Comparison=\"exact\"", "Comparison=\"loose\"")));
        assert!(!valid(&xml.replace("ForceAuthn=\"false\"", "ForceAuthn=\"no\"")));
    }

    #[test]
    fn test_element_order_matters() {
        // Status must follow Issuer.
        let moved = UNSIGNED.replacen(
            "<saml:Issuer>https://idp.example.org/metadata</saml:Issuer><samlp:Status><samlp:StatusCode Value=\"urn:oasis:names:tc:SAML:2.0:status:Success\"/></samlp:Status>",
            "<samlp:Status><samlp:StatusCode Value=\"urn:oasis:names:tc:SAML:2.0:status:Success\"/></samlp:Status><saml:Issuer>https://idp.example.org/metadata</saml:Issuer>",
            1,
        );
        assert_ne!(moved, UNSIGNED);
        assert!(!valid(&moved));
    }

    #[test]
    fn test_attribute_checks() {
        assert!(!valid(&UNSIGNED.replace(" Version=\"2.0\">", ">")));
        assert!(!valid(&UNSIGNED.replacen("2024-01-01T00:00:00Z", "yesterday", 1)));
        assert!(!valid(&UNSIGNED.replace("ID=\"_a1\"", "ID=\"_resp1\"")));
        assert!(!valid(&UNSIGNED.replace("ID=\"_a1\"", "ID=\"1a\"")));
        assert!(!valid(&UNSIGNED.replace("ID=\"_a1\"", "ID=\"_a1\" Colour=\"red\"")));
    }

    #[test]
    fn test_character_content() {
        let xml = UNSIGNED.replace("<samlp:Status>", "<samlp:Status>stray");
        assert!(!valid(&xml));
    }

    #[test]
    fn test_unknown_root() {
        assert!(!valid(r#"<saml:Subject xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"/>"#));
        assert!(!valid("<Response/>"));
    }

    #[test]
    fn test_abstract_statement_needs_known_type() {
        let xml = UNSIGNED.replace(
            "<saml:AttributeStatement>",
            "<saml:Statement xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:type=\"saml:Unknown\"/><saml:AttributeStatement>",
        );
        assert!(!valid(&xml));
    }

    #[test]
    fn test_bundled_set_is_complete() {
        let bundled = SchemaSet::bundled();
        assert_eq!(SchemaSet::from_dir(bundled.dir()).unwrap(), bundled);
        assert!(matches!(
            SchemaSet::from_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/src")),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_locate_prefers_resource_directory() {
        // The bundled directory's parent has an `xsd/` subdirectory.
        let crate_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        assert_eq!(SchemaSet::locate(Some(crate_dir)).dir(), crate_dir.join("xsd"));

        let without = crate_dir.join("src");
        assert_eq!(SchemaSet::locate(Some(&without)), SchemaSet::bundled());
        assert_eq!(SchemaSet::locate(None), SchemaSet::bundled());
    }

    #[test]
    fn test_unusable_schema_directory_rejects() {
        let set = SchemaSet {
            dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/src")),
        };
        assert!(!set.validate(&Document::parse(UNSIGNED).unwrap()));
    }
}
