#![forbid(unsafe_code)]

//! Field extraction from SAML Responses and Assertions.
//!
//! Fields are read from the element a verified signature covers when the
//! document has one (see `Document::verified_element`), otherwise from the
//! document element.  Statements are only taken from Assertions at the
//! positions the SAML schema puts them: the scope itself, or an Assertion
//! directly under it.

use crate::attribute::{AttributeValue, SamlAttribute};
use sigtuna_core::{ns, Error};
use sigtuna_xml::{Document, NodeId};

/// Text of the Issuer of the document.
///
/// The Issuer directly under the scope element wins. A Response that omits
/// its own Issuer falls back to the Issuer of its first Assertion.
pub fn issuer(doc: &Document) -> Option<String> {
    let scope = scope(doc)?;
    let node = doc
        .find_child(scope, ns::SAML_ASSERTION, ns::node::ISSUER)
        .or_else(|| {
            assertions(doc, scope)
                .into_iter()
                .find_map(|a| doc.find_child(a, ns::SAML_ASSERTION, ns::node::ISSUER))
        })?;
    Some(doc.text_content(node).trim().to_owned())
}

/// `SessionIndex` of the first AuthnStatement.
pub fn session_index(doc: &Document) -> Option<String> {
    let scope = scope(doc)?;
    let statement = assertions(doc, scope)
        .into_iter()
        .find_map(|a| doc.find_child(a, ns::SAML_ASSERTION, ns::node::AUTHN_STATEMENT))?;
    doc.attribute(statement, ns::attr::SESSION_INDEX)
        .map(str::to_owned)
}

/// Every named Attribute of every AttributeStatement, in document order.
///
/// Attributes without a `Name` are skipped. A document without attribute
/// statements yields an empty list.
pub fn attributes(doc: &Document) -> Result<Vec<SamlAttribute>, Error> {
    let scope = scope(doc)
        .ok_or_else(|| Error::XmlStructure("document has no root element".into()))?;

    let mut out = Vec::new();
    for assertion in assertions(doc, scope) {
        for statement in doc.find_children(assertion, ns::SAML_ASSERTION, ns::node::ATTRIBUTE_STATEMENT) {
            for attribute in doc.find_children(statement, ns::SAML_ASSERTION, ns::node::ATTRIBUTE) {
                let Some(name) = doc.attribute(attribute, ns::attr::NAME) else {
                    tracing::debug!("skipping Attribute without Name");
                    continue;
                };
                let values = doc
                    .find_children(attribute, ns::SAML_ASSERTION, ns::node::ATTRIBUTE_VALUE)
                    .into_iter()
                    .map(|v| doc.text_content(v))
                    .collect();
                out.push(SamlAttribute::new(name, AttributeValue::from_values(values)));
            }
        }
    }
    Ok(out)
}

fn scope(doc: &Document) -> Option<NodeId> {
    doc.verified_element().or_else(|| doc.document_element())
}

/// The scope itself when it is an Assertion, otherwise its Assertion children.
fn assertions(doc: &Document, scope: NodeId) -> Vec<NodeId> {
    if doc.is_named(scope, ns::SAML_ASSERTION, ns::node::ASSERTION) {
        vec![scope]
    } else {
        doc.find_children(scope, ns::SAML_ASSERTION, ns::node::ASSERTION)
    }
}
