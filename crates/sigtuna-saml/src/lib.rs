#![forbid(unsafe_code)]

//! SAML 2.0 support for sigtuna.
//!
//! Pulls the fields a service provider acts on (Issuer, SessionIndex,
//! attribute statements) out of a parsed Response or Assertion, and
//! validates documents against the SAML 2.0 XSD set through libxml2.

pub mod attribute;
pub mod extract;
pub mod schema;

pub use attribute::{AttributeValue, SamlAttribute};
pub use extract::{attributes, issuer, session_index};
pub use schema::{validate_document, SchemaSet};
