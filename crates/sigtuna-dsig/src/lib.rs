#![forbid(unsafe_code)]

//! XML Digital Signature (XML-DSig) engine for SAML.
//!
//! Raw signatures over octet buffers (the HTTP-Redirect binding) and
//! enveloped signatures embedded in SAML documents.

pub mod binary;
pub mod context;
pub mod sign;
pub mod template;
pub mod verify;

pub use binary::{sign_binary, verify_binary};
pub use context::{InsertAfter, SignContext, SignOptions, VerifyOptions, DEFAULT_ID_ATTR};
pub use sign::{sign_document, sign_xml_text};
pub use verify::{signed_scope, verify_document, VerifyOutcome};
