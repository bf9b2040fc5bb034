#![forbid(unsafe_code)]

//! SAML XML-Signature signing, verification and assertion extraction.
//!
//! Start with [`init`], which hands out the [`Runtime`] every other
//! operation goes through.  The component crates are re-exported for
//! callers that need lower-level access.

pub mod runtime;

pub use sigtuna_c14n as c14n;
pub use sigtuna_core as core;
pub use sigtuna_crypto as crypto;
pub use sigtuna_dsig as dsig;
pub use sigtuna_keys as keys;
pub use sigtuna_saml as saml;
pub use sigtuna_transforms as transforms;
pub use sigtuna_xml as xml;

pub use runtime::{init, InitOptions, Runtime};
pub use sigtuna_core::Error;
pub use sigtuna_crypto::TransformId;
pub use sigtuna_dsig::{InsertAfter, SignOptions, VerifyOptions, VerifyOutcome};
pub use sigtuna_keys::{Key, KeysManager};
pub use sigtuna_saml::{AttributeValue, SamlAttribute};
pub use sigtuna_xml::Document;
