#![forbid(unsafe_code)]

//! Cryptographic algorithm implementations for sigtuna.
//!
//! Digests and signature schemes used by SAML XML-DSig, and the transform
//! registry that resolves algorithm URIs to [`TransformId`]s.

pub mod digest;
pub mod registry;
pub mod sign;

pub use digest::HashAlg;
pub use registry::{TransformId, TransformKind};
pub use sign::{SignatureScheme, SigningKey};
