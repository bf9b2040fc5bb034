#![forbid(unsafe_code)]

//! Core types shared by every sigtuna crate: the error type, algorithm URIs
//! and the XML-DSig / SAML 2.0 namespace and element names.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
