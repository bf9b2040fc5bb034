#![forbid(unsafe_code)]

//! Key and certificate store for sigtuna.
//!
//! Loads private keys, public keys and X.509 certificates from PEM or DER,
//! attaches certificates to keys, and collects trusted keys in a
//! [`KeysManager`] consulted during verification.

pub mod key;
pub mod keyinfo;
pub mod loader;
pub mod manager;

pub use key::{Key, KeyData};
pub use manager::{create_keys_manager, KeysManager};
