#![forbid(unsafe_code)]

//! Per-operation signing state and the options shared by sign and verify.

use sigtuna_core::Error;
use sigtuna_crypto::{SigningKey, TransformId};
use sigtuna_keys::Key;

/// ID attribute of SAML 2.0 protocol messages and assertions.
pub const DEFAULT_ID_ATTR: &str = "ID";

/// Sibling after which `<ds:Signature>` is inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertAfter {
    pub namespace: String,
    pub local_name: String,
}

/// Options for [`sign_document`](crate::sign_document) and
/// [`verify_document`](crate::verify_document).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignOptions {
    /// Attribute holding element IDs.  Defaults to [`DEFAULT_ID_ATTR`].
    pub id_attr: Option<String>,
    /// Insert the signature after this child of the signed element instead
    /// of as its first child.
    pub insert_after: Option<InsertAfter>,
    /// Emit the canonical octets fed to digests and signatures as trace
    /// events.
    pub debug: bool,
}

/// Verification reads only `id_attr`.
pub type VerifyOptions = SignOptions;

impl SignOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_attr(mut self, name: impl Into<String>) -> Self {
        self.id_attr = Some(name.into());
        self
    }

    pub fn with_insert_after(mut self, namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        self.insert_after = Some(InsertAfter {
            namespace: namespace.into(),
            local_name: local_name.into(),
        });
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn id_attr(&self) -> &str {
        self.id_attr.as_deref().unwrap_or(DEFAULT_ID_ATTR)
    }
}

/// State of one sign or verify operation: the transform, the key and the
/// octets fed so far.  Finalizing consumes the context.
pub struct SignContext {
    transform: TransformId,
    key: SigningKey,
    buffer: Vec<u8>,
}

impl SignContext {
    /// Bind `transform` to `key`.  Fails if the key type does not fit.
    pub fn new(key: &Key, transform: TransformId) -> Result<Self, Error> {
        let key = key.to_signing_key();
        if !transform.accepts(&key) {
            return Err(Error::Key(format!(
                "{} key cannot be used with {transform}",
                key.algorithm_name()
            )));
        }
        Ok(Self {
            transform,
            key,
            buffer: Vec::new(),
        })
    }

    pub fn transform(&self) -> TransformId {
        self.transform
    }

    pub fn update(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn finalize_sign(self) -> Result<Vec<u8>, Error> {
        self.transform.sign(&self.key, &self.buffer)
    }

    pub fn finalize_verify(self, signature: &[u8]) -> Result<bool, Error> {
        self.transform.verify(&self.key, &self.buffer, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigtuna_core::algorithm;
    use sigtuna_keys::loader;

    #[test]
    fn test_options_defaults() {
        let opts = SignOptions::new();
        assert_eq!(opts.id_attr(), "ID");
        assert!(opts.insert_after.is_none());
        let opts = opts
            .with_id_attr("AssertionID")
            .with_insert_after("urn:oasis:names:tc:SAML:2.0:assertion", "Issuer");
        assert_eq!(opts.id_attr(), "AssertionID");
        assert_eq!(opts.insert_after.unwrap().local_name, "Issuer");
    }

    #[test]
    fn test_context_rejects_wrong_key_type() {
        let t = TransformId::require(algorithm::RSA_SHA256).unwrap();
        assert!(SignContext::new(&loader::load_hmac_key(b"k"), t).is_err());
    }

    #[test]
    fn test_context_accumulates() {
        let t = TransformId::require(algorithm::HMAC_SHA256).unwrap();
        let key = loader::load_hmac_key(b"k");
        let mut ctx = SignContext::new(&key, t).unwrap();
        ctx.update(b"ab");
        ctx.update(b"cd");
        let sig = ctx.finalize_sign().unwrap();

        let mut ctx = SignContext::new(&key, t).unwrap();
        ctx.update(b"abcd");
        assert!(ctx.finalize_verify(&sig).unwrap());
    }
}
