#![forbid(unsafe_code)]

//! Transform registry: a fixed table of the signature and digest
//! algorithms usable for SAML, keyed by algorithm URI.

use crate::digest::{constant_time_eq, HashAlg};
use crate::sign::{SchemeFamily, SignatureScheme, SigningKey};
use sigtuna_core::{algorithm, Error};

/// What a registry entry computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Signature(SignatureScheme),
    Digest(HashAlg),
}

#[derive(Debug)]
pub struct TransformEntry {
    uri: &'static str,
    name: &'static str,
    kind: TransformKind,
}

/// A resolved algorithm.  Cheap to copy; always refers to an entry of the
/// static table.
#[derive(Debug, Clone, Copy)]
pub struct TransformId(&'static TransformEntry);

impl PartialEq for TransformId {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for TransformId {}

macro_rules! sig {
    ($uri:expr, $name:expr, $family:ident, $hash:ident) => {
        TransformEntry {
            uri: $uri,
            name: $name,
            kind: TransformKind::Signature(SignatureScheme::new(SchemeFamily::$family, HashAlg::$hash)),
        }
    };
}

macro_rules! dig {
    ($uri:expr, $name:expr, $hash:ident) => {
        TransformEntry {
            uri: $uri,
            name: $name,
            kind: TransformKind::Digest(HashAlg::$hash),
        }
    };
}

static TABLE: [TransformEntry; 29] = [
    sig!(algorithm::RSA_SHA1, "rsa-sha1", RsaPkcs1v15, Sha1),
    sig!(algorithm::RSA_SHA224, "rsa-sha224", RsaPkcs1v15, Sha224),
    sig!(algorithm::RSA_SHA256, "rsa-sha256", RsaPkcs1v15, Sha256),
    sig!(algorithm::RSA_SHA384, "rsa-sha384", RsaPkcs1v15, Sha384),
    sig!(algorithm::RSA_SHA512, "rsa-sha512", RsaPkcs1v15, Sha512),
    sig!(algorithm::RSA_PSS_SHA1, "rsa-pss-sha1", RsaPss, Sha1),
    sig!(algorithm::RSA_PSS_SHA224, "rsa-pss-sha224", RsaPss, Sha224),
    sig!(algorithm::RSA_PSS_SHA256, "rsa-pss-sha256", RsaPss, Sha256),
    sig!(algorithm::RSA_PSS_SHA384, "rsa-pss-sha384", RsaPss, Sha384),
    sig!(algorithm::RSA_PSS_SHA512, "rsa-pss-sha512", RsaPss, Sha512),
    sig!(algorithm::ECDSA_SHA1, "ecdsa-sha1", Ecdsa, Sha1),
    sig!(algorithm::ECDSA_SHA224, "ecdsa-sha224", Ecdsa, Sha224),
    sig!(algorithm::ECDSA_SHA256, "ecdsa-sha256", Ecdsa, Sha256),
    sig!(algorithm::ECDSA_SHA384, "ecdsa-sha384", Ecdsa, Sha384),
    sig!(algorithm::ECDSA_SHA512, "ecdsa-sha512", Ecdsa, Sha512),
    sig!(algorithm::HMAC_SHA1, "hmac-sha1", Hmac, Sha1),
    sig!(algorithm::HMAC_SHA224, "hmac-sha224", Hmac, Sha224),
    sig!(algorithm::HMAC_SHA256, "hmac-sha256", Hmac, Sha256),
    sig!(algorithm::HMAC_SHA384, "hmac-sha384", Hmac, Sha384),
    sig!(algorithm::HMAC_SHA512, "hmac-sha512", Hmac, Sha512),
    dig!(algorithm::SHA1, "sha1", Sha1),
    dig!(algorithm::SHA224, "sha224", Sha224),
    dig!(algorithm::SHA256, "sha256", Sha256),
    dig!(algorithm::SHA384, "sha384", Sha384),
    dig!(algorithm::SHA512, "sha512", Sha512),
    dig!(algorithm::SHA3_224, "sha3-224", Sha3_224),
    dig!(algorithm::SHA3_256, "sha3-256", Sha3_256),
    dig!(algorithm::SHA3_384, "sha3-384", Sha3_384),
    dig!(algorithm::SHA3_512, "sha3-512", Sha3_512),
];

impl TransformId {
    /// Exact match on the algorithm URI.  `None` means unsupported.
    pub fn resolve(uri: &str) -> Option<TransformId> {
        TABLE.iter().find(|e| e.uri == uri).map(TransformId)
    }

    /// Like [`resolve`](Self::resolve), but unsupported URIs are an error.
    pub fn require(uri: &str) -> Result<TransformId, Error> {
        Self::resolve(uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("transform: {uri}")))
    }

    /// Short-name lookup (`rsa-sha256`, `sha256`, ...), used by the CLI.
    pub fn by_name(name: &str) -> Option<TransformId> {
        TABLE.iter().find(|e| e.name == name).map(TransformId)
    }

    /// Every registered transform, signature algorithms first.
    pub fn all() -> impl Iterator<Item = TransformId> {
        TABLE.iter().map(TransformId)
    }

    pub fn uri(self) -> &'static str {
        self.0.uri
    }

    pub fn name(self) -> &'static str {
        self.0.name
    }

    pub fn kind(self) -> TransformKind {
        self.0.kind
    }

    pub fn is_signature(self) -> bool {
        matches!(self.0.kind, TransformKind::Signature(_))
    }

    pub fn hash(self) -> HashAlg {
        match self.0.kind {
            TransformKind::Signature(s) => s.hash,
            TransformKind::Digest(h) => h,
        }
    }

    /// The DigestMethod paired with this algorithm in a Reference.
    pub fn digest_uri(self) -> &'static str {
        self.hash().uri()
    }

    /// Whether `key` can drive this transform.  Digests need no key.
    pub fn accepts(self, key: &SigningKey) -> bool {
        match self.0.kind {
            TransformKind::Signature(s) => s.accepts(key),
            TransformKind::Digest(_) => true,
        }
    }

    /// Sign `data`.  A digest transform returns the digest value.
    pub fn sign(self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        match self.0.kind {
            TransformKind::Signature(s) => s.sign(key, data),
            TransformKind::Digest(h) => Ok(h.digest(data)),
        }
    }

    /// Verify `sig` over `data`.  `Ok(false)` is a mismatch.
    pub fn verify(self, key: &SigningKey, data: &[u8], sig: &[u8]) -> Result<bool, Error> {
        match self.0.kind {
            TransformKind::Signature(s) => s.verify(key, data, sig),
            TransformKind::Digest(h) => Ok(constant_time_eq(&h.digest(data), sig)),
        }
    }
}

impl std::fmt::Display for TransformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let t = TransformId::resolve(algorithm::RSA_SHA256).unwrap();
        assert_eq!(t.uri(), algorithm::RSA_SHA256);
        assert_eq!(t.digest_uri(), algorithm::SHA256);
        assert!(t.is_signature());
        assert_eq!(TransformId::by_name("rsa-sha256"), Some(t));
    }

    #[test]
    fn test_unknown_uri() {
        assert!(TransformId::resolve("not-a-real-uri").is_none());
        assert!(matches!(
            TransformId::require("not-a-real-uri"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_table_is_consistent() {
        let mut uris: Vec<&str> = TransformId::all().map(|t| t.uri()).collect();
        let n = uris.len();
        uris.sort_unstable();
        uris.dedup();
        assert_eq!(uris.len(), n);
        for t in TransformId::all() {
            assert_eq!(TransformId::resolve(t.uri()), Some(t));
        }
    }

    #[test]
    fn test_digest_transform() {
        let t = TransformId::resolve(algorithm::SHA256).unwrap();
        let key = SigningKey::Hmac(Vec::new());
        let d = t.sign(&key, b"hello").unwrap();
        assert_eq!(d, HashAlg::Sha256.digest(b"hello"));
        assert!(t.verify(&key, b"hello", &d).unwrap());
        assert!(!t.verify(&key, b"hellp", &d).unwrap());
    }
}
