#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA, ECDSA, HMAC).
//!
//! ECDSA signatures use the XML-DSig `r || s` encoding. The curve is taken
//! from the key, the hash from the scheme.

use crate::digest::{constant_time_eq, HashAlg};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use signature::SignatureEncoding;
use sigtuna_core::Error;

/// Key material for signature operations.
#[derive(Clone)]
pub enum SigningKey {
    Rsa(rsa::RsaPrivateKey),
    RsaPublic(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::SigningKey),
    EcP256Public(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::SigningKey),
    EcP384Public(p384::ecdsa::VerifyingKey),
    Hmac(Vec<u8>),
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.algorithm_name())
    }
}

impl SigningKey {
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "RSA private",
            Self::RsaPublic(_) => "RSA public",
            Self::EcP256(_) => "EC P-256 private",
            Self::EcP256Public(_) => "EC P-256 public",
            Self::EcP384(_) => "EC P-384 private",
            Self::EcP384Public(_) => "EC P-384 public",
            Self::Hmac(_) => "HMAC",
        }
    }

    /// Whether the key holds private (or secret) material.
    pub fn can_sign(&self) -> bool {
        matches!(
            self,
            Self::Rsa(_) | Self::EcP256(_) | Self::EcP384(_) | Self::Hmac(_)
        )
    }

    /// The verification-only half of this key.  HMAC keys are returned as is.
    pub fn public_part(&self) -> SigningKey {
        match self {
            Self::Rsa(k) => Self::RsaPublic(k.to_public_key()),
            Self::EcP256(k) => Self::EcP256Public(*k.verifying_key()),
            Self::EcP384(k) => Self::EcP384Public(*k.verifying_key()),
            other => other.clone(),
        }
    }

    /// Whether two keys share the same public component.
    pub fn same_public_key(&self, other: &SigningKey) -> bool {
        match (self.public_part(), other.public_part()) {
            (Self::RsaPublic(a), Self::RsaPublic(b)) => a == b,
            (Self::EcP256Public(a), Self::EcP256Public(b)) => a == b,
            (Self::EcP384Public(a), Self::EcP384Public(b)) => a == b,
            _ => false,
        }
    }
}

/// Family of a signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeFamily {
    RsaPkcs1v15,
    RsaPss,
    Ecdsa,
    Hmac,
}

/// A signature scheme: a family combined with a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureScheme {
    pub family: SchemeFamily,
    pub hash: HashAlg,
}

impl SignatureScheme {
    pub const fn new(family: SchemeFamily, hash: HashAlg) -> Self {
        Self { family, hash }
    }

    /// Whether `key` has the right type for this scheme.
    pub fn accepts(&self, key: &SigningKey) -> bool {
        use SigningKey::*;
        match self.family {
            SchemeFamily::RsaPkcs1v15 | SchemeFamily::RsaPss => {
                matches!(key, Rsa(_) | RsaPublic(_))
            }
            SchemeFamily::Ecdsa => matches!(
                key,
                EcP256(_) | EcP256Public(_) | EcP384(_) | EcP384Public(_)
            ),
            SchemeFamily::Hmac => matches!(key, Hmac(_)),
        }
    }

    pub fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        match (self.family, key) {
            (SchemeFamily::RsaPkcs1v15, SigningKey::Rsa(k)) => rsa_pkcs1v15_sign(self.hash, k, data),
            (SchemeFamily::RsaPss, SigningKey::Rsa(k)) => rsa_pss_sign(self.hash, k, data),
            (SchemeFamily::Ecdsa, SigningKey::EcP256(k)) => {
                let prehash = self.hash.digest(data);
                let sig: p256::ecdsa::Signature = k
                    .sign_prehash(&prehash)
                    .map_err(|e| Error::Crypto(format!("ECDSA P-256 signing failed: {e}")))?;
                Ok(sig.to_bytes().to_vec())
            }
            (SchemeFamily::Ecdsa, SigningKey::EcP384(k)) => {
                let prehash = self.hash.digest(data);
                let sig: p384::ecdsa::Signature = k
                    .sign_prehash(&prehash)
                    .map_err(|e| Error::Crypto(format!("ECDSA P-384 signing failed: {e}")))?;
                Ok(sig.to_bytes().to_vec())
            }
            (SchemeFamily::Hmac, SigningKey::Hmac(secret)) => compute_hmac(self.hash, secret, data),
            (family, key) => Err(Error::Key(format!(
                "{} key cannot sign with {family:?}",
                key.algorithm_name()
            ))),
        }
    }

    /// `Ok(false)` for a mismatching or malformed signature, `Err` when the
    /// key cannot be used with this scheme at all.
    pub fn verify(&self, key: &SigningKey, data: &[u8], sig: &[u8]) -> Result<bool, Error> {
        if !self.accepts(key) {
            return Err(Error::Key(format!(
                "{} key cannot verify {:?}",
                key.algorithm_name(),
                self.family
            )));
        }
        let ok = match (self.family, key.public_part()) {
            (SchemeFamily::RsaPkcs1v15, SigningKey::RsaPublic(k)) => {
                rsa_pkcs1v15_verify(self.hash, k, data, sig)
            }
            (SchemeFamily::RsaPss, SigningKey::RsaPublic(k)) => rsa_pss_verify(self.hash, k, data, sig),
            (SchemeFamily::Ecdsa, SigningKey::EcP256Public(vk)) => {
                match p256::ecdsa::Signature::from_slice(sig) {
                    Ok(s) => vk.verify_prehash(&self.hash.digest(data), &s).is_ok(),
                    Err(_) => false,
                }
            }
            (SchemeFamily::Ecdsa, SigningKey::EcP384Public(vk)) => {
                match p384::ecdsa::Signature::from_slice(sig) {
                    Ok(s) => vk.verify_prehash(&self.hash.digest(data), &s).is_ok(),
                    Err(_) => false,
                }
            }
            (SchemeFamily::Hmac, SigningKey::Hmac(secret)) => {
                let expected = compute_hmac(self.hash, &secret, data)?;
                constant_time_eq(&expected, sig)
            }
            _ => false,
        };
        Ok(ok)
    }
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

macro_rules! with_sha {
    ($hash:expr, $mac:ident) => {
        match $hash {
            HashAlg::Sha1 => $mac!(sha1::Sha1),
            HashAlg::Sha224 => $mac!(sha2::Sha224),
            HashAlg::Sha256 => $mac!(sha2::Sha256),
            HashAlg::Sha384 => $mac!(sha2::Sha384),
            HashAlg::Sha512 => $mac!(sha2::Sha512),
            other => {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "{other:?} in a signature scheme"
                )))
            }
        }
    };
}

fn rsa_pkcs1v15_sign(hash: HashAlg, key: &rsa::RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
    use signature::Signer;
    macro_rules! do_sign {
        ($hasher:ty) => {
            rsa::pkcs1v15::SigningKey::<$hasher>::new(key.clone())
                .try_sign(data)
                .map(|s| s.to_vec())
        };
    }
    with_sha!(hash, do_sign).map_err(|e| Error::Crypto(format!("RSA signing failed: {e}")))
}

fn rsa_pkcs1v15_verify(hash: HashAlg, key: rsa::RsaPublicKey, data: &[u8], sig: &[u8]) -> bool {
    use signature::Verifier;
    let Ok(sig) = rsa::pkcs1v15::Signature::try_from(sig) else {
        return false;
    };
    let verify = || -> Result<bool, Error> {
        macro_rules! do_verify {
            ($hasher:ty) => {
                rsa::pkcs1v15::VerifyingKey::<$hasher>::new(key.clone())
                    .verify(data, &sig)
                    .is_ok()
            };
        }
        Ok(with_sha!(hash, do_verify))
    };
    verify().unwrap_or(false)
}

// ── RSA-PSS ──────────────────────────────────────────────────────────

fn rsa_pss_sign(hash: HashAlg, key: &rsa::RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
    use signature::RandomizedSigner;
    let mut rng = rand::thread_rng();
    macro_rules! do_sign {
        ($hasher:ty) => {
            rsa::pss::SigningKey::<$hasher>::new(key.clone())
                .try_sign_with_rng(&mut rng, data)
                .map(|s| s.to_vec())
        };
    }
    with_sha!(hash, do_sign).map_err(|e| Error::Crypto(format!("RSA-PSS signing failed: {e}")))
}

fn rsa_pss_verify(hash: HashAlg, key: rsa::RsaPublicKey, data: &[u8], sig: &[u8]) -> bool {
    use signature::Verifier;
    let Ok(sig) = rsa::pss::Signature::try_from(sig) else {
        return false;
    };
    let verify = || -> Result<bool, Error> {
        macro_rules! do_verify {
            ($hasher:ty) => {
                rsa::pss::VerifyingKey::<$hasher>::new(key.clone())
                    .verify(data, &sig)
                    .is_ok()
            };
        }
        Ok(with_sha!(hash, do_verify))
    };
    verify().unwrap_or(false)
}

// ── HMAC ─────────────────────────────────────────────────────────────

fn compute_hmac(hash: HashAlg, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    use hmac::{Hmac, Mac};
    macro_rules! do_mac {
        ($hasher:ty) => {{
            let mut mac = <Hmac<$hasher>>::new_from_slice(key)
                .map_err(|e| Error::Key(format!("HMAC key: {e}")))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }};
    }
    Ok(with_sha!(hash, do_mac))
}
