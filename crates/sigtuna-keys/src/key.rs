#![forbid(unsafe_code)]

//! Key types and data structures.

use sigtuna_core::Error;
use sigtuna_crypto::SigningKey;

/// The underlying key data.
#[derive(Clone)]
pub enum KeyData {
    Rsa {
        private: Option<rsa::RsaPrivateKey>,
        public: rsa::RsaPublicKey,
    },
    EcP256 {
        private: Option<p256::ecdsa::SigningKey>,
        public: p256::ecdsa::VerifyingKey,
    },
    EcP384 {
        private: Option<p384::ecdsa::SigningKey>,
        public: p384::ecdsa::VerifyingKey,
    },
    Hmac(Vec<u8>),
}

impl std::fmt::Debug for KeyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let part = |private: bool| if private { "private+public" } else { "public" };
        match self {
            Self::Rsa { private, .. } => write!(f, "RSA {} key", part(private.is_some())),
            Self::EcP256 { private, .. } => write!(f, "EC P-256 {} key", part(private.is_some())),
            Self::EcP384 { private, .. } => write!(f, "EC P-384 {} key", part(private.is_some())),
            Self::Hmac(k) => write!(f, "HMAC key ({} bytes)", k.len()),
        }
    }
}

impl KeyData {
    /// Whether both hold the same public component.  Secret keys never match.
    pub fn same_public(&self, other: &KeyData) -> bool {
        match (self, other) {
            (Self::Rsa { public: a, .. }, Self::Rsa { public: b, .. }) => a == b,
            (Self::EcP256 { public: a, .. }, Self::EcP256 { public: b, .. }) => a == b,
            (Self::EcP384 { public: a, .. }, Self::EcP384 { public: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// A key, optionally named and paired with an X.509 certificate.
#[derive(Debug, Clone)]
pub struct Key {
    /// Name used for `<KeyName>` lookup.
    pub name: Option<String>,
    pub data: KeyData,
    /// DER-encoded certificate carrying the public half of this key.
    pub certificate: Option<Vec<u8>>,
}

impl Key {
    pub fn new(data: KeyData) -> Self {
        Self {
            name: None,
            data,
            certificate: None,
        }
    }

    /// Set the key name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn has_private(&self) -> bool {
        match &self.data {
            KeyData::Rsa { private, .. } => private.is_some(),
            KeyData::EcP256 { private, .. } => private.is_some(),
            KeyData::EcP384 { private, .. } => private.is_some(),
            KeyData::Hmac(_) => true,
        }
    }

    /// Convert to a `SigningKey` for use with crypto algorithms.  Private
    /// material is preferred when present.
    pub fn to_signing_key(&self) -> SigningKey {
        match &self.data {
            KeyData::Rsa { private: Some(pk), .. } => SigningKey::Rsa(pk.clone()),
            KeyData::Rsa { public, .. } => SigningKey::RsaPublic(public.clone()),
            KeyData::EcP256 { private: Some(sk), .. } => SigningKey::EcP256(sk.clone()),
            KeyData::EcP256 { public, .. } => SigningKey::EcP256Public(*public),
            KeyData::EcP384 { private: Some(sk), .. } => SigningKey::EcP384(sk.clone()),
            KeyData::EcP384 { public, .. } => SigningKey::EcP384Public(*public),
            KeyData::Hmac(k) => SigningKey::Hmac(k.clone()),
        }
    }

    /// Get the RSA public key if available.
    pub fn rsa_public_key(&self) -> Option<&rsa::RsaPublicKey> {
        match &self.data {
            KeyData::Rsa { public, .. } => Some(public),
            _ => None,
        }
    }

    /// Subject distinguished name of the attached certificate.
    pub fn certificate_subject(&self) -> Result<Option<String>, Error> {
        use der::Decode;
        let Some(der) = &self.certificate else {
            return Ok(None);
        };
        let cert = x509_cert::Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))?;
        Ok(Some(cert.tbs_certificate.subject.to_string()))
    }
}
