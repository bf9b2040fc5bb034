#![forbid(unsafe_code)]

/// Errors produced by the sigtuna SAML signature library.
///
/// Semantic verification failures are never reported through this type;
/// they surface as an `Invalid` outcome instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("ID registration failed: {0}")]
    IdRegistration(String),

    #[error("insertion point not found: {0}")]
    InsertionPoint(String),

    #[error("element is already signed: {0}")]
    AlreadySigned(String),

    #[error("{0}")]
    KeysManager(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("saml sign failed: {0}")]
    SamlSign(#[source] Box<Error>),

    #[error("saml verify failed: {0}")]
    SamlVerify(#[source] Box<Error>),

    #[error("unable to parse xml string")]
    XmlText(#[source] Box<Error>),

    #[error("library not initialized")]
    NotInitialized,

    #[error("library already initialized")]
    AlreadyInitialized,

    #[error("library has been shut down")]
    ShutDown,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
