#![forbid(unsafe_code)]

//! Process-wide lifecycle and the operations bracketed by it.
//!
//! The library moves through `Uninitialized -> Initialized -> ShutDown`
//! exactly once per process.  [`init`] returns the only [`Runtime`]
//! handle; [`Runtime::shutdown`] consumes it.

use sigtuna_core::Error;
use sigtuna_crypto::TransformId;
use sigtuna_dsig::{SignOptions, VerifyOptions, VerifyOutcome};
use sigtuna_keys::{loader, Key, KeysManager};
use sigtuna_saml::{SamlAttribute, SchemaSet};
use sigtuna_xml::Document;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Initialized,
    ShutDown,
}

impl State {
    fn start(self) -> Result<State, Error> {
        match self {
            State::Uninitialized => Ok(State::Initialized),
            State::Initialized => Err(Error::AlreadyInitialized),
            State::ShutDown => Err(Error::ShutDown),
        }
    }

    fn stop(self) -> Result<State, Error> {
        match self {
            State::Initialized => Ok(State::ShutDown),
            State::Uninitialized => Err(Error::NotInitialized),
            State::ShutDown => Err(Error::ShutDown),
        }
    }

    fn live(self) -> Result<(), Error> {
        match self {
            State::Initialized => Ok(()),
            State::Uninitialized => Err(Error::NotInitialized),
            State::ShutDown => Err(Error::ShutDown),
        }
    }
}

static STATE: Mutex<State> = Mutex::new(State::Uninitialized);

fn transition(f: impl FnOnce(State) -> Result<State, Error>) -> Result<(), Error> {
    let mut state = STATE
        .lock()
        .map_err(|_| Error::Other("lifecycle lock poisoned".into()))?;
    *state = f(*state)?;
    Ok(())
}

fn current() -> Result<(), Error> {
    STATE
        .lock()
        .map_err(|_| Error::Other("lifecycle lock poisoned".into()))?
        .live()
}

/// Process-wide settings fixed at [`init`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Log the canonical octets fed to digests and signatures.
    pub debug: bool,
    /// Base directory for relative paths given to the `*_file` operations.
    /// An `xsd/` subdirectory holding the SAML schema set replaces the
    /// bundled schemas.
    pub resource_dir: Option<PathBuf>,
}

impl InitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }
}

/// Initialize the library.  Succeeds once per process.
pub fn init(options: InitOptions) -> Result<Runtime, Error> {
    if let Some(dir) = &options.resource_dir {
        if !dir.is_dir() {
            return Err(Error::Other(format!(
                "resource directory {} does not exist",
                dir.display()
            )));
        }
    }
    transition(State::start)?;
    let schemas = SchemaSet::locate(options.resource_dir.as_deref());
    tracing::debug!(
        debug = options.debug,
        resource_dir = ?options.resource_dir,
        schemas = %schemas.dir().display(),
        "sigtuna initialized"
    );
    Ok(Runtime { options, schemas })
}

/// Handle to the initialized library.
#[derive(Debug)]
pub struct Runtime {
    options: InitOptions,
    schemas: SchemaSet,
}

impl Runtime {
    pub fn options(&self) -> &InitOptions {
        &self.options
    }

    /// The XSD set [`Runtime::validate_document`] checks against.
    pub fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    /// Tear the library down.  No further [`init`] is possible.
    pub fn shutdown(self) -> Result<(), Error> {
        transition(State::stop)?;
        tracing::debug!("sigtuna shut down");
        Ok(())
    }

    fn live(&self) -> Result<(), Error> {
        current().map_err(|e| {
            tracing::warn!(error = %e, "operation outside the initialized window");
            e
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.options.resource_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn sign_options(&self, opts: &SignOptions) -> SignOptions {
        opts.clone().with_debug(opts.debug || self.options.debug)
    }

    // ── Documents ────────────────────────────────────────────────────

    /// Parse XML; `None` when the input is not well-formed.
    pub fn parse(&self, data: &[u8]) -> Option<Document> {
        self.live().ok()?;
        match Document::parse_bytes(data) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::debug!(error = %e, "parse failed");
                None
            }
        }
    }

    pub fn parse_file(&self, path: impl AsRef<Path>) -> Option<Document> {
        let path = self.resolve(path.as_ref());
        match std::fs::read(&path) {
            Ok(data) => self.parse(&data),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "read failed");
                None
            }
        }
    }

    pub fn serialize(&self, doc: &Document) -> Result<Vec<u8>, Error> {
        self.live()?;
        Ok(doc.to_xml_string().into_bytes())
    }

    /// Release a document.  Taking it by value makes reuse impossible; the
    /// document is dropped even when the library is not live.
    pub fn release_document(&self, doc: Document) -> Result<(), Error> {
        drop(doc);
        self.live()
    }

    // ── Keys ─────────────────────────────────────────────────────────

    pub fn load_key(&self, pem: &[u8]) -> Result<Key, Error> {
        self.live()?;
        loader::load_key(pem)
    }

    pub fn load_key_file(&self, path: impl AsRef<Path>) -> Result<Key, Error> {
        self.live()?;
        loader::load_key_file(&self.resolve(path.as_ref()))
    }

    pub fn load_cert(&self, pem: &[u8]) -> Result<Key, Error> {
        self.live()?;
        loader::load_cert(pem)
    }

    pub fn load_cert_file(&self, path: impl AsRef<Path>) -> Result<Key, Error> {
        self.live()?;
        loader::load_cert_file(&self.resolve(path.as_ref()))
    }

    pub fn load_hmac_key(&self, secret: &[u8]) -> Result<Key, Error> {
        self.live()?;
        Ok(loader::load_hmac_key(secret))
    }

    pub fn attach_cert(&self, key: &mut Key, pem: &[u8]) -> Result<(), Error> {
        self.live()?;
        loader::attach_cert(key, pem)
    }

    pub fn attach_cert_file(&self, key: &mut Key, path: impl AsRef<Path>) -> Result<(), Error> {
        self.live()?;
        loader::attach_cert_file(key, &self.resolve(path.as_ref()))
    }

    /// Adopt `keys` into a new manager; on failure nothing is kept.
    pub fn create_keys_manager(&self, keys: Vec<Key>) -> Result<KeysManager, Error> {
        self.live()?;
        sigtuna_keys::create_keys_manager(keys)
    }

    /// `None` for an unsupported algorithm URI.
    pub fn resolve_transform(&self, uri: &str) -> Option<TransformId> {
        self.live().ok()?;
        TransformId::resolve(uri)
    }

    // ── Signatures ───────────────────────────────────────────────────

    pub fn sign_binary(&self, key: &Key, transform: TransformId, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.live()?;
        sigtuna_dsig::sign_binary(key, transform, data)
    }

    pub fn verify_binary(
        &self,
        key: &Key,
        transform: TransformId,
        data: &[u8],
        signature: &[u8],
    ) -> Result<VerifyOutcome, Error> {
        self.live()?;
        sigtuna_dsig::verify_binary(key, transform, data, signature)
    }

    pub fn sign_document(
        &self,
        key: &Key,
        transform: TransformId,
        doc: &mut Document,
        opts: &SignOptions,
    ) -> Result<(), Error> {
        self.live()?;
        sigtuna_dsig::sign_document(key, transform, doc, &self.sign_options(opts))
            .map_err(|e| Error::SamlSign(Box::new(e)))
    }

    pub fn verify_document(
        &self,
        manager: &KeysManager,
        doc: &mut Document,
        opts: &VerifyOptions,
    ) -> Result<VerifyOutcome, Error> {
        self.live()?;
        sigtuna_dsig::verify_document(manager, doc, &self.sign_options(opts))
            .map_err(|e| Error::SamlVerify(Box::new(e)))
    }

    /// Parse `xml`, sign it and serialize the result.
    pub fn sign_xml_text(
        &self,
        key: &Key,
        transform: TransformId,
        xml: &str,
        opts: &SignOptions,
    ) -> Result<String, Error> {
        self.live()?;
        let mut doc = Document::parse(xml).map_err(|e| {
            tracing::debug!(error = %e, "sign_xml_text parse failed");
            Error::XmlText(Box::new(e))
        })?;
        self.sign_document(key, transform, &mut doc, opts)?;
        let signed = doc.to_xml_string();
        self.release_document(doc)?;
        Ok(signed)
    }

    // ── SAML fields ──────────────────────────────────────────────────

    pub fn issuer(&self, doc: &Document) -> Option<String> {
        self.live().ok()?;
        sigtuna_saml::issuer(doc)
    }

    pub fn session_index(&self, doc: &Document) -> Option<String> {
        self.live().ok()?;
        sigtuna_saml::session_index(doc)
    }

    pub fn attributes(&self, doc: &Document) -> Result<Vec<SamlAttribute>, Error> {
        self.live()?;
        sigtuna_saml::attributes(doc)
    }

    /// Whether `doc` conforms to the SAML 2.0 schemas.
    pub fn validate_document(&self, doc: &Document) -> bool {
        self.live().is_ok() && self.schemas.validate(doc)
    }
}
