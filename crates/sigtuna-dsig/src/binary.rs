#![forbid(unsafe_code)]

//! Signatures over raw octets, as used by the SAML HTTP-Redirect binding.

use crate::context::SignContext;
use crate::verify::VerifyOutcome;
use sigtuna_core::Error;
use sigtuna_crypto::TransformId;
use sigtuna_keys::Key;

/// Sign `data` with `key`.  Nothing is returned on failure.
pub fn sign_binary(key: &Key, transform: TransformId, data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut ctx = SignContext::new(key, transform)?;
    ctx.update(data);
    let signature = ctx.finalize_sign()?;
    tracing::debug!(%transform, len = signature.len(), "signed binary data");
    Ok(signature)
}

/// Check `signature` over `data`.  A mismatch is `Invalid`; an unusable
/// key/transform pair is an error.
pub fn verify_binary(
    key: &Key,
    transform: TransformId,
    data: &[u8],
    signature: &[u8],
) -> Result<VerifyOutcome, Error> {
    let mut ctx = SignContext::new(key, transform)?;
    ctx.update(data);
    let outcome = VerifyOutcome::from(ctx.finalize_verify(signature)?);
    tracing::debug!(%transform, ?outcome, "verified binary data");
    Ok(outcome)
}
