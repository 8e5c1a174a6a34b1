use crate::core::errors::PipelineError;
use crate::core::kernel::canonical::canonical_string;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha2::{Digest, Sha256};
use tracing::trace;

type HmacSha256 = Hmac<Sha256>;

/// Signer trait for request authentication
///
/// Implementations receive the sorted canonical entries of the signature
/// scope and return a lowercase hex digest. The same entries must always
/// produce the same signature.
pub trait Signer: Send + Sync {
    /// Sign canonical entries (already sorted)
    fn sign(&self, entries: &[String]) -> Result<String, PipelineError>;
}

/// Unkeyed MD5 over the canonical string, the digest the backend verifies.
///
/// Both the canonicalization and the digest are visible to anyone holding the
/// client, so this is tamper evidence against casual replay, not a secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestSigner;

impl DigestSigner {
    pub const fn new() -> Self {
        Self
    }
}

impl Signer for DigestSigner {
    fn sign(&self, entries: &[String]) -> Result<String, PipelineError> {
        let payload = canonical_string(entries);
        trace!(payload = %payload, "signing canonical string");
        Ok(hex::encode(Md5::digest(payload.as_bytes())))
    }
}

/// Unkeyed SHA-256 over the canonical string, for servers that verify it
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Signer;

impl Signer for Sha256Signer {
    fn sign(&self, entries: &[String]) -> Result<String, PipelineError> {
        Ok(hex::encode(Sha256::digest(canonical_string(entries).as_bytes())))
    }
}

/// HMAC-SHA256 signer for deployments that share a secret with the server
pub struct HmacSigner {
    secret_key: String,
}

impl HmacSigner {
    /// Create a new HMAC signer
    ///
    /// # Arguments
    /// * `secret_key` - Secret shared with the verifying server
    pub fn new(secret_key: String) -> Self {
        Self { secret_key }
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl Signer for HmacSigner {
    fn sign(&self, entries: &[String]) -> Result<String, PipelineError> {
        let payload = canonical_string(entries);
        trace!(payload = %payload, "signing canonical string with hmac");

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| PipelineError::Signing(format!("Invalid secret key: {}", e)))?;
        mac.update(payload.as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
