mod memory;
#[cfg(feature = "aws")]
mod aws;

pub use memory::MemoryKeyService;
#[cfg(feature = "aws")]
pub use aws::AwsKeyService;

use crate::context::EncryptionContext;

/// Plaintext recovered by a decrypt call, with the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    pub plaintext: Vec<u8>,
    pub key_id: String,
}

/// Failure of a key service call, already classified by the backend.
#[derive(Debug, thiserror::Error)]
pub enum KeyServiceError {
    /// The ciphertext cannot be decrypted under the given context.
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),
    /// Anything else: transport, authentication, throttling, bad requests.
    #[error(transparent)]
    Remote(anyhow::Error),
}

/// A remote key-management service that can encrypt under a named key and
/// decrypt without being told the key.
///
/// Implementations are sync. For async backends (e.g. KMS), block on a
/// runtime handle from a `spawn_blocking` thread. Callers may share one
/// service between threads.
pub trait KeyService: Send + Sync {
    /// Encrypts `plaintext` under `key_id`, binding `context` to the result.
    fn encrypt(
        &self,
        plaintext: &[u8],
        context: &EncryptionContext,
        key_id: &str,
    ) -> Result<Vec<u8>, KeyServiceError>;

    /// Decrypts `ciphertext`, which only succeeds under the context it was
    /// encrypted with.
    fn decrypt(
        &self,
        ciphertext: &[u8],
        context: &EncryptionContext,
    ) -> Result<Decrypted, KeyServiceError>;

    /// Backend name for logs (e.g. "aws-kms").
    fn name(&self) -> &str;
}
