use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use super::{Decrypted, KeyService, KeyServiceError};
use crate::context::EncryptionContext;

struct Sealed {
    key_id: String,
    context: EncryptionContext,
    plaintext: Vec<u8>,
}

/// In-process key service with the binding behaviour of a real KMS.
///
/// Every ciphertext is an opaque handle to a sealed record. Decrypting
/// succeeds only for the exact handle bytes under the exact context the
/// record was sealed with; anything else is `InvalidCiphertext`. Encrypting
/// the same plaintext twice yields different ciphertexts.
///
/// Nothing leaves the process, so this is only useful for tests and local
/// experiments.
pub struct MemoryKeyService {
    keys: HashSet<String>,
    counter: AtomicU64,
    sealed: Mutex<HashMap<Vec<u8>, Sealed>>,
}

impl MemoryKeyService {
    pub fn new<I, S>(key_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: key_ids.into_iter().map(Into::into).collect(),
            counter: AtomicU64::new(0),
            sealed: Mutex::new(HashMap::new()),
        }
    }

    fn handle(&self, key_id: &str, context: &EncryptionContext, plaintext: &[u8]) -> Vec<u8> {
        let serial = self.counter.fetch_add(1, Ordering::Relaxed).to_be_bytes();

        let mut hasher = Sha256::new();
        hasher.update(serial);
        hasher.update(key_id.as_bytes());
        for (key, value) in context {
            hasher.update((key.len() as u64).to_be_bytes());
            hasher.update(key.as_bytes());
            hasher.update((value.len() as u64).to_be_bytes());
            hasher.update(value.as_bytes());
        }
        hasher.update(plaintext);

        let mut handle = serial.to_vec();
        handle.extend_from_slice(&hasher.finalize());
        handle
    }
}

impl KeyService for MemoryKeyService {
    fn encrypt(
        &self,
        plaintext: &[u8],
        context: &EncryptionContext,
        key_id: &str,
    ) -> Result<Vec<u8>, KeyServiceError> {
        if !self.keys.contains(key_id) {
            return Err(KeyServiceError::Remote(anyhow::anyhow!(
                "key {key_id:?} does not exist"
            )));
        }

        let handle = self.handle(key_id, context, plaintext);
        let mut sealed = self
            .sealed
            .lock()
            .map_err(|_| KeyServiceError::Remote(anyhow::anyhow!("key store lock poisoned")))?;
        sealed.insert(
            handle.clone(),
            Sealed {
                key_id: key_id.to_string(),
                context: context.clone(),
                plaintext: plaintext.to_vec(),
            },
        );
        Ok(handle)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        context: &EncryptionContext,
    ) -> Result<Decrypted, KeyServiceError> {
        let sealed = self
            .sealed
            .lock()
            .map_err(|_| KeyServiceError::Remote(anyhow::anyhow!("key store lock poisoned")))?;

        match sealed.get(ciphertext) {
            Some(record) if record.context == *context => Ok(Decrypted {
                plaintext: record.plaintext.clone(),
                key_id: record.key_id.clone(),
            }),
            Some(_) => Err(KeyServiceError::InvalidCiphertext(
                "encryption context does not match".to_string(),
            )),
            None => Err(KeyServiceError::InvalidCiphertext(
                "unknown ciphertext".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}
