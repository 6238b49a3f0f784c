use std::io::Read;

use serde::Serialize;

use crate::context::EncryptionContext;
use crate::digest::Digest;
use crate::error::Error;
use crate::key_service::{KeyService, KeyServiceError};

/// Verifies `signature` over everything `reader` yields.
///
/// Returns the ID of the key that made the signature. Returns
/// `Error::InvalidSignature` when the key service rejects the signature under
/// `context` or when the recovered digest differs from the data's digest.
/// Other key service failures come back as `Error::KeyService`, so a bad
/// signature is never confused with a signature that could not be checked.
pub fn verify<R: Read>(
    keys: &dyn KeyService,
    context: &EncryptionContext,
    reader: R,
    signature: &[u8],
) -> Result<String, Error> {
    let digest = Digest::of_reader(reader)?;
    tracing::debug!(%digest, context_pairs = context.len(), "hashed input for verification");

    let decrypted = match keys.decrypt(signature, context) {
        Ok(decrypted) => decrypted,
        Err(KeyServiceError::InvalidCiphertext(reason)) => {
            tracing::warn!(backend = keys.name(), %reason, "key service rejected signature");
            return Err(Error::InvalidSignature);
        }
        Err(KeyServiceError::Remote(cause)) => return Err(Error::KeyService(cause)),
    };

    if !digest.matches(&decrypted.plaintext) {
        tracing::warn!(key_id = %decrypted.key_id, "signature does not match input digest");
        return Err(Error::InvalidSignature);
    }

    tracing::info!(key_id = %decrypted.key_id, backend = keys.name(), "verified signature");
    Ok(decrypted.key_id)
}

/// Machine-readable outcome of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

impl VerifyReport {
    pub fn valid(key_id: impl Into<String>) -> Self {
        Self {
            valid: true,
            key_id: Some(key_id.into()),
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            key_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_report_json() {
        let json = serde_json::to_string(&VerifyReport::valid("alias/release")).unwrap();
        assert_eq!(json, r#"{"valid":true,"key_id":"alias/release"}"#);
    }

    #[test]
    fn invalid_report_omits_key() {
        let json = serde_json::to_string(&VerifyReport::invalid()).unwrap();
        assert_eq!(json, r#"{"valid":false}"#);
    }
}
