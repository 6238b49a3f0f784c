use std::collections::HashMap;

use anyhow::anyhow;
use aws_config::BehaviorVersion;
use aws_sdk_kms::Client;
use aws_sdk_kms::config::Region;
use aws_sdk_kms::error::SdkError;
use aws_sdk_kms::operation::decrypt::DecryptError;
use aws_sdk_kms::primitives::Blob;
use tokio::runtime::Handle;

use super::{Decrypted, KeyService, KeyServiceError};
use crate::context::EncryptionContext;

/// AWS KMS backend.
///
/// The SDK is async; calls block on `runtime`, so they must be made from a
/// thread that is not driving that runtime (e.g. inside `spawn_blocking`).
pub struct AwsKeyService {
    client: Client,
    runtime: Handle,
}

impl AwsKeyService {
    pub fn new(client: Client, runtime: Handle) -> Self {
        Self { client, runtime }
    }

    /// Loads credentials and region from the default AWS provider chain.
    /// `region` and `endpoint_url` override what the chain finds.
    pub async fn from_env(region: Option<String>, endpoint_url: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint_url) = endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let config = loader.load().await;

        tracing::debug!(region = ?config.region(), "loaded AWS configuration");
        Self::new(Client::new(&config), Handle::current())
    }
}

impl KeyService for AwsKeyService {
    fn encrypt(
        &self,
        plaintext: &[u8],
        context: &EncryptionContext,
        key_id: &str,
    ) -> Result<Vec<u8>, KeyServiceError> {
        let request = self
            .client
            .encrypt()
            .key_id(key_id)
            .plaintext(Blob::new(plaintext))
            .set_encryption_context(kms_context(context));

        let output = self.runtime.block_on(request.send()).map_err(|err| {
            KeyServiceError::Remote(anyhow::Error::new(err).context("KMS Encrypt request failed"))
        })?;

        output
            .ciphertext_blob()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| KeyServiceError::Remote(anyhow!("KMS Encrypt returned no ciphertext")))
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        context: &EncryptionContext,
    ) -> Result<Decrypted, KeyServiceError> {
        let request = self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(ciphertext))
            .set_encryption_context(kms_context(context));

        let output = self
            .runtime
            .block_on(request.send())
            .map_err(classify_decrypt_error)?;

        let plaintext = output
            .plaintext()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| KeyServiceError::Remote(anyhow!("KMS Decrypt returned no plaintext")))?;
        let key_id = output
            .key_id()
            .map(str::to_string)
            .ok_or_else(|| KeyServiceError::Remote(anyhow!("KMS Decrypt returned no key ID")))?;

        Ok(Decrypted { plaintext, key_id })
    }

    fn name(&self) -> &str {
        "aws-kms"
    }
}

/// KMS treats an omitted context and an empty one alike; omit it.
fn kms_context(context: &EncryptionContext) -> Option<HashMap<String, String>> {
    if context.is_empty() {
        return None;
    }
    Some(
        context
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

fn classify_decrypt_error(err: SdkError<DecryptError>) -> KeyServiceError {
    if let Some(invalid) = err.as_service_error().and_then(invalid_ciphertext) {
        return invalid;
    }
    KeyServiceError::Remote(anyhow::Error::new(err).context("KMS Decrypt request failed"))
}

fn invalid_ciphertext(err: &DecryptError) -> Option<KeyServiceError> {
    err.is_invalid_ciphertext_exception()
        .then(|| KeyServiceError::InvalidCiphertext(err.to_string()))
}
