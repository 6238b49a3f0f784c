use std::io::Read;

use crate::context::EncryptionContext;
use crate::digest::Digest;
use crate::error::Error;
use crate::key_service::KeyService;

/// Signs everything `reader` yields.
///
/// The data is hashed with SHA-512 and the digest is encrypted under
/// `key_id` with `context` bound to it. The ciphertext is the signature.
/// Changing any bit of the data, the context or the signature makes it
/// invalid.
pub fn sign<R: Read>(
    keys: &dyn KeyService,
    key_id: &str,
    context: &EncryptionContext,
    reader: R,
) -> Result<Vec<u8>, Error> {
    let digest = Digest::of_reader(reader)?;
    tracing::debug!(%digest, context_pairs = context.len(), "hashed input for signing");

    let signature = keys.encrypt(digest.as_bytes(), context, key_id)?;

    tracing::info!(
        key_id,
        backend = keys.name(),
        signature_len = signature.len(),
        "signed input"
    );
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_service::{Decrypted, KeyServiceError};
    use std::io;
    use std::sync::Mutex;

    struct Recording {
        requests: Mutex<Vec<(Vec<u8>, EncryptionContext, String)>>,
        reply: fn() -> Result<Vec<u8>, KeyServiceError>,
    }

    impl KeyService for Recording {
        fn encrypt(
            &self,
            plaintext: &[u8],
            context: &EncryptionContext,
            key_id: &str,
        ) -> Result<Vec<u8>, KeyServiceError> {
            self.requests
                .lock()
                .unwrap()
                .push((plaintext.to_vec(), context.clone(), key_id.to_string()));
            (self.reply)()
        }

        fn decrypt(&self, _: &[u8], _: &EncryptionContext) -> Result<Decrypted, KeyServiceError> {
            unreachable!("sign never decrypts")
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[test]
    fn encrypts_the_sha512_digest_under_the_given_key() {
        let keys = Recording {
            requests: Mutex::new(Vec::new()),
            reply: || Ok(b"this is some encrypted stuff".to_vec()),
        };
        let context: EncryptionContext = [("A", "B")].into_iter().collect();

        let signature = sign(&keys, "keyID", &context, &b"this is definitely data"[..]).unwrap();
        assert_eq!(signature, b"this is some encrypted stuff");

        let requests = keys.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (plaintext, sent_context, key_id) = &requests[0];
        assert_eq!(plaintext.as_slice(), Digest::of_bytes(b"this is definitely data").as_bytes());
        assert_eq!(sent_context, &context);
        assert_eq!(key_id, "keyID");
    }

    #[test]
    fn read_error_skips_the_key_service() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("disk on fire"))
            }
        }

        let keys = Recording {
            requests: Mutex::new(Vec::new()),
            reply: || Ok(Vec::new()),
        };
        let err = sign(&keys, "keyID", &EncryptionContext::new(), Broken).unwrap_err();
        assert!(matches!(err, Error::Read(_)));
        assert!(keys.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn remote_failure_propagates() {
        let keys = Recording {
            requests: Mutex::new(Vec::new()),
            reply: || Err(KeyServiceError::Remote(anyhow::anyhow!("AccessDeniedException"))),
        };
        let err = sign(&keys, "keyID", &EncryptionContext::new(), io::empty()).unwrap_err();
        match err {
            Error::KeyService(cause) => assert_eq!(cause.to_string(), "AccessDeniedException"),
            other => panic!("expected KeyService error, got {other:?}"),
        }
    }
}
