use crate::key_service::KeyServiceError;

/// Exit status for a signature that failed verification.
pub const EXIT_INVALID_SIGNATURE: u8 = 1;
/// Exit status for malformed arguments or context strings.
pub const EXIT_CONFIGURATION: u8 = 2;
/// Exit status for local I/O failures.
pub const EXIT_IO: u8 = 3;
/// Exit status for key service failures other than an invalid ciphertext.
pub const EXIT_KEY_SERVICE: u8 = 4;
/// Exit status for failures that fit none of the classes above.
pub const EXIT_UNEXPECTED: u8 = 5;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read input: {0}")]
    Read(#[from] std::io::Error),
    #[error("key service request failed")]
    KeyService(#[source] anyhow::Error),
    #[error("signature is invalid")]
    InvalidSignature,
}

impl Error {
    /// Whether verification ran to completion and rejected the signature,
    /// as opposed to being unable to check it at all.
    pub fn is_invalid_signature(&self) -> bool {
        matches!(self, Error::InvalidSignature)
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Read(_) => EXIT_IO,
            Error::KeyService(_) => EXIT_KEY_SERVICE,
            Error::InvalidSignature => EXIT_INVALID_SIGNATURE,
        }
    }
}

/// Lifts a key service failure into the signing error space.
///
/// Only `verify` may turn `InvalidCiphertext` into `InvalidSignature`; here it
/// is kept as an ordinary remote failure.
impl From<KeyServiceError> for Error {
    fn from(error: KeyServiceError) -> Self {
        match error {
            KeyServiceError::Remote(cause) => Self::KeyService(cause),
            invalid @ KeyServiceError::InvalidCiphertext(_) => {
                Self::KeyService(anyhow::Error::new(invalid))
            }
        }
    }
}
