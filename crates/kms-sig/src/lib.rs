pub mod context;
pub mod digest;
pub mod error;
pub mod key_service;
pub mod signing;

pub use context::{ContextParseError, EncryptionContext};
pub use digest::Digest;
pub use error::Error;
pub use key_service::{Decrypted, KeyService, KeyServiceError, MemoryKeyService};
pub use signing::{VerifyReport, sign, verify};

#[cfg(feature = "aws")]
pub use key_service::AwsKeyService;
