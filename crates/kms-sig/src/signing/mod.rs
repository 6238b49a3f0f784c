mod signer;
mod verifier;

pub use signer::sign;
pub use verifier::{VerifyReport, verify};
