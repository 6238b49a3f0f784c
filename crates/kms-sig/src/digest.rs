use std::fmt;
use std::io::{self, Read};

use sha2::{Digest as _, Sha512};
use subtle::ConstantTimeEq;

pub const DIGEST_LEN: usize = 64;

/// SHA-512 digest of a complete input stream.
///
/// This is the plaintext handed to the key service when signing, and the
/// value a decrypted signature must reproduce when verifying.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Consumes `reader` to EOF and hashes everything it yields.
    pub fn of_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = Sha512::new();
        io::copy(&mut reader, &mut hasher)?;

        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&hasher.finalize());
        Ok(Self(bytes))
    }

    pub fn of_bytes(data: &[u8]) -> Self {
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&Sha512::digest(data));
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Constant-time comparison against recovered plaintext.
    ///
    /// A length mismatch returns early; the length of a digest is public.
    pub fn matches(&self, candidate: &[u8]) -> bool {
        if candidate.len() != DIGEST_LEN {
            return false;
        }
        self.0.as_slice().ct_eq(candidate).into()
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}
