use std::fmt;
use std::path::Path;

use sha2::{Digest as _, Sha256};
use subtle::ConstantTimeEq;
use tokio::io::AsyncReadExt;

use crate::error::TransferError;

const REFERENCE_READ_SIZE: usize = 64 * 1024;

/// Finished SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

/// Incremental hash over confirmed bytes only.
#[derive(Clone, Default)]
pub struct RollingHasher {
    inner: Sha256,
}

impl RollingHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finalize(self) -> Digest {
        Digest(self.inner.finalize().into())
    }
}

/// Hashes a whole file once, streaming it in fixed-size reads.
pub async fn reference_digest(path: &Path) -> Result<(Digest, u64), TransferError> {
    if !path.exists() {
        return Err(TransferError::FileNotFound(path.to_path_buf()));
    }
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = RollingHasher::new();
    let mut buf = vec![0u8; REFERENCE_READ_SIZE];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((hasher.finalize(), total))
}

/// Compares digests in constant time.
pub fn verify(expected: &Digest, actual: &Digest) -> Result<(), TransferError> {
    if bool::from(expected.0.ct_eq(&actual.0)) {
        Ok(())
    } else {
        Err(TransferError::DataCorrupted {
            expected: *expected,
            actual: *actual,
        })
    }
}
