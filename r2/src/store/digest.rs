//! SHA-1 content digests.

use crate::utils::{R2Error, Result};
use serde::{Deserialize, Serialize};
use sha1::{Digest as _, Sha1};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

/// Read size used when hashing files.
const BLOCK_SIZE: usize = 64 * 1024;

/// A 160-bit SHA-1 digest. Serialized as 40 lowercase hex characters.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest([u8; 20]);

impl Digest {
    /// Digest of an in-memory buffer
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(Sha1::digest(data).into())
    }

    /// Streaming digest of a file's contents
    pub fn of_file(path: &Path) -> std::io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::of_reader(&mut reader)
    }

    pub fn of_reader<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut hasher = Sha1::new();
        let mut buffer = vec![0u8; BLOCK_SIZE];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(Self(hasher.finalize().into()))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Digest {
    type Err = R2Error;

    /// Only the canonical lowercase form is accepted, so a digest always maps
    /// to exactly one file name in the store.
    fn from_str(s: &str) -> Result<Self> {
        let canonical = s.len() == 40
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !canonical {
            return Err(R2Error::InvalidDigest(s.to_string()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| R2Error::InvalidDigest(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Digest {
    type Error = R2Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Digest> for String {
    fn from(d: Digest) -> Self {
        d.to_hex()
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
