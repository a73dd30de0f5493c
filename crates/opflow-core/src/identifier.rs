//! Prefixed, roughly time-ordered base58 identifiers (`wal_...`, `flow_...`).

use chrono::Utc;
use rand::RngCore;
use std::fmt;

/// Seconds since the Unix epoch at 2024-01-01T00:00:00Z.
const EPOCH: i64 = 1_704_067_200;

/// Default number of random bytes behind an identifier.
const DEFAULT_BYTES: usize = 12;

/// Record kinds that get their own identifier prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    /// Key ids handed to wallet auth servers.
    KeyId,
    Wallet,
    Flow,
}

impl IdPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyId => "optuikid",
            Self::Wallet => "wal",
            Self::Flow => "flow",
        }
    }
}

impl fmt::Display for IdPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier factory.
pub struct Identifier;

impl Identifier {
    /// Create an identifier with the default size.
    pub fn create(prefix: IdPrefix) -> String {
        Self::create_with_size(prefix, DEFAULT_BYTES)
    }

    /// Create an identifier from `size` random bytes.
    ///
    /// When more than four bytes are requested, the first four hold the
    /// big-endian seconds elapsed since [`EPOCH`] so ids sort by creation time.
    pub fn create_with_size(prefix: IdPrefix, size: usize) -> String {
        let size = size.max(1);
        let mut buf = vec![0u8; size];
        rand::thread_rng().fill_bytes(&mut buf);

        if size > 4 {
            let elapsed = (Utc::now().timestamp() - EPOCH).max(0) as u32;
            buf[..4].copy_from_slice(&elapsed.to_be_bytes());
        }

        format!("{}_{}", prefix, bs58::encode(&buf).into_string())
    }
}
