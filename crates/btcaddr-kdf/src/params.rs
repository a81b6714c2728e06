//! scrypt cost parameters and validation.

use crate::KdfError;
use serde::{Deserialize, Serialize};

/// Upper bound on the PBKDF2 output length for a given HMAC tag length:
/// block indices are 1-based 32-bit integers.
pub(crate) fn pbkdf2_max_len(hmac_len: usize) -> u64 {
    (hmac_len as u64).saturating_mul(u32::MAX as u64)
}

/// scrypt cost parameters `{N, r, p, maxThreads}`.
///
/// The derived key depends only on `cost`, `block_size` and `parallelism`;
/// `max_threads` and `lock_memory` change how the work is done, never the
/// result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptParams {
    /// CPU/memory cost `N`: a positive power of two.
    pub cost: u32,
    /// Block size `r`: each lane is `128 * r` bytes.
    pub block_size: u32,
    /// Parallelism `p`: number of independent SMix lanes.
    pub parallelism: u32,
    /// Upper bound on worker threads (at least 1).
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    /// `mlock` the scratch tables while mixing (best effort).
    #[serde(default)]
    pub lock_memory: bool,
}

fn default_max_threads() -> usize {
    usize::MAX
}

impl ScryptParams {
    /// Parameters with no thread limit and unlocked scratch memory.
    pub fn new(cost: u32, block_size: u32, parallelism: u32) -> Self {
        Self {
            cost,
            block_size,
            parallelism,
            max_threads: default_max_threads(),
            lock_memory: false,
        }
    }

    /// BIP-38 key encryption: N = 16384, r = 8, p = 8.
    pub fn bip38() -> Self {
        Self::new(16384, 8, 8)
    }

    /// BIP-38 confirmation code validation: N = 1024, r = 1, p = 1.
    pub fn bip38_confirmation() -> Self {
        Self::new(1024, 1, 1)
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_locked_memory(mut self, lock: bool) -> Self {
        self.lock_memory = lock;
        self
    }

    /// Bytes per lane (`128 * r`).
    pub fn lane_bytes(&self) -> u64 {
        128 * self.block_size as u64
    }

    /// Bytes of scratch table per lane (`128 * r * N`).
    pub fn scratch_bytes(&self) -> u64 {
        self.lane_bytes().saturating_mul(self.cost as u64)
    }

    /// Scratch memory summed over all lanes (`128 * r * N * p`).
    pub fn total_bytes(&self) -> u64 {
        self.scratch_bytes().saturating_mul(self.parallelism as u64)
    }

    /// Words per lane.
    pub(crate) fn lane_words(&self) -> usize {
        32 * self.block_size as usize
    }

    /// Check the parameters against an HMAC of tag length `hmac_len`.
    ///
    /// Runs before any allocation. Malformed values are
    /// [`KdfError::InvalidParameter`]; a scratch table that could never be
    /// addressed is [`KdfError::ResourceExhausted`].
    pub fn validate(&self, hmac_len: usize) -> Result<(), KdfError> {
        if self.cost == 0 || !self.cost.is_power_of_two() {
            return Err(KdfError::InvalidParameter(format!(
                "cost must be a positive power of two, got {}",
                self.cost
            )));
        }
        if self.block_size == 0 {
            return Err(KdfError::InvalidParameter(
                "block_size must be at least 1".to_string(),
            ));
        }
        if self.parallelism == 0 {
            return Err(KdfError::InvalidParameter(
                "parallelism must be at least 1".to_string(),
            ));
        }
        if self.max_threads == 0 {
            return Err(KdfError::InvalidParameter(
                "max_threads must be at least 1".to_string(),
            ));
        }

        let addressable = isize::MAX as u64;

        // The stretched buffer B holds all lanes and must be addressable,
        // and the first PBKDF2 pass must be able to produce it.
        let lane = self.lane_bytes();
        let buffer = lane.checked_mul(self.parallelism as u64).filter(|&b| b <= addressable);
        let buffer = buffer.ok_or_else(|| {
            KdfError::InvalidParameter(format!(
                "block_size {} with parallelism {} exceeds the addressable buffer size",
                self.block_size, self.parallelism
            ))
        })?;
        if buffer > pbkdf2_max_len(hmac_len) {
            return Err(KdfError::InvalidParameter(format!(
                "parallelism {} exceeds what a {}-byte HMAC can stretch",
                self.parallelism, hmac_len
            )));
        }

        let scratch = lane
            .checked_mul(self.cost as u64)
            .and_then(|s| s.checked_mul(self.parallelism as u64))
            .filter(|&s| s <= addressable);
        if scratch.is_none() {
            return Err(KdfError::ResourceExhausted(format!(
                "scratch memory 128 * {} * {} * {} bytes exceeds addressable memory",
                self.block_size, self.cost, self.parallelism
            )));
        }

        Ok(())
    }
}

impl Default for ScryptParams {
    /// BIP-38 key encryption parameters.
    fn default() -> Self {
        Self::bip38()
    }
}
