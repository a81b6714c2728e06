//! scrypt orchestration
//!
//! `scrypt(P, S, N, r, p) = PBKDF2(P, SMix^p(PBKDF2(P, S, 1, p * 128r)), 1)`,
//! where the outer PBKDF2 is exposed as a [`Pbkdf2Stream`] so callers can
//! read as much key material as they need.

use crate::engine::run_lanes;
use crate::mac::{HmacFunction, HmacSha256};
use crate::memory::SecretWords;
use crate::params::{pbkdf2_max_len, ScryptParams};
use crate::pbkdf2::{self, Pbkdf2Stream};
use crate::KdfError;
use zeroize::Zeroizing;

/// scrypt over an injected HMAC strategy.
///
/// # Example
///
/// ```
/// use btcaddr_kdf::{ScryptKdf, ScryptParams};
///
/// let kdf = ScryptKdf::default();
/// let params = ScryptParams::bip38_confirmation().with_max_threads(1);
/// let key = kdf.derive(b"passphrase", b"salt", &params, 32).unwrap();
/// assert_eq!(key.len(), 32);
/// ```
#[derive(Debug, Clone)]
pub struct ScryptKdf<H: HmacFunction = HmacSha256> {
    hmac: H,
}

impl Default for ScryptKdf {
    /// HMAC-SHA256, as in RFC 7914.
    fn default() -> Self {
        Self::new(HmacSha256)
    }
}

impl<H: HmacFunction> ScryptKdf<H> {
    pub fn new(hmac: H) -> Self {
        Self { hmac }
    }

    pub fn hmac(&self) -> &H {
        &self.hmac
    }

    /// The mixed lanes `B'` used as salt by the final PBKDF2 pass.
    ///
    /// Useful for callers layering their own second stretch. The returned
    /// buffer is `p * 128 * r` bytes and zeroised on drop.
    pub fn effective_salt(
        &self,
        password: &[u8],
        salt: &[u8],
        params: &ScryptParams,
    ) -> Result<Zeroizing<Vec<u8>>, KdfError> {
        params.validate(self.hmac.output_len())?;

        let len = params.lane_bytes() as usize * params.parallelism as usize;
        log::debug!(
            "scrypt: stretching into {} bytes (N = {}, r = {}, p = {})",
            len,
            params.cost,
            params.block_size,
            params.parallelism
        );

        let mut b = Zeroizing::new(Vec::new());
        b.try_reserve_exact(len).map_err(|e| {
            KdfError::ResourceExhausted(format!("cannot allocate {} bytes: {}", len, e))
        })?;
        b.resize(len, 0);
        pbkdf2::compute_key(&self.hmac, password, salt, 1, &mut b)?;

        let mut words = SecretWords::new(len / 4)?;
        for (word, chunk) in words.iter_mut().zip(b.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        run_lanes(&mut words, params)?;

        for (chunk, word) in b.chunks_exact_mut(4).zip(words.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Ok(b)
    }

    /// Derive exactly `output.len()` bytes into `output`.
    ///
    /// Parameters and output length are checked before any work is done.
    pub fn compute_key(
        &self,
        password: &[u8],
        salt: &[u8],
        params: &ScryptParams,
        output: &mut [u8],
    ) -> Result<(), KdfError> {
        self.check_output_len(output.len())?;

        let b = self.effective_salt(password, salt, params)?;
        pbkdf2::compute_key(&self.hmac, password, &b, 1, output)
    }

    /// Derive `len` bytes into a buffer that is zeroised on drop.
    ///
    /// Parameters and `len` are validated before the output buffer is
    /// allocated, and an allocation failure is reported as
    /// [`KdfError::ResourceExhausted`].
    pub fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        params: &ScryptParams,
        len: usize,
    ) -> Result<Zeroizing<Vec<u8>>, KdfError> {
        params.validate(self.hmac.output_len())?;
        self.check_output_len(len)?;

        let mut output = Zeroizing::new(Vec::new());
        output.try_reserve_exact(len).map_err(|e| {
            KdfError::ResourceExhausted(format!("cannot allocate {} output bytes: {}", len, e))
        })?;
        output.resize(len, 0);
        self.compute_key(password, salt, params, &mut output)?;
        Ok(output)
    }

    fn check_output_len(&self, len: usize) -> Result<(), KdfError> {
        let limit = pbkdf2_max_len(self.hmac.output_len());
        if len as u64 > limit {
            return Err(KdfError::InvalidParameter(format!(
                "output of {} bytes exceeds the maximum of {}",
                len, limit
            )));
        }
        Ok(())
    }
}

impl<H: HmacFunction + Clone> ScryptKdf<H> {
    /// Open the derived key as a seekable stream, positioned at 0.
    pub fn stream(
        &self,
        password: &[u8],
        salt: &[u8],
        params: &ScryptParams,
    ) -> Result<Pbkdf2Stream<H>, KdfError> {
        let b = self.effective_salt(password, salt, params)?;
        Pbkdf2Stream::new(self.hmac.clone(), password, &b, 1)
    }
}

/// scrypt with HMAC-SHA256, returning `output_len` bytes.
pub fn compute_key(
    password: &[u8],
    salt: &[u8],
    cost: u32,
    block_size: u32,
    parallelism: u32,
    max_threads: usize,
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>, KdfError> {
    let params = ScryptParams::new(cost, block_size, parallelism).with_max_threads(max_threads);
    ScryptKdf::new(HmacSha256).derive(password, salt, &params, output_len)
}

/// The post-mixing salt of scrypt with HMAC-SHA256.
pub fn effective_salt(
    password: &[u8],
    salt: &[u8],
    cost: u32,
    block_size: u32,
    parallelism: u32,
    max_threads: usize,
) -> Result<Zeroizing<Vec<u8>>, KdfError> {
    let params = ScryptParams::new(cost, block_size, parallelism).with_max_threads(max_threads);
    ScryptKdf::new(HmacSha256).effective_salt(password, salt, &params)
}
