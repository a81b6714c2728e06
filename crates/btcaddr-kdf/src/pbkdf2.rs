//! PBKDF2 as a seekable stream
//!
//! [`Pbkdf2Stream`] is a read-only cursor over the PBKDF2 output
//! `T_1 ‖ T_2 ‖ …` with
//!
//! ```text
//! U_1 = HMAC(key, salt ‖ be32(i))
//! U_k = HMAC(key, U_{k-1})
//! T_i = U_1 ^ U_2 ^ … ^ U_iterations
//! ```
//!
//! Only the block under the cursor is kept; it is recomputed whenever the
//! cursor leaves it. Block indices are 1-based 32-bit integers, so the
//! stream ends after `hLen * (2^32 - 1)` bytes.

use crate::mac::HmacFunction;
use crate::params::pbkdf2_max_len;
use crate::KdfError;
use std::io::SeekFrom;
use zeroize::{Zeroize, Zeroizing};

/// Lazily computed, seekable PBKDF2 output.
///
/// Key and salt are copied in at construction and zeroised on
/// [`reopen`](Self::reopen), [`close`](Self::close) and drop.
pub struct Pbkdf2Stream<H: HmacFunction> {
    hmac: H,
    key: Zeroizing<Vec<u8>>,
    /// `salt ‖ be32(block index)`
    salt_buf: Zeroizing<Vec<u8>>,
    iterations: u32,
    block: Zeroizing<Vec<u8>>,
    u: Zeroizing<Vec<u8>>,
    u_next: Zeroizing<Vec<u8>>,
    /// Index of the block currently held in `block`, if any.
    cached: Option<u32>,
    position: u64,
}

impl<H: HmacFunction> Pbkdf2Stream<H> {
    /// Open a stream over `PBKDF2(hmac, key, salt, iterations)`.
    pub fn new(hmac: H, key: &[u8], salt: &[u8], iterations: u32) -> Result<Self, KdfError> {
        let hmac_len = hmac.output_len();
        if hmac_len == 0 {
            return Err(KdfError::InvalidParameter(
                "HMAC output length must be at least 1".to_string(),
            ));
        }

        let mut stream = Self {
            hmac,
            key: Zeroizing::new(Vec::new()),
            salt_buf: Zeroizing::new(Vec::new()),
            iterations: 1,
            block: Zeroizing::new(vec![0u8; hmac_len]),
            u: Zeroizing::new(vec![0u8; hmac_len]),
            u_next: Zeroizing::new(vec![0u8; hmac_len]),
            cached: None,
            position: 0,
        };
        stream.reopen(key, salt, iterations)?;
        Ok(stream)
    }

    /// Re-key the stream and rewind it to position 0.
    ///
    /// Parameters are checked first; on error the stream is left as it
    /// was. Otherwise all previous secret state is zeroised before the new
    /// key and salt are copied in.
    pub fn reopen(&mut self, key: &[u8], salt: &[u8], iterations: u32) -> Result<(), KdfError> {
        if iterations == 0 {
            return Err(KdfError::InvalidParameter(
                "iterations must be at least 1".to_string(),
            ));
        }

        self.wipe();

        self.key.extend_from_slice(key);
        self.salt_buf.reserve_exact(salt.len() + 4);
        self.salt_buf.extend_from_slice(salt);
        self.salt_buf.extend_from_slice(&[0u8; 4]);
        self.iterations = iterations;
        Ok(())
    }

    /// Zeroise key, salt and cached block, and drop the stream.
    pub fn close(mut self) {
        self.wipe();
    }

    fn wipe(&mut self) {
        self.key.zeroize();
        self.salt_buf.zeroize();
        self.block.as_mut_slice().zeroize();
        self.u.as_mut_slice().zeroize();
        self.u_next.as_mut_slice().zeroize();
        self.cached = None;
        self.position = 0;
    }

    /// HMAC tag length, which is also the PBKDF2 block length.
    pub fn block_len(&self) -> usize {
        self.block.len()
    }

    /// Logical length of the stream: `hLen * (2^32 - 1)` bytes.
    pub fn logical_len(&self) -> u64 {
        pbkdf2_max_len(self.block_len())
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// 1-based index of the PBKDF2 block containing byte `position`.
    pub fn block_index(&self, position: u64) -> u64 {
        position / self.block_len() as u64 + 1
    }

    fn compute_block(&mut self, index: u32) -> Result<(), KdfError> {
        let salt_len = self.salt_buf.len() - 4;
        self.salt_buf[salt_len..].copy_from_slice(&index.to_be_bytes());

        let result = self.iterate_block();

        self.u.as_mut_slice().zeroize();
        self.u_next.as_mut_slice().zeroize();
        if result.is_err() {
            self.block.as_mut_slice().zeroize();
        }
        result
    }

    fn iterate_block(&mut self) -> Result<(), KdfError> {
        self.hmac.compute(&self.key, &self.salt_buf, &mut self.u)?;
        self.block.copy_from_slice(&self.u);

        for _ in 1..self.iterations {
            self.hmac.compute(&self.key, &self.u, &mut self.u_next)?;
            std::mem::swap(&mut self.u, &mut self.u_next);
            for (t, u) in self.block.iter_mut().zip(self.u.iter()) {
                *t ^= u;
            }
        }
        Ok(())
    }

    /// Read up to `buf.len()` bytes from the cursor.
    ///
    /// Returns fewer bytes only when the logical end of the stream is
    /// reached; reading at or past the end returns 0.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, KdfError> {
        let hmac_len = self.block_len() as u64;
        let end = self.logical_len();
        let mut written = 0;

        while written < buf.len() && self.position < end {
            // position < hLen * (2^32 - 1), so the index fits in a u32
            let index = (self.position / hmac_len + 1) as u32;
            if self.cached != Some(index) {
                self.cached = None;
                log::trace!("pbkdf2: computing block {}", index);
                self.compute_block(index)?;
                self.cached = Some(index);
            }

            let offset = (self.position % hmac_len) as usize;
            let count = (self.block.len() - offset).min(buf.len() - written);
            buf[written..written + count].copy_from_slice(&self.block[offset..offset + count]);
            written += count;
            self.position += count as u64;
        }

        Ok(written)
    }

    /// Fill `output` completely, failing if the stream ends first.
    pub fn fill(&mut self, output: &mut [u8]) -> Result<(), KdfError> {
        let available = self.logical_len().saturating_sub(self.position);
        if output.len() as u64 > available {
            return Err(KdfError::InvalidParameter(format!(
                "can only return {} more bytes, {} requested",
                available,
                output.len()
            )));
        }
        let read = self.read(output)?;
        debug_assert_eq!(read, output.len());
        Ok(())
    }

    /// Move the cursor. Positions past the end are allowed; negative ones
    /// are not.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, KdfError> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => self.logical_len().checked_add_signed(delta),
        };

        let target = target.ok_or_else(|| {
            KdfError::InvalidParameter(format!(
                "seek {:?} from position {} leaves the stream",
                pos, self.position
            ))
        })?;
        self.position = target;
        Ok(target)
    }

    /// The derived-key stream has a fixed logical length.
    pub fn set_len(&mut self, _len: u64) -> Result<(), KdfError> {
        Err(KdfError::UnsupportedOperation("set_len on a derived-key stream"))
    }
}

impl<H: HmacFunction> Drop for Pbkdf2Stream<H> {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl<H: HmacFunction> std::fmt::Debug for Pbkdf2Stream<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pbkdf2Stream")
            .field("block_len", &self.block_len())
            .field("iterations", &self.iterations)
            .field("cached", &self.cached)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl<H: HmacFunction> std::io::Read for Pbkdf2Stream<H> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Pbkdf2Stream::read(self, buf).map_err(std::io::Error::from)
    }
}

impl<H: HmacFunction> std::io::Seek for Pbkdf2Stream<H> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        Pbkdf2Stream::seek(self, pos).map_err(std::io::Error::from)
    }
}

impl<H: HmacFunction> std::io::Write for Pbkdf2Stream<H> {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(KdfError::UnsupportedOperation("write to a derived-key stream").into())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// One-shot PBKDF2: fill `output` from a fresh stream.
pub fn compute_key<H: HmacFunction>(
    hmac: H,
    key: &[u8],
    salt: &[u8],
    iterations: u32,
    output: &mut [u8],
) -> Result<(), KdfError> {
    let limit = pbkdf2_max_len(hmac.output_len());
    if output.len() as u64 > limit {
        return Err(KdfError::InvalidParameter(format!(
            "PBKDF2 output of {} bytes exceeds the maximum of {}",
            output.len(),
            limit
        )));
    }
    let mut stream = Pbkdf2Stream::new(hmac, key, salt, iterations)?;
    stream.fill(output)
}
