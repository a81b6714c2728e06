//! Hardening for memory that holds key material
//!
//! - [`disable_core_dumps`] sets `RLIMIT_CORE` to zero so a crash cannot
//!   write passwords or derived keys to disk.
//! - [`SecretWords`] carries the scrypt working state (lanes, the `V` table,
//!   BlockMix temporaries). It is allocated fallibly, can be pinned with
//!   `mlock(2)`, and is zeroised on drop.
//!
//! Both are best-effort. Containers and unprivileged users often have a tiny
//! `RLIMIT_MEMLOCK`; a refused lock is logged and the derivation carries on.
//! On non-unix targets locking and core-dump control are unavailable.

use crate::KdfError;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use zeroize::Zeroize;

static CORE_DUMPS_OFF: AtomicBool = AtomicBool::new(false);

/// Turn off core dumps for this process.
///
/// Call before reading any passphrase. Returns `true` once core dumps are
/// off; later calls return `true` without touching the limit again.
///
/// ```
/// btcaddr_kdf::memory::disable_core_dumps();
/// ```
pub fn disable_core_dumps() -> bool {
    if CORE_DUMPS_OFF.swap(true, Ordering::SeqCst) {
        return true;
    }

    let ok = os::zero_core_limit();
    if !ok {
        CORE_DUMPS_OFF.store(false, Ordering::SeqCst);
    }
    ok
}

/// A zero-filled `u32` buffer that is zeroised on drop and optionally
/// `mlock`ed for its whole lifetime.
///
/// The buffer never reallocates, so the locked region stays valid until
/// drop.
pub struct SecretWords {
    data: Vec<u32>,
    locked: bool,
}

impl SecretWords {
    /// Allocate `len` zeroed words without locking them.
    pub fn new(len: usize) -> Result<Self, KdfError> {
        Self::allocate(len, false)
    }

    /// Allocate `len` zeroed words, locking them in memory if `lock` is set.
    ///
    /// Allocation failure is reported as [`KdfError::ResourceExhausted`]
    /// instead of aborting the process. A failed `mlock` only logs a warning.
    pub fn allocate(len: usize, lock: bool) -> Result<Self, KdfError> {
        let mut data: Vec<u32> = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            KdfError::ResourceExhausted(format!(
                "cannot allocate {} bytes of working memory: {}",
                len.saturating_mul(4),
                e
            ))
        })?;
        data.resize(len, 0);

        let mut words = Self { data, locked: false };
        if lock && !words.data.is_empty() {
            words.locked = os::lock(&words.data);
            if !words.locked {
                log::warn!(
                    "could not mlock {} bytes of scrypt state; it may be swapped out",
                    words.byte_len()
                );
            }
        }
        Ok(words)
    }

    /// Whether `mlock` succeeded for this buffer.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn byte_len(&self) -> usize {
        std::mem::size_of_val(self.data.as_slice())
    }
}

impl Deref for SecretWords {
    type Target = [u32];

    fn deref(&self) -> &[u32] {
        &self.data
    }
}

impl DerefMut for SecretWords {
    fn deref_mut(&mut self) -> &mut [u32] {
        &mut self.data
    }
}

impl Drop for SecretWords {
    fn drop(&mut self) {
        // Wipe the slice, not the Vec: the unlock below needs the length.
        self.data.as_mut_slice().zeroize();
        if self.locked {
            os::unlock(&self.data);
        }
    }
}

#[cfg(unix)]
mod os {
    pub fn zero_core_limit() -> bool {
        let limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: `limit` is a valid rlimit for the duration of the call.
        if unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) } != 0 {
            log::warn!(
                "failed to disable core dumps: {}",
                std::io::Error::last_os_error()
            );
            return false;
        }
        true
    }

    pub fn lock(words: &[u32]) -> bool {
        let len = std::mem::size_of_val(words);
        // SAFETY: the slice is a live allocation of `len` bytes.
        if unsafe { libc::mlock(words.as_ptr().cast(), len) } != 0 {
            log::debug!("mlock({}) failed: {}", len, std::io::Error::last_os_error());
            return false;
        }
        true
    }

    pub fn unlock(words: &[u32]) {
        // SAFETY: same region that `lock` pinned; it is still allocated.
        unsafe {
            libc::munlock(words.as_ptr().cast(), std::mem::size_of_val(words));
        }
    }
}

#[cfg(not(unix))]
mod os {
    pub fn zero_core_limit() -> bool {
        log::warn!("core dumps cannot be disabled on this platform");
        false
    }

    pub fn lock(_words: &[u32]) -> bool {
        false
    }

    pub fn unlock(_words: &[u32]) {}
}
