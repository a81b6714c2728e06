//! Cancellable batch derivation
//!
//! Key generation often runs many scrypt derivations back to back. A batch
//! can be stopped through a [`CancelToken`], but only between derivations:
//! a derivation that has started always runs to completion.

use crate::kdf::ScryptKdf;
use crate::mac::HmacFunction;
use crate::params::ScryptParams;
use crate::KdfError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Shared stop flag for a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the batch stop before its next derivation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One derivation in a batch.
pub struct DerivationJob {
    pub password: Zeroizing<Vec<u8>>,
    pub salt: Vec<u8>,
    pub params: ScryptParams,
}

impl DerivationJob {
    pub fn new(password: &[u8], salt: &[u8], params: ScryptParams) -> Self {
        Self {
            password: Zeroizing::new(password.to_vec()),
            salt: salt.to_vec(),
            params,
        }
    }
}

impl<H: HmacFunction> ScryptKdf<H> {
    /// Derive `output_len` bytes for each job in order, handing every key to
    /// `on_key` together with its job index.
    ///
    /// All jobs are validated before the first derivation starts. Returns
    /// the number of keys produced, or [`KdfError::Cancelled`] if `cancel`
    /// was triggered before the batch finished.
    pub fn derive_batch<I, F>(
        &self,
        jobs: I,
        output_len: usize,
        cancel: &CancelToken,
        mut on_key: F,
    ) -> Result<usize, KdfError>
    where
        I: IntoIterator<Item = DerivationJob>,
        F: FnMut(usize, &[u8]),
    {
        let jobs: Vec<DerivationJob> = jobs.into_iter().collect();
        for job in &jobs {
            job.params.validate(self.hmac().output_len())?;
        }

        for (index, job) in jobs.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("batch cancelled after {} of {} derivations", index, jobs.len());
                return Err(KdfError::Cancelled);
            }
            let key = self.derive(&job.password, &job.salt, &job.params, output_len)?;
            on_key(index, &key);
        }

        Ok(jobs.len())
    }
}
