//! btcaddr KDF
//!
//! Password-based key derivation for btcaddr: scrypt (RFC 7914) built from
//! PBKDF2-HMAC and the Salsa20/8 core, exposed as a seekable stream of
//! derived key material.
//!
//! # Pipeline
//!
//! 1. PBKDF2 (one iteration) stretches password + salt into `p` lanes of
//!    `128 * r` bytes.
//! 2. Each lane is mixed by SMix (`N` BlockMix steps filling a scratch
//!    table, then `N` data-dependent lookups), lanes spread over a bounded
//!    worker pool.
//! 3. The mixed lanes become the salt of a second single-iteration PBKDF2
//!    pass, read lazily through [`Pbkdf2Stream`].
//!
//! # Example
//!
//! ```
//! use btcaddr_kdf::{ScryptKdf, ScryptParams};
//!
//! let kdf = ScryptKdf::default();
//! let params = ScryptParams::new(16, 1, 1);
//! let key = kdf.derive(b"", b"", &params, 64).unwrap();
//! assert_eq!(key[0], 0x77);
//! ```
//!
//! # Secret handling
//!
//! Every buffer holding key material (password copies, salt buffers,
//! PBKDF2 accumulators, lane state, scratch tables) is zeroised when it goes
//! out of scope, on error paths included.

pub mod batch;
pub mod block_mix;
pub mod engine;
pub mod kdf;
pub mod mac;
pub mod memory;
pub mod params;
pub mod pbkdf2;
pub mod salsa;
pub mod smix;

pub use batch::{CancelToken, DerivationJob};
pub use kdf::{compute_key, effective_salt, ScryptKdf};
pub use mac::{HmacFunction, HmacSha256, HmacSha512};
pub use params::ScryptParams;
pub use pbkdf2::Pbkdf2Stream;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KdfError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
    #[error("Derivation cancelled")]
    Cancelled,
}

impl From<KdfError> for std::io::Error {
    fn from(err: KdfError) -> Self {
        let kind = match err {
            KdfError::InvalidParameter(_) => std::io::ErrorKind::InvalidInput,
            KdfError::ResourceExhausted(_) => std::io::ErrorKind::OutOfMemory,
            KdfError::UnsupportedOperation(_) => std::io::ErrorKind::Unsupported,
            KdfError::Cancelled => std::io::ErrorKind::Interrupted,
        };
        std::io::Error::new(kind, err)
    }
}
