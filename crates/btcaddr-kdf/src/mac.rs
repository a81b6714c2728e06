//! HMAC strategies for PBKDF2
//!
//! The KDF never picks a hash on its own: callers hand it an
//! [`HmacFunction`], defaulting to [`HmacSha256`] through
//! `ScryptKdf::default()`.

use crate::KdfError;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use zeroize::Zeroize;

/// A keyed MAC `(key, message) -> tag` with a fixed tag length.
pub trait HmacFunction: Send + Sync {
    /// Length of every tag in bytes.
    fn output_len(&self) -> usize;

    /// Write `MAC(key, message)` into `output`, which must be exactly
    /// [`output_len`](Self::output_len) bytes.
    fn compute(&self, key: &[u8], message: &[u8], output: &mut [u8]) -> Result<(), KdfError>;
}

impl<T: HmacFunction + ?Sized> HmacFunction for &T {
    fn output_len(&self) -> usize {
        (**self).output_len()
    }

    fn compute(&self, key: &[u8], message: &[u8], output: &mut [u8]) -> Result<(), KdfError> {
        (**self).compute(key, message, output)
    }
}

fn check_output(output: &[u8], expected: usize) -> Result<(), KdfError> {
    if output.len() != expected {
        return Err(KdfError::InvalidParameter(format!(
            "HMAC output buffer is {} bytes, expected {}",
            output.len(),
            expected
        )));
    }
    Ok(())
}

/// HMAC-SHA256, 32-byte tags. The scrypt default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HmacSha256;

impl HmacFunction for HmacSha256 {
    fn output_len(&self) -> usize {
        32
    }

    fn compute(&self, key: &[u8], message: &[u8], output: &mut [u8]) -> Result<(), KdfError> {
        check_output(output, 32)?;
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
            .map_err(|e| KdfError::InvalidParameter(format!("HMAC key: {}", e)))?;
        mac.update(message);
        let mut tag = mac.finalize().into_bytes();
        output.copy_from_slice(&tag);
        tag.as_mut_slice().zeroize();
        Ok(())
    }
}

/// HMAC-SHA512, 64-byte tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HmacSha512;

impl HmacFunction for HmacSha512 {
    fn output_len(&self) -> usize {
        64
    }

    fn compute(&self, key: &[u8], message: &[u8], output: &mut [u8]) -> Result<(), KdfError> {
        check_output(output, 64)?;
        let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(key)
            .map_err(|e| KdfError::InvalidParameter(format!("HMAC key: {}", e)))?;
        mac.update(message);
        let mut tag = mac.finalize().into_bytes();
        output.copy_from_slice(&tag);
        tag.as_mut_slice().zeroize();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 4231 test case 2.
    #[test]
    fn test_hmac_sha256_rfc4231() {
        let mut out = [0u8; 32];
        HmacSha256
            .compute(b"Jefe", b"what do ya want for nothing?", &mut out)
            .unwrap();
        assert_eq!(
            hex::encode(out),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    /// RFC 4231 test case 2.
    #[test]
    fn test_hmac_sha512_rfc4231() {
        let mut out = [0u8; 64];
        HmacSha512
            .compute(b"Jefe", b"what do ya want for nothing?", &mut out)
            .unwrap();
        assert_eq!(
            hex::encode(out),
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
             9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn test_wrong_output_length_rejected() {
        let mut out = [0u8; 31];
        let err = HmacSha256.compute(b"k", b"m", &mut out).unwrap_err();
        assert!(matches!(err, KdfError::InvalidParameter(_)));
    }

    #[test]
    fn test_reference_forwards() {
        let strategy: &dyn HmacFunction = &HmacSha512;
        assert_eq!((&strategy).output_len(), 64);
        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        (&strategy).compute(b"key", b"msg", &mut a).unwrap();
        HmacSha512.compute(b"key", b"msg", &mut b).unwrap();
        assert_eq!(a, b);
    }
}
