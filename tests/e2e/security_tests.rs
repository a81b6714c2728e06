//! Security-specific tests.
//!
//! These tests verify:
//! 1. Invalid parameters fail before any memory is committed
//! 2. Secrets are zeroed after use (flow-level verification)
//! 3. Streams refuse writes and out-of-range cursors without panicking
//! 4. Batches stop between derivations when cancelled
//! 5. Random stream positions never panic

use btcaddr_kdf::memory::SecretWords;
use btcaddr_kdf::{
    CancelToken, DerivationJob, HmacSha256, HmacSha512, KdfError, Pbkdf2Stream, ScryptKdf,
    ScryptParams,
};
use std::io::{SeekFrom, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// 1. Fail-fast validation
// ============================================================================

#[test]
fn test_validation_precedes_allocation() {
    // 128 * 8 * 2^31 * 8 bytes would be 16 TiB; a non-power-of-two cost
    // must be rejected without trying.
    let params = ScryptParams::new((1 << 31) + 1, 8, 8);
    let err = ScryptKdf::default()
        .derive(b"pw", b"salt", &params, 32)
        .unwrap_err();
    assert!(matches!(err, KdfError::InvalidParameter(_)));
}

#[test]
fn test_huge_output_with_bad_params_is_an_error() {
    let err = btcaddr_kdf::compute_key(b"pw", b"salt", 3, 1, 1, 1, usize::MAX).unwrap_err();
    assert!(matches!(err, KdfError::InvalidParameter(_)), "{:?}", err);
}

#[test]
fn test_parallelism_beyond_pbkdf2_range_rejected() {
    // p * 128 * r must fit in one PBKDF2-SHA256 output stream
    let params = ScryptParams::new(2, 1 << 16, 1 << 15);
    let err = params.validate(32).unwrap_err();
    assert!(matches!(err, KdfError::InvalidParameter(_)), "{:?}", err);
}

#[test]
fn test_output_beyond_stream_rejected() {
    let stream = Pbkdf2Stream::new(HmacSha256, b"pw", b"salt", 1).unwrap();
    assert_eq!(stream.logical_len(), 32 * u32::MAX as u64);

    let stream = Pbkdf2Stream::new(HmacSha512, b"pw", b"salt", 1).unwrap();
    assert_eq!(stream.logical_len(), 64 * u32::MAX as u64);
}

#[test]
fn test_zero_iterations_rejected() {
    let err = Pbkdf2Stream::new(HmacSha256, b"pw", b"salt", 0).unwrap_err();
    assert!(matches!(err, KdfError::InvalidParameter(_)));
}

// ============================================================================
// 2. Zeroing flow
// ============================================================================

#[test]
fn test_secret_words_usable_and_locked_flag() {
    let mut words = SecretWords::allocate(1024, true).unwrap();
    assert_eq!(words.len(), 1024);
    assert!(words.iter().all(|&w| w == 0));
    words[0] = 0xdead_beef;
    words[1023] = 1;
    assert_eq!(words[0], 0xdead_beef);
    // mlock may be refused (RLIMIT_MEMLOCK); the buffer is still usable
    let _ = words.is_locked();

    let unlocked = SecretWords::new(16).unwrap();
    assert!(!unlocked.is_locked());
}

#[test]
fn test_secret_words_oversized_allocation_fails_cleanly() {
    let err = SecretWords::new(usize::MAX / 2)
        .err()
        .expect("oversized allocation should fail");
    assert!(matches!(err, KdfError::ResourceExhausted(_)));
}

#[test]
fn test_closed_stream_flow() {
    let mut stream = Pbkdf2Stream::new(HmacSha256, b"pw", b"salt", 1).unwrap();
    let mut first = [0u8; 32];
    stream.fill(&mut first).unwrap();

    // Reopening with other inputs discards the cached block
    stream.reopen(b"other", b"salt", 1).unwrap();
    let mut second = [0u8; 32];
    stream.fill(&mut second).unwrap();
    assert_ne!(first, second);
    assert_eq!(stream.position(), 32);

    stream.close();
}

#[test]
fn test_debug_output_hides_secrets() {
    let stream = Pbkdf2Stream::new(HmacSha256, b"hunter2", b"salt", 1).unwrap();
    let shown = format!("{:?}", stream);
    assert!(!shown.contains("hunter2"));
    assert!(!shown.contains(&hex::encode(b"hunter2")));
}

// ============================================================================
// 3. Stream misuse
// ============================================================================

#[test]
fn test_stream_is_read_only() {
    let mut stream = Pbkdf2Stream::new(HmacSha256, b"pw", b"salt", 1).unwrap();
    let err = stream.write(b"data").unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);

    assert!(matches!(
        stream.set_len(10),
        Err(KdfError::UnsupportedOperation(_))
    ));
}

#[test]
fn test_negative_seek_keeps_position() {
    let mut stream = Pbkdf2Stream::new(HmacSha256, b"pw", b"salt", 1).unwrap();
    stream.seek(SeekFrom::Start(10)).unwrap();
    assert!(stream.seek(SeekFrom::Current(-11)).is_err());
    assert_eq!(stream.position(), 10);
}

#[test]
fn test_read_past_end_returns_zero() {
    let mut stream = Pbkdf2Stream::new(HmacSha256, b"pw", b"salt", 1).unwrap();
    let end = stream.logical_len();
    stream.seek(SeekFrom::Start(end + 100)).unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(stream.read(&mut buf).unwrap(), 0);

    // Straddling the end truncates
    stream.seek(SeekFrom::End(-5)).unwrap();
    assert_eq!(stream.read(&mut buf).unwrap(), 5);
    assert!(stream.fill(&mut buf).is_err());
}

// ============================================================================
// 4. Cancellation
// ============================================================================

fn cheap_jobs(count: usize) -> Vec<DerivationJob> {
    (0..count)
        .map(|i| {
            let password = format!("password {}", i);
            DerivationJob::new(password.as_bytes(), b"salt", ScryptParams::new(64, 1, 2))
        })
        .collect()
}

#[test]
fn test_cancel_from_another_thread() {
    let kdf = ScryptKdf::default();
    let cancel = CancelToken::new();
    let done = Arc::new(AtomicUsize::new(0));

    let handle = {
        let cancel = cancel.clone();
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            kdf.derive_batch(cheap_jobs(10_000), 32, &cancel, |_, key| {
                assert_eq!(key.len(), 32);
                done.fetch_add(1, Ordering::SeqCst);
            })
        })
    };

    while done.load(Ordering::SeqCst) < 3 {
        std::thread::yield_now();
    }
    cancel.cancel();

    let result = handle.join().unwrap();
    assert_eq!(result, Err(KdfError::Cancelled));
    let finished = done.load(Ordering::SeqCst);
    assert!((3..10_000).contains(&finished), "finished {}", finished);
}

#[test]
fn test_uncancelled_batch_completes() {
    let kdf = ScryptKdf::default();
    let mut indices = Vec::new();
    let count = kdf
        .derive_batch(cheap_jobs(4), 16, &CancelToken::new(), |i, _| indices.push(i))
        .unwrap();
    assert_eq!(count, 4);
    assert_eq!(indices, vec![0, 1, 2, 3]);
}

// ============================================================================
// 5. Random positions (should NOT panic)
// ============================================================================

#[test]
fn test_random_positions_do_not_panic() {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut stream = Pbkdf2Stream::new(HmacSha256, b"pw", b"salt", 1).unwrap();
    let end = stream.logical_len();

    for _ in 0..200 {
        let target = match rng.gen_range(0..3) {
            0 => SeekFrom::Start(rng.gen()),
            1 => SeekFrom::Current(rng.gen()),
            _ => SeekFrom::End(rng.gen_range(-(end as i64)..=64)),
        };
        let before = stream.position();
        match stream.seek(target) {
            Ok(pos) => assert_eq!(pos, stream.position()),
            Err(_) => assert_eq!(stream.position(), before),
        }

        let mut buf = vec![0u8; rng.gen_range(0..100)];
        let read = stream.read(&mut buf).unwrap();
        assert!(read <= buf.len());
    }
}
