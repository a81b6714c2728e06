#![no_main]

use btcaddr_kdf::{KdfError, ScryptParams};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary parameter triples must be classified without panicking.
    if data.len() < 13 {
        return;
    }
    let word = |i: usize| u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
    let params = ScryptParams::new(word(0), word(4), word(8)).with_max_threads(data[12] as usize);

    match params.validate(32) {
        Ok(()) => assert!(params.cost.is_power_of_two()),
        Err(KdfError::InvalidParameter(_)) | Err(KdfError::ResourceExhausted(_)) => {}
        Err(other) => panic!("unexpected error class: {:?}", other),
    }
});
