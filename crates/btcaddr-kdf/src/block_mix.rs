//! scrypt BlockMix
//!
//! Mixes `2r` 64-byte sub-blocks with Salsa20/8, chaining each result into
//! the next. Outputs of even sub-blocks land in the first half of the
//! output, odd ones in the second half.

use crate::salsa::{salsa20_8, State, STATE_WORDS};
use zeroize::Zeroize;

/// Words in one scrypt block of parameter `r` (`128 * r` bytes).
#[inline]
pub const fn block_words(r: usize) -> usize {
    2 * r * STATE_WORDS
}

/// BlockMix_{Salsa20/8, r}(input) -> output.
///
/// Both slices hold `2r` sub-blocks of 16 words. `input` and `output` are
/// distinct buffers; callers mixing in place keep a second buffer around.
pub fn block_mix(input: &[u32], output: &mut [u32], r: usize) {
    let len = block_words(r);
    debug_assert_eq!(input.len(), len);
    debug_assert_eq!(output.len(), len);

    let mut x: State = [0u32; STATE_WORDS];
    x.copy_from_slice(&input[len - STATE_WORDS..]);

    for (i, sub_block) in input.chunks_exact(STATE_WORDS).enumerate() {
        for (xw, bw) in x.iter_mut().zip(sub_block) {
            *xw ^= bw;
        }
        salsa20_8(&mut x);

        let dest = if i % 2 == 0 { i / 2 } else { r + i / 2 };
        output[dest * STATE_WORDS..(dest + 1) * STATE_WORDS].copy_from_slice(&x);
    }

    x.zeroize();
}
