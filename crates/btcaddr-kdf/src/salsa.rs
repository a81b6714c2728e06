//! Salsa20 core permutation
//!
//! The hash function from <https://cr.yp.to/salsa20.html>: a fixed number of
//! add-rotate-xor double rounds over a 16-word state, followed by a
//! word-wise feed-forward of the input. scrypt uses the 8-round variant.

use crate::KdfError;

/// Number of 32-bit words in a Salsa20 state.
pub const STATE_WORDS: usize = 16;

/// A Salsa20 state.
pub type State = [u32; STATE_WORDS];

/// Round count for the Salsa20 core: even, between 2 and 20.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rounds(u32);

impl Rounds {
    /// Salsa20/8, the variant used by scrypt's BlockMix.
    pub const SALSA20_8: Rounds = Rounds(8);
    /// Salsa20/12.
    pub const SALSA20_12: Rounds = Rounds(12);
    /// Full Salsa20/20.
    pub const SALSA20_20: Rounds = Rounds(20);

    pub fn new(rounds: u32) -> Result<Self, KdfError> {
        if !(2..=20).contains(&rounds) || rounds % 2 != 0 {
            return Err(KdfError::InvalidParameter(format!(
                "salsa20 round count must be even and within 2..=20, got {}",
                rounds
            )));
        }
        Ok(Self(rounds))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Rounds {
    fn default() -> Self {
        Self::SALSA20_8
    }
}

#[inline(always)]
fn quarter_round(x: &mut State, a: usize, b: usize, c: usize, d: usize) {
    x[b] ^= x[a].wrapping_add(x[d]).rotate_left(7);
    x[c] ^= x[b].wrapping_add(x[a]).rotate_left(9);
    x[d] ^= x[c].wrapping_add(x[b]).rotate_left(13);
    x[a] ^= x[d].wrapping_add(x[c]).rotate_left(18);
}

/// Permute `state` in place: `state = state + doubleround^(rounds/2)(state)`.
///
/// Works on a private copy of the input, so this is the entry point to use
/// when input and output are the same buffer.
#[inline]
pub fn salsa20_core_in_place(rounds: Rounds, state: &mut State) {
    let input = *state;
    let mut x = input;

    for _ in 0..rounds.0 / 2 {
        // columns
        quarter_round(&mut x, 0, 4, 8, 12);
        quarter_round(&mut x, 5, 9, 13, 1);
        quarter_round(&mut x, 10, 14, 2, 6);
        quarter_round(&mut x, 15, 3, 7, 11);
        // rows
        quarter_round(&mut x, 0, 1, 2, 3);
        quarter_round(&mut x, 5, 6, 7, 4);
        quarter_round(&mut x, 10, 11, 8, 9);
        quarter_round(&mut x, 15, 12, 13, 14);
    }

    for (out, (&mixed, &orig)) in state.iter_mut().zip(x.iter().zip(input.iter())) {
        *out = mixed.wrapping_add(orig);
    }
}

/// Permute `input` into `output`.
#[inline]
pub fn salsa20_core(rounds: Rounds, input: &State, output: &mut State) {
    *output = *input;
    salsa20_core_in_place(rounds, output);
}

/// Salsa20/8 core, in place.
#[inline]
pub fn salsa20_8(state: &mut State) {
    salsa20_core_in_place(Rounds::SALSA20_8, state);
}

/// Load a Salsa20 state from 64 little-endian bytes.
pub fn state_from_le_bytes(bytes: &[u8; 64]) -> State {
    let mut state = [0u32; STATE_WORDS];
    for (word, chunk) in state.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    state
}

/// Store a Salsa20 state as 64 little-endian bytes.
pub fn state_to_le_bytes(state: &State) -> [u8; 64] {
    let mut bytes = [0u8; 64];
    for (chunk, word) in bytes.chunks_exact_mut(4).zip(state.iter()) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    bytes
}
