//! scrypt SMix (ROMix over BlockMix)
//!
//! One lane of the memory-hard mix. Phase one fills a table `V` of `N`
//! successive BlockMix states; phase two walks `V` `N` times at indices
//! taken from the running state. Both phases are strictly sequential.

use crate::block_mix::{block_mix, block_words};
use crate::memory::SecretWords;
use crate::salsa::STATE_WORDS;
use crate::KdfError;

/// Mix one lane in place.
///
/// `lane` holds `32 * r` words. `n` must be a power of two (checked by
/// [`ScryptParams::validate`](crate::ScryptParams::validate)). The scratch
/// table and both working blocks are zeroised when this returns, whether it
/// succeeds or not.
pub fn smix(lane: &mut [u32], n: u32, r: usize, lock_memory: bool) -> Result<(), KdfError> {
    let words = block_words(r);
    if lane.len() != words {
        return Err(KdfError::InvalidParameter(format!(
            "lane holds {} words, expected {} for r = {}",
            lane.len(),
            words,
            r
        )));
    }
    if n == 0 || !n.is_power_of_two() {
        return Err(KdfError::InvalidParameter(format!(
            "cost must be a positive power of two, got {}",
            n
        )));
    }

    let table_len = words.checked_mul(n as usize).ok_or_else(|| {
        KdfError::ResourceExhausted(format!(
            "scratch table of {} blocks of {} bytes is not addressable",
            n,
            words * 4
        ))
    })?;

    let mut v = SecretWords::allocate(table_len, lock_memory)?;
    let mut x = SecretWords::new(words)?;
    let mut t = SecretWords::new(words)?;

    x.copy_from_slice(lane);

    // V[i] = X; X = BlockMix(X)
    for slot in v.chunks_exact_mut(words) {
        slot.copy_from_slice(&x);
        block_mix(slot, &mut x, r);
    }

    // j = Integerify(X) mod N; X = BlockMix(X ^ V[j])
    let mask = n - 1;
    let last = words - STATE_WORDS;
    for _ in 0..n {
        let j = (x[last] & mask) as usize;
        let vj = &v[j * words..(j + 1) * words];
        for ((tw, &xw), &vw) in t.iter_mut().zip(x.iter()).zip(vj) {
            *tw = xw ^ vw;
        }
        block_mix(&t, &mut x, r);
    }

    lane.copy_from_slice(&x);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane(r: usize, seed: u32) -> Vec<u32> {
        (0..block_words(r) as u32)
            .map(|i| i.wrapping_mul(2_654_435_761).wrapping_add(seed))
            .collect()
    }

    /// Straightforward ROMix with an owned table, for comparison.
    fn reference_romix(b: &[u32], n: usize, r: usize) -> Vec<u32> {
        let words = block_words(r);
        let mut x = b.to_vec();
        let mut v = Vec::with_capacity(n);
        for _ in 0..n {
            v.push(x.clone());
            let mut out = vec![0u32; words];
            block_mix(&x, &mut out, r);
            x = out;
        }
        for _ in 0..n {
            let j = (x[words - 16] as usize) % n;
            let mixed: Vec<u32> = x.iter().zip(&v[j]).map(|(a, b)| a ^ b).collect();
            let mut out = vec![0u32; words];
            block_mix(&mixed, &mut out, r);
            x = out;
        }
        x
    }

    #[test]
    fn test_matches_reference_romix() {
        for (n, r) in [(1u32, 1usize), (2, 1), (16, 1), (64, 2), (32, 4)] {
            let input = lane(r, n);
            let mut mixed = input.clone();
            smix(&mut mixed, n, r, false).unwrap();
            assert_eq!(mixed, reference_romix(&input, n as usize, r), "n={} r={}", n, r);
        }
    }

    #[test]
    fn test_locked_table_gives_same_result() {
        let input = lane(2, 5);
        let mut plain = input.clone();
        let mut locked = input.clone();
        smix(&mut plain, 128, 2, false).unwrap();
        smix(&mut locked, 128, 2, true).unwrap();
        assert_eq!(plain, locked);
    }

    #[test]
    fn test_cost_changes_output() {
        let input = lane(1, 11);
        let mut a = input.clone();
        let mut b = input.clone();
        smix(&mut a, 16, 1, false).unwrap();
        smix(&mut b, 32, 1, false).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, input);
    }

    #[test]
    fn test_rejects_wrong_lane_length() {
        let mut short = vec![0u32; 31];
        assert!(matches!(
            smix(&mut short, 16, 1, false),
            Err(KdfError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        let mut input = lane(1, 0);
        assert!(matches!(
            smix(&mut input, 3, 1, false),
            Err(KdfError::InvalidParameter(_))
        ));
        assert!(matches!(
            smix(&mut input, 0, 1, false),
            Err(KdfError::InvalidParameter(_))
        ));
    }
}
