//! Parallel SMix over `p` lanes
//!
//! A rayon pool of `min(available_parallelism, max_threads, p)` threads is
//! built for one derivation and dropped once every lane is done. Lane `i`
//! owns words `[i * lane_len, (i + 1) * lane_len)` of the buffer, handed out
//! as disjoint `chunks_exact_mut` slices, so the buffer needs no lock. The
//! result does not depend on how many workers run or in which order lanes
//! are taken.

use crate::params::ScryptParams;
use crate::smix::smix;
use crate::KdfError;
use rayon::prelude::*;
use std::num::NonZeroUsize;

/// Number of workers for `lanes` lanes under `max_threads`.
pub fn worker_count(lanes: usize, max_threads: usize) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    cpus.min(max_threads).min(lanes).max(1)
}

/// Run SMix on every lane of `buffer` in place.
///
/// `buffer` holds `params.parallelism` lanes of `32 * r` words. The call
/// returns once every started lane has finished. If a lane fails (its
/// scratch table cannot be allocated), lanes not yet started are skipped
/// and an error is returned.
pub fn run_lanes(buffer: &mut [u32], params: &ScryptParams) -> Result<(), KdfError> {
    let lane_words = params.lane_words();
    let lanes = params.parallelism as usize;
    if buffer.len() != lane_words * lanes {
        return Err(KdfError::InvalidParameter(format!(
            "buffer holds {} words, expected {} lanes of {}",
            buffer.len(),
            lanes,
            lane_words
        )));
    }

    let workers = worker_count(lanes, params.max_threads);
    log::debug!(
        "scrypt: {} lanes of {} bytes, N = {}, {} bytes of scratch per lane, {} workers",
        lanes,
        params.lane_bytes(),
        params.cost,
        params.scratch_bytes(),
        workers
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("scrypt-lane ({i})"))
        .build()
        .map_err(|e| {
            KdfError::ResourceExhausted(format!("cannot start {} scrypt workers: {}", workers, e))
        })?;

    let r = params.block_size as usize;
    pool.install(|| {
        buffer
            .par_chunks_exact_mut(lane_words)
            .enumerate()
            .try_for_each(|(index, lane)| {
                log::trace!("scrypt: mixing lane {}", index);
                smix(lane, params.cost, r, params.lock_memory)
            })
    })
}
