//! Sample-rate conversion
//!
//! Uses rubato's FFT resampler over whole signals. The output of a signal of
//! `n` samples has `ceil(n * target / source)` samples and is aligned with
//! the input (the resampler delay is trimmed).

use audioadapter_buffers::owned::InterleavedOwned;
use rubato::{Fft, FixedSync, Resampler};
use crate::error::{PrepError, Result};

const CHUNK_SIZE: usize = 1024;
const SUB_CHUNKS: usize = 2;

pub fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Reduce `target / source` to lowest terms as `(up, down)`.
pub fn rational_ratio(source_rate: u32, target_rate: u32) -> (usize, usize) {
    let divisor = gcd(target_rate as u64, source_rate as u64).max(1);
    (
        (target_rate as u64 / divisor) as usize,
        (source_rate as u64 / divisor) as usize,
    )
}

/// Resample one channel from `source_rate` to `target_rate`.
pub fn resample_channel(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == 0 || target_rate == 0 {
        return Err(PrepError::audio(format!(
            "Invalid sample rate: {} -> {}",
            source_rate, target_rate
        )));
    }
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = Fft::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        1,
        FixedSync::Input,
    )
    .map_err(|e| PrepError::audio(format!("Failed to create resampler: {}", e)))?;

    let input_len = samples.len();
    let output_len = resampler.process_all_needed_output_len(input_len);

    let input_buf = InterleavedOwned::new_from(samples.to_vec(), 1, input_len)
        .map_err(|e| PrepError::audio(format!("Failed to create input buffer: {}", e)))?;
    let mut output_buf = InterleavedOwned::new(0.0f32, 1, output_len);

    let (_, written) = resampler
        .process_all_into_buffer(&input_buf, &mut output_buf, input_len, None)
        .map_err(|e| PrepError::audio(format!("Failed to resample audio: {}", e)))?;

    let mut output = output_buf.take_data();
    output.truncate(written);
    Ok(output)
}
