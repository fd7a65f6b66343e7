//! Common processing utilities shared between both batch drivers

use std::fmt;
use std::path::Path;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array1;
use crate::audio::{resample_channel, AudioConverter, MonoStrategy, WavAudio};
use crate::error::Result;

/// Load a WAV file as mono at `sample_rate`.
///
/// Channels are folded first, so only the mono signal is resampled.
pub fn load_mono<P: AsRef<Path>>(path: P, sample_rate: u32, strategy: MonoStrategy) -> Result<Array1<f32>> {
    let audio = WavAudio::from_file(path)?;
    log::debug!(
        "Audio: {:.2}s, {}Hz, {}ch, {}",
        audio.duration(),
        audio.sample_rate(),
        audio.channels(),
        audio.format().name()
    );

    let mono = AudioConverter::to_mono(audio.data(), strategy);
    if audio.sample_rate() == sample_rate {
        return Ok(mono);
    }
    let resampled = resample_channel(&mono.into_raw_vec(), audio.sample_rate(), sample_rate)?;
    Ok(Array1::from(resampled))
}

/// Aggregate counts over one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl BatchStats {
    pub fn new(total: usize) -> Self {
        Self { total, ..Default::default() }
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total files: {}", self.total)?;
        writeln!(f, "Processed: {}", self.processed)?;
        writeln!(f, "Skipped: {}", self.skipped)?;
        write!(f, "Errors: {}", self.errors)
    }
}

/// Bar over `len` files; hidden when `len` is zero.
pub fn file_progress(len: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message);
    pb
}
