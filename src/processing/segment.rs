//! Mel Segmentation Module
//!
//! Cuts a `(n_mels, n_frames)` spectrogram into fixed-width windows.
//! Windows start at `0, step, 2*step, ...` while they fit entirely; with
//! `pad_last` one more window is anchored at `n_frames - win` when the last
//! aligned start misses it, and right-padded with a fill value if the
//! spectrogram is narrower than one window.

use ndarray::{s, Array2, Array3, ArrayView2};
use serde::{Deserialize, Serialize};
use crate::error::{PrepError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Window length in seconds
    pub win_seconds: f64,
    /// Step between window starts in seconds
    pub step_seconds: f64,
    /// Emit a tail window anchored at the end of the spectrogram
    pub pad_last: bool,
    /// dB value written into padded columns
    pub pad_value: f32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            win_seconds: 1.0,
            step_seconds: 0.5,
            pad_last: false,
            pad_value: -80.0,
        }
    }
}

/// Convert a duration to a frame count: `round(seconds * sr / hop)`, at least 1.
///
/// Halfway cases round to even.
pub fn seconds_to_frames(seconds: f64, sample_rate: u32, hop_length: usize) -> usize {
    let frames = (seconds * sample_rate as f64 / hop_length as f64).round_ties_even();
    if frames.is_finite() && frames >= 1.0 { frames as usize } else { 1 }
}

/// Segments of one spectrogram.
#[derive(Debug, Clone)]
pub struct MelSegments {
    /// `(n_segments, n_mels, frames_win)`
    pub chunks: Array3<f32>,
    /// Start frame of each segment
    pub starts: Vec<usize>,
    pub frames_win: usize,
}

impl MelSegments {
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn n_mels(&self) -> usize {
        self.chunks.dim().1
    }

    pub fn segment(&self, index: usize) -> ArrayView2<'_, f32> {
        self.chunks.slice(s![index, .., ..])
    }
}

#[derive(Debug, Clone)]
pub struct MelSegmenter {
    frames_win: usize,
    frames_step: usize,
    pad_last: bool,
    pad_value: f32,
}

impl MelSegmenter {
    pub fn new(frames_win: usize, frames_step: usize, pad_last: bool, pad_value: f32) -> Result<Self> {
        if frames_win == 0 || frames_step == 0 {
            return Err(PrepError::processing("Window and step must be at least one frame"));
        }
        Ok(Self { frames_win, frames_step, pad_last, pad_value })
    }

    pub fn from_config(config: &SegmentConfig, sample_rate: u32, hop_length: usize) -> Result<Self> {
        Self::new(
            seconds_to_frames(config.win_seconds, sample_rate, hop_length),
            seconds_to_frames(config.step_seconds, sample_rate, hop_length),
            config.pad_last,
            config.pad_value,
        )
    }

    pub fn frames_win(&self) -> usize {
        self.frames_win
    }

    pub fn frames_step(&self) -> usize {
        self.frames_step
    }

    /// Start frames in output order.
    pub fn starts(&self, n_frames: usize) -> Vec<usize> {
        let win = self.frames_win;
        let mut starts: Vec<usize> = if n_frames >= win {
            (0..=n_frames - win).step_by(self.frames_step).collect()
        } else {
            Vec::new()
        };

        if self.pad_last && n_frames > 0 {
            let anchor = n_frames.saturating_sub(win);
            let aligned_hits_anchor = starts.last() == Some(&anchor) && n_frames >= win;
            if !aligned_hits_anchor {
                starts.push(anchor);
            }
        }

        starts
    }

    pub fn segment(&self, mel: ArrayView2<'_, f32>) -> MelSegments {
        let (n_mels, n_frames) = mel.dim();
        let win = self.frames_win;
        let starts = self.starts(n_frames);

        let mut chunks = Array3::<f32>::from_elem((starts.len(), n_mels, win), self.pad_value);
        for (i, &start) in starts.iter().enumerate() {
            let end = (start + win).min(n_frames);
            chunks
                .slice_mut(s![i, .., ..end - start])
                .assign(&mel.slice(s![.., start..end]));
        }

        MelSegments { chunks, starts, frames_win: win }
    }
}

/// Segment a full spectrogram with explicit frame counts.
pub fn segment_mel(mel: &Array2<f32>, frames_win: usize, frames_step: usize, pad_last: bool, pad_value: f32) -> Result<MelSegments> {
    Ok(MelSegmenter::new(frames_win, frames_step, pad_last, pad_value)?.segment(mel.view()))
}
