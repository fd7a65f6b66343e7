//! Log-mel spectrogram computation.
//!
//! Power STFT with a periodic Hann window, Slaney-scale mel filterbank with
//! Slaney area normalization, and decibel compression referenced to the
//! loudest bin and clipped to `top_db` below each frame's maximum (or the
//! global maximum). Output arrays are `(n_mels, n_frames)`.

use ndarray::{Array2, Axis};
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use crate::error::{PrepError, Result};

const AMIN: f64 = 1e-10;

/// Which maximum the `top_db` floor is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DbClipScope {
    /// Maximum over the whole spectrogram
    Global,
    /// Maximum of each time frame
    #[default]
    Frame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MelConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub fmin: f32,
    pub fmax: f32,
    /// Zero-pad the signal by `n_fft / 2` on both sides before framing.
    pub center: bool,
    pub top_db: f32,
    pub clip_scope: DbClipScope,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            n_fft: 1024,
            hop_length: 256,
            n_mels: 64,
            fmin: 20.0,
            fmax: 16000.0,
            center: true,
            top_db: 80.0,
            clip_scope: DbClipScope::Frame,
        }
    }
}

/// Mel-spectrogram extractor for a fixed sample rate.
#[derive(Debug, Clone)]
pub struct MelSpectrogram {
    config: MelConfig,
    sample_rate: u32,
    mel_basis: Array2<f32>,
    window: Vec<f32>,
}

impl MelSpectrogram {
    pub fn new(sample_rate: u32, config: MelConfig) -> Result<Self> {
        if sample_rate == 0 {
            return Err(PrepError::config("Sample rate must be greater than 0"));
        }
        if config.n_fft == 0 || config.hop_length == 0 || config.n_mels == 0 {
            return Err(PrepError::config("n_fft, hop length and n_mels must be greater than 0"));
        }

        let nyquist = sample_rate as f32 / 2.0;
        if config.fmax > nyquist {
            log::warn!(
                "fmax {}Hz exceeds Nyquist {}Hz; upper mel bands will be empty",
                config.fmax, nyquist
            );
        }

        let mel_basis = mel_filterbank(sample_rate, config.n_fft, config.n_mels, config.fmin, config.fmax);
        let window = hann_window(config.n_fft);

        Ok(Self { config, sample_rate, mel_basis, window })
    }

    pub fn config(&self) -> &MelConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Filterbank of shape `(n_mels, 1 + n_fft / 2)`.
    pub fn mel_basis(&self) -> &Array2<f32> {
        &self.mel_basis
    }

    /// Frame count for a signal of `num_samples`, or `None` when it is too short.
    pub fn num_frames(&self, num_samples: usize) -> Option<usize> {
        let n_fft = self.config.n_fft;
        let padded = if self.config.center { num_samples + 2 * (n_fft / 2) } else { num_samples };
        if padded < n_fft {
            return None;
        }
        Some(1 + (padded - n_fft) / self.config.hop_length)
    }

    /// Power spectrogram, `(1 + n_fft / 2, n_frames)`.
    pub fn power_spectrogram(&self, samples: &[f32]) -> Result<Array2<f32>> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let n_frames = self.num_frames(samples.len()).ok_or_else(|| {
            PrepError::processing(format!(
                "Signal of {} samples is shorter than n_fft={} (centering disabled)",
                samples.len(), n_fft
            ))
        })?;

        let pad = if self.config.center { n_fft / 2 } else { 0 };
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let n_freqs = n_fft / 2 + 1;

        let mut power = Array2::<f32>::zeros((n_freqs, n_frames));
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];

        for frame in 0..n_frames {
            let start = frame * hop;
            for (j, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + j] * self.window[j], 0.0);
            }
            fft.process(&mut buffer);
            for (k, value) in buffer.iter().take(n_freqs).enumerate() {
                power[[k, frame]] = value.norm_sqr();
            }
        }

        Ok(power)
    }

    /// Mel power spectrogram, `(n_mels, n_frames)`.
    pub fn compute(&self, samples: &[f32]) -> Result<Array2<f32>> {
        let power = self.power_spectrogram(samples)?;
        Ok(self.mel_basis.dot(&power))
    }

    /// Log-mel spectrogram in dB, `(n_mels, n_frames)`.
    pub fn compute_log(&self, samples: &[f32]) -> Result<Array2<f32>> {
        let mel = self.compute(samples)?;
        Ok(power_to_db(&mel, self.config.top_db, self.config.clip_scope))
    }
}

/// Convert a power spectrogram to dB relative to its global maximum.
///
/// Values are then clipped `top_db` below the maximum selected by `scope`:
/// the loudest value of each frame, or of the whole spectrogram.
pub fn power_to_db(power: &Array2<f32>, top_db: f32, scope: DbClipScope) -> Array2<f32> {
    let to_db = |v: f32| 10.0 * (v as f64).max(AMIN).log10();
    let top_db = top_db as f64;

    let reference = power.iter().cloned().fold(0.0f32, f32::max);
    let ref_db = to_db(reference);
    let db = power.mapv(|v| to_db(v) - ref_db);

    let mut out = Array2::<f32>::zeros(power.raw_dim());
    match scope {
        DbClipScope::Global => {
            let floor = db.iter().cloned().fold(f64::NEG_INFINITY, f64::max) - top_db;
            out.zip_mut_with(&db, |slot, &v| *slot = v.max(floor) as f32);
        }
        DbClipScope::Frame => {
            for (frame, mut column) in db.axis_iter(Axis(1)).zip(out.axis_iter_mut(Axis(1))) {
                let floor = frame.iter().cloned().fold(f64::NEG_INFINITY, f64::max) - top_db;
                column.zip_mut_with(&frame, |slot, &v| *slot = v.max(floor) as f32);
            }
        }
    }
    out
}

/// Slaney mel scale (linear below 1 kHz, logarithmic above).
pub fn hz_to_mel(hz: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;

    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;

    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (logstep * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f32, fmax: f32) -> Array2<f32> {
    let n_freqs = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..n_freqs)
        .map(|i| i as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let mel_min = hz_to_mel(fmin as f64);
    let mel_max = hz_to_mel(fmax as f64);
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut weights = Array2::<f32>::zeros((n_mels, n_freqs));
    for m in 0..n_mels {
        let lower_width = mel_f[m + 1] - mel_f[m];
        let upper_width = mel_f[m + 2] - mel_f[m + 1];
        let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]);

        for (k, &freq) in fft_freqs.iter().enumerate() {
            let lower = (freq - mel_f[m]) / lower_width;
            let upper = (mel_f[m + 2] - freq) / upper_width;
            let w = lower.min(upper).max(0.0);
            weights[[m, k]] = (w * enorm) as f32;
        }
    }

    weights
}

/// Periodic Hann window.
fn hann_window(length: usize) -> Vec<f32> {
    (0..length)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / length as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn test_mel_scale_roundtrip() {
        for hz in [0.0, 440.0, 999.0, 1000.0, 4000.0, 16000.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((back - hz).abs() < 1e-6, "{} -> {}", hz, back);
        }
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_frame_count() {
        let mel = MelSpectrogram::new(22050, MelConfig::default()).unwrap();
        // Centered framing gives 1 + len / hop frames.
        assert_eq!(mel.num_frames(22050), Some(1 + 22050 / 256));

        let config = MelConfig { center: false, ..Default::default() };
        let mel = MelSpectrogram::new(22050, config).unwrap();
        assert_eq!(mel.num_frames(1024), Some(1));
        assert_eq!(mel.num_frames(1023), None);
        assert!(mel.compute_log(&[0.0; 100]).is_err());
    }

    #[test]
    fn test_filterbank_shape_and_support() {
        let mel = MelSpectrogram::new(44100, MelConfig::default()).unwrap();
        let basis = mel.mel_basis();
        assert_eq!(basis.dim(), (64, 513));
        for row in basis.rows() {
            assert!(row.iter().all(|&w| w >= 0.0));
            assert!(row.iter().any(|&w| w > 0.0));
        }
    }

    #[test]
    fn test_log_mel_range_and_peak_band() {
        let sr = 22050;
        let config = MelConfig { fmax: 8000.0, clip_scope: DbClipScope::Global, ..Default::default() };
        let mel = MelSpectrogram::new(sr, config).unwrap();
        let db = mel.compute_log(&sine(1000.0, sr, sr as usize)).unwrap();

        assert_eq!(db.nrows(), 64);
        let max = db.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min = db.iter().cloned().fold(f32::INFINITY, f32::min);
        assert!(max.abs() < 1e-4);
        assert!(min >= -80.0 - 1e-4);

        // The loudest band of a middle frame sits where 1 kHz maps on the mel axis.
        let frame = db.column(db.ncols() / 2);
        let peak = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let mel_lo = hz_to_mel(20.0);
        let mel_hi = hz_to_mel(8000.0);
        let expected = ((hz_to_mel(1000.0) - mel_lo) / (mel_hi - mel_lo) * 65.0 - 1.0).round() as i64;
        assert!((peak as i64 - expected).abs() <= 1, "peak band {} expected {}", peak, expected);
    }

    #[test]
    fn test_power_to_db_global_clip() {
        let power = Array2::from(vec![[1.0f32, 1e-12], [0.1, 0.01]]);
        let db = power_to_db(&power, 15.0, DbClipScope::Global);
        assert!((db[[0, 0]] - 0.0).abs() < 1e-6);
        assert!((db[[1, 0]] + 10.0).abs() < 1e-5);
        assert!((db[[1, 1]] + 15.0).abs() < 1e-5);
        assert!((db[[0, 1]] + 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_power_to_db_frame_clip() {
        let power = Array2::from(vec![[1.0f32, 0.01], [0.1, 0.001]]);
        let db = power_to_db(&power, 15.0, DbClipScope::Frame);
        // Levels stay relative to the loudest bin overall.
        assert!(db[[0, 0]].abs() < 1e-6);
        assert!((db[[1, 0]] + 10.0).abs() < 1e-5);
        // The quiet frame keeps its own 15 dB below its own peak.
        assert!((db[[0, 1]] + 20.0).abs() < 1e-5);
        assert!((db[[1, 1]] + 30.0).abs() < 1e-5);

        let global = power_to_db(&power, 15.0, DbClipScope::Global);
        assert!((global[[0, 1]] + 15.0).abs() < 1e-5);
        assert!((global[[1, 1]] + 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_default_clip_is_per_frame() {
        assert_eq!(MelConfig::default().clip_scope, DbClipScope::Frame);

        // Loud first half, quiet second half.
        let sr = 16000;
        let mut signal = sine(1000.0, sr, 8000);
        signal.extend(sine(1000.0, sr, 8000).iter().map(|v| v * 0.001));
        let config = MelConfig { n_fft: 512, hop_length: 160, n_mels: 40, fmax: 8000.0, top_db: 20.0, ..Default::default() };
        let mel = MelSpectrogram::new(sr, config).unwrap();
        let db = mel.compute_log(&signal).unwrap();

        for frame in db.columns() {
            let max = frame.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let min = frame.iter().cloned().fold(f32::INFINITY, f32::min);
            assert!(max - min <= 20.0 + 1e-3);
        }
        let quiet = db.column(db.ncols() - 10);
        let quiet_max = quiet.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!(quiet_max < -50.0, "quiet frame peak {}", quiet_max);
    }

    #[test]
    fn test_silence_is_flat() {
        let mel = MelSpectrogram::new(16000, MelConfig { fmax: 8000.0, ..Default::default() }).unwrap();
        let db = mel.compute_log(&[0.0; 4000]).unwrap();
        assert!(db.iter().all(|&v| v == 0.0));
    }
}
