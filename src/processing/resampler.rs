//! Rule-based batch resampling
//!
//! Each file is skipped, copied or resampled depending on its detected rate.
//! Failures are recorded per file and never abort the batch.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use serde::Serialize;
use crate::audio::{AudioConverter, WavAudio};
use crate::config::ResampleConfig;
use crate::error::{PrepError, Result};
use crate::output::{write_report_csv, ReportRow};
use super::collect::{collect_wavs, mirrored_dir};
use super::common::BatchStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Skipped,
    Copied,
    Resampled,
    Error,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Skipped => "skipped",
            Action::Copied => "copied",
            Action::Resampled => "resampled",
            Action::Error => "error",
        };
        f.write_str(name)
    }
}

/// What to do with a file of a given rate, before looking at the output side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub reason: String,
}

pub fn decide(sample_rate: u32, min_sample_rate: u32, target_sample_rate: u32, downsample: bool) -> Decision {
    let (action, reason) = if sample_rate < min_sample_rate {
        (Action::Skipped, format!("Sample rate {}Hz below minimum {}Hz", sample_rate, min_sample_rate))
    } else if sample_rate == target_sample_rate {
        (Action::Copied, format!("Sample rate already {}Hz", target_sample_rate))
    } else if sample_rate < target_sample_rate {
        (Action::Resampled, format!("Resampled from {}Hz to {}Hz", sample_rate, target_sample_rate))
    } else if downsample {
        (Action::Resampled, format!("Downsampled from {}Hz to {}Hz", sample_rate, target_sample_rate))
    } else {
        (
            Action::Skipped,
            format!(
                "Sample rate {}Hz above target {}Hz (use --downsample to enable)",
                sample_rate, target_sample_rate
            ),
        )
    };
    Decision { action, reason }
}

/// kHz label as it appears in file names: `44.1`, `48.0`.
pub fn format_khz(khz: f64) -> String {
    let text = khz.to_string();
    if text.contains(['.', 'e', 'E']) || !khz.is_finite() {
        text
    } else {
        format!("{}.0", text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResampleOutcome {
    pub source: PathBuf,
    pub output: Option<PathBuf>,
    pub action: Action,
    pub reason: String,
    pub source_sample_rate: Option<u32>,
    pub target_sample_rate: u32,
}

impl ResampleOutcome {
    fn error(source: &Path, source_sample_rate: Option<u32>, target_sample_rate: u32, err: PrepError) -> Self {
        Self {
            source: source.to_path_buf(),
            output: None,
            action: Action::Error,
            reason: err.to_string(),
            source_sample_rate,
            target_sample_rate,
        }
    }

    pub fn to_report_row(&self) -> ReportRow {
        ReportRow {
            source: self.source.display().to_string(),
            output: self.output.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
            action: self.action.to_string(),
            reason: self.reason.clone(),
            source_sr: self.source_sample_rate,
            target_sr: self.target_sample_rate,
        }
    }
}

impl fmt::Display for ResampleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.action, self.source.display(), self.reason)
    }
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcomes: Vec<ResampleOutcome>,
    pub stats: BatchStats,
}

#[derive(Debug, Clone)]
pub struct ResampleProcessor {
    config: ResampleConfig,
}

impl ResampleProcessor {
    pub fn new(config: ResampleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResampleConfig {
        &self.config
    }

    /// `<output_dir>/<stem>_<k>k.wav`
    pub fn output_path(&self, input: &Path, output_dir: &Path) -> PathBuf {
        let stem = input.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        output_dir.join(format!("{}_{}k.wav", stem, format_khz(self.config.target_sample_rate_k)))
    }

    /// Handle one file, turning any failure into an `error` outcome.
    pub fn process_file(&self, input: &Path, output_dir: &Path) -> ResampleOutcome {
        let target = self.config.target_sample_rate;

        let sample_rate = match WavAudio::read_sample_rate(input) {
            Ok(sr) => sr,
            Err(e) => return ResampleOutcome::error(input, None, target, e),
        };

        self.apply(input, output_dir, sample_rate)
            .unwrap_or_else(|e| ResampleOutcome::error(input, Some(sample_rate), target, e))
    }

    fn apply(&self, input: &Path, output_dir: &Path, sample_rate: u32) -> Result<ResampleOutcome> {
        if sample_rate == 0 {
            return Err(PrepError::audio(format!("Invalid sample rate: {}", sample_rate)));
        }

        let target = self.config.target_sample_rate;
        let decision = decide(sample_rate, self.config.min_sample_rate, target, self.config.downsample);
        let mut outcome = ResampleOutcome {
            source: input.to_path_buf(),
            output: None,
            action: decision.action,
            reason: decision.reason,
            source_sample_rate: Some(sample_rate),
            target_sample_rate: target,
        };
        if outcome.action == Action::Skipped {
            return Ok(outcome);
        }

        let output = self.output_path(input, output_dir);
        outcome.output = Some(output.clone());
        if output.exists() && !self.config.overwrite {
            outcome.action = Action::Skipped;
            outcome.reason = "Output file exists (use --overwrite to replace)".to_string();
            return Ok(outcome);
        }

        fs::create_dir_all(output_dir)?;
        match outcome.action {
            Action::Copied => {
                fs::copy(input, &output)?;
            }
            Action::Resampled => {
                let audio = WavAudio::from_file(input)?;
                let resampled = AudioConverter::convert_sample_rate(&audio, target)?;
                resampled.save_to_file(&output)?;
            }
            Action::Skipped | Action::Error => {}
        }

        Ok(outcome)
    }

    /// Process every WAV under the configured input, mirroring its folders.
    pub fn process_batch(&self) -> Result<BatchReport> {
        let input = &self.config.input_path;
        let files = collect_wavs(input)?;
        if files.is_empty() {
            return Err(PrepError::no_input(input));
        }

        let mut stats = BatchStats::new(files.len());
        let mut outcomes = Vec::with_capacity(files.len());

        for file in &files {
            let output_dir = mirrored_dir(input, file, &self.config.output_dir);
            let outcome = self.process_file(file, &output_dir);

            match outcome.action {
                Action::Copied | Action::Resampled => {
                    stats.processed += 1;
                    log::info!("{}", outcome);
                }
                Action::Skipped => {
                    stats.skipped += 1;
                    log::info!("{}", outcome);
                }
                Action::Error => {
                    stats.errors += 1;
                    log::error!("{}", outcome);
                }
            }
            outcomes.push(outcome);
        }

        if let Some(report) = &self.config.report {
            let rows: Vec<ReportRow> = outcomes.iter().map(ResampleOutcome::to_report_row).collect();
            write_report_csv(report, &rows)?;
            log::info!("Report written to {}", report.display());
        }

        Ok(BatchReport { outcomes, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;
    use ndarray::Array1;
    use tempfile::TempDir;

    fn write_tone(path: &Path, sample_rate: u32, seconds: f32) {
        let n = (sample_rate as f32 * seconds) as usize;
        let data = Array1::from_shape_fn(n, |i| {
            0.3 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin()
        });
        WavAudio::new_mono(sample_rate, data, AudioFormat::Int16)
            .save_to_file(path)
            .unwrap();
    }

    fn processor(input: &Path, output: &Path) -> ResampleProcessor {
        ResampleProcessor::new(ResampleConfig {
            input_path: input.to_path_buf(),
            output_dir: output.to_path_buf(),
            ..Default::default()
        })
    }

    #[test]
    fn test_decide_rules() {
        assert_eq!(decide(8000, 16000, 44100, false).action, Action::Skipped);
        assert_eq!(decide(8000, 16000, 44100, false).reason, "Sample rate 8000Hz below minimum 16000Hz");
        assert_eq!(decide(44100, 16000, 44100, false).action, Action::Copied);
        assert_eq!(decide(22050, 16000, 44100, false).reason, "Resampled from 22050Hz to 44100Hz");

        let above = decide(96000, 16000, 44100, false);
        assert_eq!(above.action, Action::Skipped);
        assert!(above.reason.contains("--downsample"));

        let down = decide(96000, 16000, 44100, true);
        assert_eq!(down.action, Action::Resampled);
        assert_eq!(down.reason, "Downsampled from 96000Hz to 44100Hz");
    }

    #[test]
    fn test_format_khz() {
        assert_eq!(format_khz(44.1), "44.1");
        assert_eq!(format_khz(48.0), "48.0");
        assert_eq!(format_khz(22.05), "22.05");
        assert_eq!(format_khz(16.0), "16.0");
    }

    #[test]
    fn test_upsample_exact_length_and_format() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("voice.wav");
        write_tone(&input, 22050, 1.0);
        let out_dir = dir.path().join("out");

        let outcome = processor(&input, &out_dir).process_file(&input, &out_dir);
        assert_eq!(outcome.action, Action::Resampled);
        assert_eq!(outcome.source_sample_rate, Some(22050));

        let output = outcome.output.unwrap();
        assert_eq!(output, out_dir.join("voice_44.1k.wav"));
        let audio = WavAudio::from_file(&output).unwrap();
        assert_eq!(audio.sample_rate(), 44100);
        assert_eq!(audio.total_samples(), 44100);
        assert_eq!(audio.channels(), 1);
        assert_eq!(audio.format(), AudioFormat::Int16);
    }

    #[test]
    fn test_target_rate_is_byte_copy() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("ready.wav");
        write_tone(&input, 44100, 0.2);
        let out_dir = dir.path().join("out");

        let outcome = processor(&input, &out_dir).process_file(&input, &out_dir);
        assert_eq!(outcome.action, Action::Copied);
        assert_eq!(
            std::fs::read(outcome.output.unwrap()).unwrap(),
            std::fs::read(&input).unwrap()
        );
    }

    #[test]
    fn test_skips_leave_no_output() {
        let dir = TempDir::new().unwrap();
        let low = dir.path().join("low.wav");
        let high = dir.path().join("high.wav");
        write_tone(&low, 8000, 0.1);
        write_tone(&high, 96000, 0.1);
        let out_dir = dir.path().join("out");
        let proc = processor(dir.path(), &out_dir);

        let outcome = proc.process_file(&low, &out_dir);
        assert_eq!(outcome.action, Action::Skipped);
        assert_eq!(outcome.output, None);

        let outcome = proc.process_file(&high, &out_dir);
        assert_eq!(outcome.action, Action::Skipped);
        assert_eq!(outcome.output, None);
        assert!(!out_dir.exists());
    }

    #[test]
    fn test_downsample_hits_target_rate() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("hi.wav");
        write_tone(&input, 96000, 0.5);
        let out_dir = dir.path().join("out");
        let proc = ResampleProcessor::new(ResampleConfig { downsample: true, ..Default::default() });

        let outcome = proc.process_file(&input, &out_dir);
        assert_eq!(outcome.action, Action::Resampled);
        let audio = WavAudio::from_file(outcome.output.unwrap()).unwrap();
        assert_eq!(audio.sample_rate(), 44100);
        assert_eq!(audio.total_samples(), 22050);
    }

    #[test]
    fn test_existing_output_requires_overwrite() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.wav");
        write_tone(&input, 22050, 0.1);
        let out_dir = dir.path().join("out");

        let first = processor(&input, &out_dir).process_file(&input, &out_dir);
        assert_eq!(first.action, Action::Resampled);

        let second = processor(&input, &out_dir).process_file(&input, &out_dir);
        assert_eq!(second.action, Action::Skipped);
        assert_eq!(second.reason, "Output file exists (use --overwrite to replace)");
        assert_eq!(second.output, first.output);

        let proc = ResampleProcessor::new(ResampleConfig { overwrite: true, ..Default::default() });
        assert_eq!(proc.process_file(&input, &out_dir).action, Action::Resampled);
    }

    #[test]
    fn test_unreadable_file_is_error_outcome() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("broken.wav");
        std::fs::write(&input, b"not a wav file").unwrap();

        let outcome = processor(&input, dir.path()).process_file(&input, dir.path());
        assert_eq!(outcome.action, Action::Error);
        assert_eq!(outcome.source_sample_rate, None);
        assert!(outcome.reason.contains("Failed to read audio file"));
    }

    #[test]
    fn test_batch_mirrors_folders_and_counts() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir_all(input.join("spk1")).unwrap();
        write_tone(&input.join("spk1/a.wav"), 22050, 0.1);
        write_tone(&input.join("b.wav"), 44100, 0.1);
        write_tone(&input.join("c.wav"), 8000, 0.1);
        std::fs::write(input.join("d.wav"), b"junk").unwrap();
        let out_dir = dir.path().join("out");
        let report = dir.path().join("report.csv");

        let proc = ResampleProcessor::new(ResampleConfig {
            input_path: input.clone(),
            output_dir: out_dir.clone(),
            report: Some(report.clone()),
            ..Default::default()
        });
        let result = proc.process_batch().unwrap();

        assert_eq!(result.stats, BatchStats { total: 4, processed: 2, skipped: 1, errors: 1 });
        assert!(out_dir.join("spk1/a_44.1k.wav").exists());
        assert!(out_dir.join("b_44.1k.wav").exists());
        assert!(!out_dir.join("c_44.1k.wav").exists());

        let text = std::fs::read_to_string(&report).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert!(text.starts_with("source,output,action,reason,source_sr,target_sr"));
    }

    #[test]
    fn test_batch_without_wavs_fails() {
        let dir = TempDir::new().unwrap();
        let proc = processor(dir.path(), &dir.path().join("out"));
        assert!(matches!(proc.process_batch(), Err(PrepError::NoInput { .. })));
    }
}
