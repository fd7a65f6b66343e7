//! Configuration management for both tools
//!
//! Each tool has a clap argument struct and a TOML-backed config struct.
//! Values given on the command line override the config file, which in turn
//! overrides the defaults.

use crate::audio::{DbClipScope, MelConfig, MonoStrategy};
use crate::error::{PrepError, Result};
use crate::output::NpyDtype;
use crate::processing::segment::SegmentConfig;
use clap::{Parser, ValueEnum};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How segments of one file are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    /// One `(n_segments, n_mels, frames)` array per file
    #[default]
    Stack,
    /// One `(n_mels, frames)` array per segment
    Separate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Rate the audio is brought to before analysis
    pub sample_rate: u32,
    pub mono_strategy: MonoStrategy,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            mono_strategy: MonoStrategy::Mean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub save_mode: SaveMode,
    pub dtype: NpyDtype,
    pub save_full_mel: bool,
    pub png: bool,
    pub save_individual_png: bool,
    /// File name of the index, relative to the output directory
    pub index_csv: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_mode: SaveMode::Stack,
            dtype: NpyDtype::Float32,
            save_full_mel: false,
            png: false,
            save_individual_png: false,
            index_csv: "index.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wav2MelConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub verbose: bool,
    pub audio: AudioConfig,
    pub mel: MelConfig,
    pub segment: SegmentConfig,
    pub output: OutputConfig,
}

impl Default for Wav2MelConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            output_dir: PathBuf::from("./out"),
            verbose: false,
            audio: AudioConfig::default(),
            mel: MelConfig::default(),
            segment: SegmentConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "wav2mel", about = "Convert WAV files to segmented log-mel spectrograms", version)]
pub struct Wav2MelArgs {
    #[arg(help = "Input WAV file or directory (scanned recursively)")]
    pub input: PathBuf,

    #[arg(short = 'o', long = "out", help = "Output directory [default: ./out]")]
    pub out: Option<PathBuf>,

    #[arg(long = "sr", help = "Analysis sample rate in Hz [default: 44100]")]
    pub sr: Option<u32>,

    #[arg(long = "n-fft", help = "FFT size [default: 1024]")]
    pub n_fft: Option<usize>,

    #[arg(long = "hop", help = "Hop length in samples [default: 256]")]
    pub hop: Option<usize>,

    #[arg(long = "n-mels", help = "Number of mel bands [default: 64]")]
    pub n_mels: Option<usize>,

    #[arg(long = "fmin", help = "Lowest mel filter frequency in Hz [default: 20]")]
    pub fmin: Option<f32>,

    #[arg(long = "fmax", help = "Highest mel filter frequency in Hz [default: 16000]")]
    pub fmax: Option<f32>,

    #[arg(long = "no-center", help = "Do not pad the signal before framing")]
    pub no_center: bool,

    #[arg(long = "top-db", help = "Dynamic range kept below the maximum in dB [default: 80]")]
    pub top_db: Option<f32>,

    #[arg(long = "db-clip-scope", value_enum, help = "Maximum the top-db floor is measured from [default: frame]")]
    pub db_clip_scope: Option<DbClipScope>,

    #[arg(long = "mono-strategy", value_enum, help = "Down-mix strategy [default: mean]")]
    pub mono_strategy: Option<MonoStrategy>,

    #[arg(long = "win-seconds", help = "Segment length in seconds [default: 1.0]")]
    pub win_seconds: Option<f64>,

    #[arg(long = "step-seconds", help = "Step between segments in seconds [default: 0.5]")]
    pub step_seconds: Option<f64>,

    #[arg(long = "pad-last", help = "Add a padded segment covering the tail")]
    pub pad_last: bool,

    #[arg(long = "pad-value", allow_hyphen_values = true, help = "Fill value for padded frames [default: -80]")]
    pub pad_value: Option<f32>,

    #[arg(long = "save-mode", value_enum, help = "Write segments stacked or one file each [default: stack]")]
    pub save_mode: Option<SaveMode>,

    #[arg(long = "dtype", value_enum, help = "Element type of saved arrays [default: float32]")]
    pub dtype: Option<NpyDtype>,

    #[arg(long = "save-full-mel", help = "Also save the unsegmented spectrogram")]
    pub save_full_mel: bool,

    #[arg(long = "png", help = "Save a heat map of each full spectrogram")]
    pub png: bool,

    #[arg(long = "save-individual-png", help = "Save a heat map of every segment")]
    pub save_individual_png: bool,

    #[arg(long = "index-csv", help = "Index file name inside the output directory [default: index.csv]")]
    pub index_csv: Option<String>,

    #[arg(short = 'c', long = "config", help = "Config file path (TOML format)")]
    pub config_file: Option<PathBuf>,

    #[arg(short = 'v', long = "verbose", help = "Enable verbose output mode")]
    pub verbose: bool,
}

impl Wav2MelConfig {
    /// Create config from command line arguments and optional config file
    pub fn from_args_and_config(args: Wav2MelArgs) -> Result<Self> {
        let mut config = match &args.config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.input_path = args.input;
        if let Some(out) = args.out {
            config.output_dir = out;
        }
        config.verbose |= args.verbose;

        if let Some(sr) = args.sr {
            config.audio.sample_rate = sr;
        }
        if let Some(strategy) = args.mono_strategy {
            config.audio.mono_strategy = strategy;
        }

        let mel = &mut config.mel;
        if let Some(n_fft) = args.n_fft {
            mel.n_fft = n_fft;
        }
        if let Some(hop) = args.hop {
            mel.hop_length = hop;
        }
        if let Some(n_mels) = args.n_mels {
            mel.n_mels = n_mels;
        }
        if let Some(fmin) = args.fmin {
            mel.fmin = fmin;
        }
        if let Some(fmax) = args.fmax {
            mel.fmax = fmax;
        }
        if args.no_center {
            mel.center = false;
        }
        if let Some(top_db) = args.top_db {
            mel.top_db = top_db;
        }
        if let Some(scope) = args.db_clip_scope {
            mel.clip_scope = scope;
        }

        let segment = &mut config.segment;
        if let Some(win) = args.win_seconds {
            segment.win_seconds = win;
        }
        if let Some(step) = args.step_seconds {
            segment.step_seconds = step;
        }
        segment.pad_last |= args.pad_last;
        if let Some(pad_value) = args.pad_value {
            segment.pad_value = pad_value;
        }

        let output = &mut config.output;
        if let Some(mode) = args.save_mode {
            output.save_mode = mode;
        }
        if let Some(dtype) = args.dtype {
            output.dtype = dtype;
        }
        output.save_full_mel |= args.save_full_mel;
        output.png |= args.png;
        output.save_individual_png |= args.save_individual_png;
        if let Some(index_csv) = args.index_csv {
            output.index_csv = index_csv;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_toml(path)
    }

    /// Validate configuration parameter validity
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(PrepError::config("Sample rate must be greater than 0"));
        }

        let mel = &self.mel;
        if mel.n_fft == 0 {
            return Err(PrepError::config("FFT size must be greater than 0"));
        }
        if mel.hop_length == 0 {
            return Err(PrepError::config("Hop length must be greater than 0"));
        }
        if mel.n_mels == 0 {
            return Err(PrepError::config("Number of mel bands must be greater than 0"));
        }
        if !(mel.fmin >= 0.0) {
            return Err(PrepError::config("fmin must be non-negative"));
        }
        if !(mel.fmax > mel.fmin) {
            return Err(PrepError::config(format!(
                "fmax ({}) must be greater than fmin ({})",
                mel.fmax, mel.fmin
            )));
        }
        if !(mel.top_db >= 0.0) {
            return Err(PrepError::config("top_db must be non-negative"));
        }

        let segment = &self.segment;
        if !(segment.win_seconds.is_finite() && segment.win_seconds > 0.0) {
            return Err(PrepError::config("Window length must be a positive number of seconds"));
        }
        if !(segment.step_seconds.is_finite() && segment.step_seconds > 0.0) {
            return Err(PrepError::config("Step must be a positive number of seconds"));
        }

        if self.output.index_csv.trim().is_empty() {
            return Err(PrepError::config("Index file name must not be empty"));
        }

        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_toml(self, path)
    }

    /// Absolute-or-relative location of the index CSV.
    pub fn index_path(&self) -> PathBuf {
        self.output_dir.join(&self.output.index_csv)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Files below this rate are skipped
    pub min_sample_rate: u32,
    pub target_sample_rate: u32,
    /// Label used in output file names, e.g. `44.1` for `_44.1k.wav`
    pub target_sample_rate_k: f64,
    pub downsample: bool,
    pub overwrite: bool,
    /// Optional CSV of per-file outcomes
    pub report: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            output_dir: PathBuf::from("./resampled_output"),
            min_sample_rate: 16000,
            target_sample_rate: 44100,
            target_sample_rate_k: 44.1,
            downsample: false,
            overwrite: false,
            report: None,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "wavresample", about = "Resample WAV files to a target sample rate", version)]
pub struct ResampleArgs {
    #[arg(help = "Input WAV file or directory (scanned recursively)")]
    pub input: PathBuf,

    #[arg(short = 'o', long = "output", help = "Output directory [default: ./resampled_output]")]
    pub output: Option<PathBuf>,

    #[arg(long = "downsample", help = "Also resample files above the target rate")]
    pub downsample: bool,

    #[arg(long = "overwrite", help = "Replace existing output files")]
    pub overwrite: bool,

    #[arg(long = "min-sample-rate", help = "Skip files below this rate in Hz [default: 16000]")]
    pub min_sample_rate: Option<u32>,

    #[arg(long = "target-sample-rate", help = "Target rate in Hz [default: 44100]")]
    pub target_sample_rate: Option<u32>,

    #[arg(long = "target-sample-rate-k", help = "Target rate label in kHz for file names [default: 44.1]")]
    pub target_sample_rate_k: Option<f64>,

    #[arg(long = "report", help = "Write a CSV of per-file outcomes")]
    pub report: Option<PathBuf>,

    #[arg(short = 'c', long = "config", help = "Config file path (TOML format)")]
    pub config_file: Option<PathBuf>,

    #[arg(short = 'v', long = "verbose", help = "Enable verbose output mode")]
    pub verbose: bool,
}

impl ResampleConfig {
    pub fn from_args_and_config(args: ResampleArgs) -> Result<Self> {
        let mut config = match &args.config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.input_path = args.input;
        if let Some(output) = args.output {
            config.output_dir = output;
        }
        config.downsample |= args.downsample;
        config.overwrite |= args.overwrite;
        if let Some(min) = args.min_sample_rate {
            config.min_sample_rate = min;
        }
        if let Some(target) = args.target_sample_rate {
            config.target_sample_rate = target;
        }
        if let Some(target_k) = args.target_sample_rate_k {
            config.target_sample_rate_k = target_k;
        }
        if args.report.is_some() {
            config.report = args.report;
        }
        config.verbose |= args.verbose;

        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_toml(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_sample_rate == 0 {
            return Err(PrepError::config("Target sample rate must be greater than 0"));
        }
        if !(self.target_sample_rate_k.is_finite() && self.target_sample_rate_k > 0.0) {
            return Err(PrepError::config("Target sample rate label must be a positive number"));
        }
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_toml(self, path)
    }
}

fn load_toml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| PrepError::config(format!("Failed to read config file: {}", e)))?;

    toml::from_str(&content)
        .map_err(|e| PrepError::config(format!("Failed to parse config file: {}", e)))
}

fn save_toml<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let content = toml::to_string_pretty(value)
        .map_err(|e| PrepError::config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(path, content)
        .map_err(|e| PrepError::config(format!("Failed to write config file: {}", e)))
}
