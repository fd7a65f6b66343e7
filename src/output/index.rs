//! CSV Index Output
//!
//! The segment index written by `wav2mel` and the outcome report written by
//! `wavresample`. Both files always carry a header row.

use std::path::Path;
use serde::Serialize;
use crate::error::Result;

/// One produced mel segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexRow {
    pub source_wav: String,
    /// Separate `.npy` file, or the stacked file the segment lives in
    pub npy_path_or_stack: String,
    pub segment_idx: usize,
    pub start_frame: usize,
    pub end_frame: usize,
    pub start_time_s: String,
    pub end_time_s: String,
    pub sr: u32,
    pub n_fft: usize,
    pub hop: usize,
    pub n_mels: usize,
    pub fmin: f32,
    pub fmax: f32,
    pub win_seconds: f64,
    pub step_seconds: f64,
}

/// Frame offset to seconds with six decimals.
pub fn frame_time(frame: usize, hop_length: usize, sample_rate: u32) -> String {
    format!("{:.6}", frame as f64 * hop_length as f64 / sample_rate as f64)
}

const INDEX_HEADER: [&str; 15] = [
    "source_wav",
    "npy_path_or_stack",
    "segment_idx",
    "start_frame",
    "end_frame",
    "start_time_s",
    "end_time_s",
    "sr",
    "n_fft",
    "hop",
    "n_mels",
    "fmin",
    "fmax",
    "win_seconds",
    "step_seconds",
];

/// Write the segment index, replacing any existing file.
pub fn write_index_csv<P: AsRef<Path>>(path: P, rows: &[IndexRow]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // serde only emits a header with the first record
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(INDEX_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    log::info!("Wrote {} index rows to {}", rows.len(), path.display());
    Ok(())
}

/// One `wavresample` outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub source: String,
    pub output: String,
    pub action: String,
    pub reason: String,
    pub source_sr: Option<u32>,
    pub target_sr: u32,
}

const REPORT_HEADER: [&str; 6] = ["source", "output", "action", "reason", "source_sr", "target_sr"];

pub fn write_report_csv<P: AsRef<Path>>(path: P, rows: &[ReportRow]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(REPORT_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
