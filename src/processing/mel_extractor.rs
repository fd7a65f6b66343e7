//! wav2mel pipeline
//!
//! Per file: load mono audio, compute the log-mel spectrogram, cut it into
//! windows and write the arrays, images and index rows under
//! `<out>/<stem>/`. The batch driver collects index rows from every file and
//! writes one CSV at the end.

use std::path::{Path, PathBuf};
use ndarray::Array2;
use crate::audio::MelSpectrogram;
use crate::config::{SaveMode, Wav2MelConfig};
use crate::error::{PrepError, Result};
use crate::output::{save_spectrogram_png, write_index_csv, write_npy, IndexRow};
use super::collect::collect_wavs;
use super::common::{file_progress, load_mono, BatchStats};
use super::segment::{MelSegmenter, MelSegments};

/// Artifacts produced for one input file.
#[derive(Debug, Clone)]
pub struct MelFileResult {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub n_frames: usize,
    pub frames_win: usize,
    pub frames_step: usize,
    pub rows: Vec<IndexRow>,
}

impl MelFileResult {
    pub fn segment_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone)]
pub struct MelBatchReport {
    pub stats: BatchStats,
    pub rows: Vec<IndexRow>,
    pub index_path: PathBuf,
}

#[derive(Debug)]
pub struct MelExtractor {
    config: Wav2MelConfig,
    mel: MelSpectrogram,
    segmenter: MelSegmenter,
}

impl MelExtractor {
    pub fn new(config: Wav2MelConfig) -> Result<Self> {
        config.validate()?;
        let sample_rate = config.audio.sample_rate;
        let mel = MelSpectrogram::new(sample_rate, config.mel.clone())?;
        let segmenter = MelSegmenter::from_config(&config.segment, sample_rate, config.mel.hop_length)?;

        log::debug!(
            "Window {} frames, step {} frames at {}Hz / hop {}",
            segmenter.frames_win(),
            segmenter.frames_step(),
            sample_rate,
            config.mel.hop_length
        );

        Ok(Self { config, mel, segmenter })
    }

    pub fn config(&self) -> &Wav2MelConfig {
        &self.config
    }

    /// Log-mel spectrogram of one file at the configured rate.
    pub fn spectrogram<P: AsRef<Path>>(&self, wav_path: P) -> Result<Array2<f32>> {
        let samples = load_mono(wav_path, self.config.audio.sample_rate, self.config.audio.mono_strategy)?;
        match samples.as_slice() {
            Some(slice) => self.mel.compute_log(slice),
            None => self.mel.compute_log(&samples.to_vec()),
        }
    }

    /// Run the whole pipeline for one file, writing into `output_dir`.
    pub fn process_file(&self, wav_path: &Path, output_dir: &Path) -> Result<MelFileResult> {
        let stem = wav_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| PrepError::processing(format!("No file name in {}", wav_path.display())))?;

        let mel_db = self.spectrogram(wav_path)?;
        let n_frames = mel_db.ncols();
        log::debug!("{}: {} mel bands x {} frames", stem, mel_db.nrows(), n_frames);

        let output = &self.config.output;
        if output.png {
            save_spectrogram_png(mel_db.view(), output_dir.join(format!("{}_mel.png", stem)))?;
        }

        let segments = self.segmenter.segment(mel_db.view());
        if output.save_individual_png {
            for i in 0..segments.len() {
                let path = output_dir.join(format!("{}_segment_{:04}.png", stem, i));
                save_spectrogram_png(segments.segment(i), path)?;
            }
        }

        std::fs::create_dir_all(output_dir)?;
        if output.save_full_mel {
            write_npy(output_dir.join(format!("{}_mel_full.npy", stem)), &mel_db, output.dtype)?;
        }

        let rows = match output.save_mode {
            SaveMode::Stack => self.write_stacked(wav_path, output_dir, &stem, &segments)?,
            SaveMode::Separate => self.write_separate(wav_path, output_dir, &stem, &segments)?,
        };

        Ok(MelFileResult {
            source: wav_path.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            n_frames,
            frames_win: self.segmenter.frames_win(),
            frames_step: self.segmenter.frames_step(),
            rows,
        })
    }

    fn write_stacked(&self, wav_path: &Path, output_dir: &Path, stem: &str, segments: &MelSegments) -> Result<Vec<IndexRow>> {
        if segments.is_empty() {
            log::warn!("{}: too short for a {}-frame window, nothing saved", stem, segments.frames_win);
            return Ok(Vec::new());
        }

        let stack_path = output_dir.join(format!("{}_mel_chunks.npy", stem));
        write_npy(&stack_path, &segments.chunks, self.config.output.dtype)?;

        Ok(segments
            .starts
            .iter()
            .enumerate()
            .map(|(i, &start)| self.index_row(wav_path, &stack_path, i, start))
            .collect())
    }

    fn write_separate(&self, wav_path: &Path, output_dir: &Path, stem: &str, segments: &MelSegments) -> Result<Vec<IndexRow>> {
        let mut rows = Vec::with_capacity(segments.len());
        for (i, &start) in segments.starts.iter().enumerate() {
            let path = output_dir.join(format!("{}_chunk{:04}.npy", stem, i));
            write_npy(&path, &segments.segment(i), self.config.output.dtype)?;
            rows.push(self.index_row(wav_path, &path, i, start));
        }
        Ok(rows)
    }

    fn index_row(&self, wav_path: &Path, npy_path: &Path, index: usize, start: usize) -> IndexRow {
        let sr = self.config.audio.sample_rate;
        let mel = &self.config.mel;
        let end = start + self.segmenter.frames_win();
        IndexRow {
            source_wav: wav_path.display().to_string(),
            npy_path_or_stack: npy_path.display().to_string(),
            segment_idx: index,
            start_frame: start,
            end_frame: end,
            start_time_s: crate::output::index::frame_time(start, mel.hop_length, sr),
            end_time_s: crate::output::index::frame_time(end, mel.hop_length, sr),
            sr,
            n_fft: mel.n_fft,
            hop: mel.hop_length,
            n_mels: mel.n_mels,
            fmin: mel.fmin,
            fmax: mel.fmax,
            win_seconds: self.config.segment.win_seconds,
            step_seconds: self.config.segment.step_seconds,
        }
    }

    /// Process every WAV under the configured input and write the index.
    ///
    /// Per-file failures are logged and counted; the index is written regardless.
    pub fn process_batch(&self) -> Result<MelBatchReport> {
        let input = &self.config.input_path;
        let files = collect_wavs(input)?;
        if files.is_empty() {
            return Err(PrepError::no_input(input));
        }

        let mut stats = BatchStats::new(files.len());
        let mut rows = Vec::new();
        let pb = file_progress(files.len(), "Processing");

        for wav in &files {
            let stem = wav.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            let file_out = self.config.output_dir.join(&stem);

            match self.process_file(wav, &file_out) {
                Ok(result) => {
                    pb.suspend(|| {
                        log::debug!(
                            "{}: {} frames, {} segments",
                            wav.display(),
                            result.n_frames,
                            result.segment_count()
                        )
                    });
                    stats.processed += 1;
                    rows.extend(result.rows);
                }
                Err(e) => {
                    pb.suspend(|| log::error!("Failed to process {}: {}", wav.display(), e));
                    stats.errors += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        let index_path = self.config.index_path();
        write_index_csv(&index_path, &rows)?;

        Ok(MelBatchReport { stats, rows, index_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioFormat, WavAudio};
    use crate::output::{read_npy, NpyDtype};
    use ndarray::Array1;
    use tempfile::TempDir;

    const SR: u32 = 16000;

    fn write_noise(path: &Path, sample_rate: u32, n: usize) {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let data = Array1::from_shape_fn(n, |_| rng.gen_range(-0.5f32..0.5));
        WavAudio::new_mono(sample_rate, data, AudioFormat::Float32)
            .save_to_file(path)
            .unwrap();
    }

    fn small_config(input: &Path, out: &Path) -> Wav2MelConfig {
        let mut config = Wav2MelConfig {
            input_path: input.to_path_buf(),
            output_dir: out.to_path_buf(),
            ..Default::default()
        };
        config.audio.sample_rate = SR;
        config.mel.n_fft = 512;
        config.mel.hop_length = 160;
        config.mel.n_mels = 40;
        config.mel.fmax = 8000.0;
        config
    }

    #[test]
    fn test_stack_mode_outputs() {
        let dir = TempDir::new().unwrap();
        let wav = dir.path().join("clip.wav");
        write_noise(&wav, SR, 32000);
        let out = dir.path().join("out");

        let extractor = MelExtractor::new(small_config(&wav, &out)).unwrap();
        let result = extractor.process_file(&wav, &out.join("clip")).unwrap();

        // 1 + 32000 / 160 frames, 100-frame windows every 50 frames
        assert_eq!(result.n_frames, 201);
        assert_eq!(result.frames_win, 100);
        assert_eq!(result.frames_step, 50);
        assert_eq!(result.segment_count(), 3);

        let stack = read_npy(out.join("clip").join("clip_mel_chunks.npy")).unwrap();
        assert_eq!(stack.shape, vec![3, 40, 100]);
        assert!(stack.data.iter().all(|v| *v <= 0.0));
        // Each frame spans at most top_db below its own peak.
        for segment in stack.data.chunks(40 * 100) {
            for t in 0..100 {
                let column: Vec<f32> = (0..40).map(|m| segment[m * 100 + t]).collect();
                let max = column.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                let min = column.iter().cloned().fold(f32::INFINITY, f32::min);
                assert!(max - min <= 80.0 + 1e-3);
            }
        }

        let last = &result.rows[2];
        assert_eq!((last.start_frame, last.end_frame), (100, 200));
        assert_eq!(last.start_time_s, "1.000000");
        assert_eq!(last.end_time_s, "2.000000");
    }

    #[test]
    fn test_separate_mode_with_pad_last_and_extras() {
        let dir = TempDir::new().unwrap();
        let wav = dir.path().join("tone.wav");
        write_noise(&wav, SR, 20800);
        let out = dir.path().join("out");

        let mut config = small_config(&wav, &out);
        config.output.save_mode = SaveMode::Separate;
        config.output.dtype = NpyDtype::Float16;
        config.output.save_full_mel = true;
        config.output.png = true;
        config.output.save_individual_png = true;
        config.segment.pad_last = true;

        let extractor = MelExtractor::new(config).unwrap();
        let file_out = out.join("tone");
        let result = extractor.process_file(&wav, &file_out).unwrap();

        // 131 frames: aligned starts 0 and the tail at 31
        assert_eq!(result.n_frames, 131);
        let starts: Vec<usize> = result.rows.iter().map(|r| r.start_frame).collect();
        assert_eq!(starts, vec![0, 31]);

        let chunk = read_npy(file_out.join("tone_chunk0001.npy")).unwrap();
        assert_eq!(chunk.shape, vec![40, 100]);
        assert_eq!(chunk.dtype, NpyDtype::Float16);

        let full = read_npy(file_out.join("tone_mel_full.npy")).unwrap();
        assert_eq!(full.shape, vec![40, 131]);
        assert!(file_out.join("tone_mel.png").exists());
        assert!(file_out.join("tone_segment_0000.png").exists());
        assert!(file_out.join("tone_segment_0001.png").exists());
    }

    #[test]
    fn test_short_file_writes_no_stack() {
        let dir = TempDir::new().unwrap();
        let wav = dir.path().join("blip.wav");
        write_noise(&wav, SR, 3200);
        let out = dir.path().join("out");

        let extractor = MelExtractor::new(small_config(&wav, &out)).unwrap();
        let result = extractor.process_file(&wav, &out.join("blip")).unwrap();
        assert_eq!(result.segment_count(), 0);
        assert!(!out.join("blip").join("blip_mel_chunks.npy").exists());
    }

    #[test]
    fn test_batch_resamples_and_writes_index() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir_all(input.join("nested")).unwrap();
        write_noise(&input.join("a.wav"), SR, 32000);
        write_noise(&input.join("nested").join("b.wav"), 8000, 16000);
        std::fs::write(input.join("broken.wav"), b"nope").unwrap();
        let out = dir.path().join("out");

        let extractor = MelExtractor::new(small_config(&input, &out)).unwrap();
        let report = extractor.process_batch().unwrap();

        assert_eq!(report.stats, BatchStats { total: 3, processed: 2, skipped: 0, errors: 1 });
        assert_eq!(report.rows.len(), 6);
        assert!(out.join("b").join("b_mel_chunks.npy").exists());

        let index = std::fs::read_to_string(out.join("index.csv")).unwrap();
        assert_eq!(index.lines().count(), 7);
        assert!(index.lines().all(|l| l.split(',').count() == 15));
    }

    #[test]
    fn test_batch_without_wavs_fails() {
        let dir = TempDir::new().unwrap();
        let extractor = MelExtractor::new(small_config(dir.path(), &dir.path().join("out"))).unwrap();
        assert!(matches!(extractor.process_batch(), Err(PrepError::NoInput { .. })));
    }
}
