//! Batch Processing Pipelines

pub mod collect;
pub mod common;
pub mod segment;
pub mod mel_extractor;
pub mod resampler;

pub use collect::{collect_wavs, is_wav, mirrored_dir};
pub use common::{load_mono, BatchStats};
pub use segment::{segment_mel, seconds_to_frames, MelSegmenter, MelSegments, SegmentConfig};
pub use mel_extractor::{MelBatchReport, MelExtractor, MelFileResult};
pub use resampler::{decide, format_khz, Action, BatchReport, Decision, ResampleOutcome, ResampleProcessor};
