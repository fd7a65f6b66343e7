//! Audio Processing Module
//!
//! WAV reading and writing, down-mixing, FFT resampling and log-mel
//! spectrogram extraction.

pub mod wav;
pub mod converter;
pub mod mel;
pub mod resample;

pub use wav::{WavAudio, AudioFormat, AudioHeader, AudioData};
pub use converter::{AudioConverter, MonoStrategy};
pub use mel::{DbClipScope, MelConfig, MelSpectrogram};
pub use resample::resample_channel;
