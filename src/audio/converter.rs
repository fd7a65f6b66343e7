//! Audio Format Converter - down-mixing and sample-rate conversion

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use crate::audio::resample::{rational_ratio, resample_channel};
use crate::audio::{AudioData, WavAudio};
use crate::error::{PrepError, Result};

/// How multi-channel audio is folded into one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MonoStrategy {
    /// Average of all channels
    #[default]
    Mean,
    /// Keep channel 0
    First,
}

pub struct AudioConverter;

impl AudioConverter {
    pub fn to_mono(data: &AudioData, strategy: MonoStrategy) -> Array1<f32> {
        match (data, strategy) {
            (AudioData::Mono(d), _) => d.clone(),
            (AudioData::MultiChannel(_), MonoStrategy::Mean) => data.to_mono(),
            (AudioData::MultiChannel(d), MonoStrategy::First) => d.column(0).to_owned(),
        }
    }

    /// Resample every channel from `sample_rate` to `target_sample_rate`.
    ///
    /// Equal rates return the data untouched.
    pub fn resample_data(data: &AudioData, sample_rate: u32, target_sample_rate: u32) -> Result<AudioData> {
        if sample_rate == 0 {
            return Err(PrepError::audio(format!("Invalid sample rate: {}", sample_rate)));
        }
        if target_sample_rate == 0 {
            return Err(PrepError::audio(format!("Invalid target sample rate: {}", target_sample_rate)));
        }
        if sample_rate == target_sample_rate {
            return Ok(data.clone());
        }

        let (up, down) = rational_ratio(sample_rate, target_sample_rate);
        log::debug!("Resampling from {}Hz to {}Hz using ratio {}:{}", sample_rate, target_sample_rate, up, down);

        let resampled = match data {
            AudioData::Mono(d) => {
                AudioData::Mono(Array1::from(Self::resample_column(d.view(), sample_rate, target_sample_rate)?))
            }
            AudioData::MultiChannel(d) => {
                let channels = d
                    .columns()
                    .into_iter()
                    .map(|column| Self::resample_column(column, sample_rate, target_sample_rate))
                    .collect::<Result<Vec<_>>>()?;
                let frames = channels.first().map_or(0, Vec::len);
                let mut out = Array2::zeros((frames, channels.len()));
                for (c, samples) in channels.into_iter().enumerate() {
                    out.column_mut(c).assign(&Array1::from(samples));
                }
                AudioData::MultiChannel(out)
            }
        };

        Ok(resampled)
    }

    pub fn convert_sample_rate(audio: &WavAudio, target_sample_rate: u32) -> Result<WavAudio> {
        if audio.sample_rate() == target_sample_rate {
            return Ok(audio.clone());
        }
        let data = Self::resample_data(audio.data(), audio.sample_rate(), target_sample_rate)?;
        Ok(audio.with_data(target_sample_rate, data))
    }

    fn resample_column(samples: ArrayView1<f32>, sample_rate: u32, target_sample_rate: u32) -> Result<Vec<f32>> {
        match samples.as_slice() {
            Some(slice) => resample_channel(slice, sample_rate, target_sample_rate),
            None => resample_channel(&samples.to_vec(), sample_rate, target_sample_rate),
        }
    }
}
