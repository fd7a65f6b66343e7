//! WAV audio file processing

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use hound::{SampleFormat, WavReader, WavWriter};
use ndarray::{Array1, Array2, Axis};
use crate::error::{PrepError, Result};

/// On-disk sample encoding of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Int8,
    Int16,
    Int24,
    Int32,
    Float32,
}

impl AudioFormat {
    pub fn name(&self) -> &'static str {
        match self {
            AudioFormat::Int8 => "int8",
            AudioFormat::Int16 => "int16",
            AudioFormat::Int24 => "int24",
            AudioFormat::Int32 => "int32",
            AudioFormat::Float32 => "float32",
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        match self {
            AudioFormat::Int8 => 8,
            AudioFormat::Int16 => 16,
            AudioFormat::Int24 => 24,
            AudioFormat::Int32 | AudioFormat::Float32 => 32,
        }
    }

    pub fn to_sample_format(self) -> SampleFormat {
        match self {
            AudioFormat::Float32 => SampleFormat::Float,
            _ => SampleFormat::Int,
        }
    }

    pub fn from_spec(spec: &hound::WavSpec) -> Result<Self> {
        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => Ok(AudioFormat::Float32),
            (SampleFormat::Int, 8) => Ok(AudioFormat::Int8),
            (SampleFormat::Int, 16) => Ok(AudioFormat::Int16),
            (SampleFormat::Int, 24) => Ok(AudioFormat::Int24),
            (SampleFormat::Int, 32) => Ok(AudioFormat::Int32),
            (format, bits) => Err(PrepError::audio(format!(
                "Unsupported sample format: {:?} with {} bits", format, bits
            ))),
        }
    }

    /// Full-scale magnitude used to map integer samples into [-1.0, 1.0).
    fn full_scale(&self) -> f32 {
        (1u64 << (self.bits_per_sample() - 1)) as f32
    }
}

#[derive(Debug, Clone)]
pub struct AudioHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: AudioFormat,
    /// Frames per channel.
    pub total_samples: u32,
    pub duration: f64,
}

impl AudioHeader {
    pub fn new(sample_rate: u32, channels: u16, format: AudioFormat, total_samples: u32) -> Self {
        let duration = if sample_rate > 0 {
            total_samples as f64 / sample_rate as f64
        } else {
            0.0
        };

        Self {
            sample_rate,
            channels,
            format,
            total_samples,
            duration,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(PrepError::audio(format!("Invalid sample rate: {}", self.sample_rate)));
        }

        if self.channels == 0 {
            return Err(PrepError::audio("Channel count must be at least 1"));
        }

        Ok(())
    }

    pub fn to_wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.format.bits_per_sample(),
            sample_format: self.format.to_sample_format(),
        }
    }
}

/// Decoded samples, normalized to float.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioData {
    Mono(Array1<f32>),
    /// Rows are frames, columns are channels.
    MultiChannel(Array2<f32>),
}

impl AudioData {
    /// Number of frames.
    pub fn len(&self) -> usize {
        match self {
            AudioData::Mono(data) => data.len(),
            AudioData::MultiChannel(data) => data.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channels(&self) -> u16 {
        match self {
            AudioData::Mono(_) => 1,
            AudioData::MultiChannel(data) => data.ncols() as u16,
        }
    }

    /// Average of all channels.
    pub fn to_mono(&self) -> Array1<f32> {
        match self {
            AudioData::Mono(data) => data.clone(),
            AudioData::MultiChannel(data) => data
                .mean_axis(Axis(1))
                .unwrap_or_else(|| Array1::zeros(data.nrows())),
        }
    }

    /// Samples of one channel.
    pub fn channel(&self, index: usize) -> Option<Array1<f32>> {
        match self {
            AudioData::Mono(data) if index == 0 => Some(data.clone()),
            AudioData::Mono(_) => None,
            AudioData::MultiChannel(data) if index < data.ncols() => {
                Some(data.column(index).to_owned())
            }
            AudioData::MultiChannel(_) => None,
        }
    }

    fn from_interleaved(samples: Vec<f32>, channels: u16) -> Self {
        if channels == 1 {
            return AudioData::Mono(Array1::from(samples));
        }
        let channels = channels as usize;
        let frames = samples.len() / channels;
        let mut data = samples;
        data.truncate(frames * channels);
        // Interleaved samples are already row-major (frame, channel).
        AudioData::MultiChannel(
            Array2::from_shape_vec((frames, channels), data)
                .unwrap_or_else(|_| Array2::zeros((0, channels))),
        )
    }
}

#[derive(Debug, Clone)]
pub struct WavAudio {
    pub header: AudioHeader,
    pub data: AudioData,
}

impl WavAudio {
    /// Read only the header and report the sample rate.
    pub fn read_sample_rate<P: AsRef<Path>>(path: P) -> Result<u32> {
        let path = path.as_ref();
        let reader = WavReader::open(path).map_err(|e| {
            PrepError::audio(format!("Failed to read audio file {}: {}", path.display(), e))
        })?;
        Ok(reader.spec().sample_rate)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|e| {
            PrepError::audio(format!("Cannot open audio file {}: {}", path.display(), e))
        })?;

        let reader = WavReader::new(BufReader::new(file)).map_err(|e| {
            PrepError::audio(format!("Cannot read WAV file {}: {}", path.display(), e))
        })?;

        let spec = reader.spec();
        let format = AudioFormat::from_spec(&spec)?;

        let header = AudioHeader::new(
            spec.sample_rate,
            spec.channels,
            format,
            reader.len() / spec.channels.max(1) as u32,
        );
        header.validate()?;

        let samples: Vec<f32> = match format {
            AudioFormat::Float32 => reader
                .into_samples::<f32>()
                .map(|s| s.map_err(|e| PrepError::audio(format!("Failed to read sample: {}", e))))
                .collect::<Result<_>>()?,
            _ => {
                let scale = format.full_scale();
                reader
                    .into_samples::<i32>()
                    .map(|s| {
                        s.map(|v| v as f32 / scale)
                            .map_err(|e| PrepError::audio(format!("Failed to read sample: {}", e)))
                    })
                    .collect::<Result<_>>()?
            }
        };

        let data = AudioData::from_interleaved(samples, spec.channels);

        Ok(WavAudio { header, data })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PrepError::audio(format!("Cannot create output directory: {}", e))
            })?;
        }

        let spec = self.header.to_wav_spec();
        let mut writer = WavWriter::create(path, spec).map_err(|e| {
            PrepError::audio(format!("Cannot create output file {}: {}", path.display(), e))
        })?;

        let format = self.header.format;
        let mut write = |sample: f32| -> Result<()> {
            let result = match format {
                AudioFormat::Float32 => writer.write_sample(sample),
                _ => {
                    let scale = format.full_scale();
                    let value = (sample.clamp(-1.0, 1.0) * scale)
                        .round()
                        .clamp(-scale, scale - 1.0);
                    writer.write_sample(value as i32)
                }
            };
            result.map_err(|e| PrepError::audio(format!("Failed to write sample: {}", e)))
        };

        match &self.data {
            AudioData::Mono(data) => {
                for &sample in data.iter() {
                    write(sample)?;
                }
            }
            AudioData::MultiChannel(data) => {
                for &sample in data.iter() {
                    write(sample)?;
                }
            }
        }

        writer.finalize().map_err(|e| {
            PrepError::audio(format!("Failed to finalize WAV writing: {}", e))
        })?;

        Ok(())
    }

    pub fn new_mono(sample_rate: u32, data: Array1<f32>, format: AudioFormat) -> Self {
        let total_samples = data.len() as u32;
        let header = AudioHeader::new(sample_rate, 1, format, total_samples);

        WavAudio {
            header,
            data: AudioData::Mono(data),
        }
    }

    pub fn new_multichannel(sample_rate: u32, data: Array2<f32>, format: AudioFormat) -> Result<Self> {
        if data.ncols() < 2 {
            return Err(PrepError::audio("Multi-channel data needs at least 2 columns"));
        }

        let header = AudioHeader::new(sample_rate, data.ncols() as u16, format, data.nrows() as u32);

        Ok(WavAudio {
            header,
            data: AudioData::MultiChannel(data),
        })
    }

    /// Replace samples and rate, keeping format and channel layout.
    pub fn with_data(&self, sample_rate: u32, data: AudioData) -> Self {
        let header = AudioHeader::new(sample_rate, data.channels(), self.header.format, data.len() as u32);
        WavAudio { header, data }
    }

    pub fn data(&self) -> &AudioData {
        &self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.header.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.header.channels
    }

    pub fn total_samples(&self) -> u32 {
        self.header.total_samples
    }

    pub fn duration(&self) -> f64 {
        self.header.duration
    }

    pub fn format(&self) -> AudioFormat {
        self.header.format
    }
}
