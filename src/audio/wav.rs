//! WAV file audio source, for replaying recorded queries through the live pipeline.

use crate::audio::source::AudioSource;
use crate::defaults;
use crate::error::{Result, VoximError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Audio source that reads from WAV data.
///
/// Supports arbitrary sample rates and channel counts; everything is
/// down-mixed to mono and resampled to the target rate up front.
pub struct WavAudioSource {
    samples: Vec<i16>,
    position: usize,
    read_size: usize,
    sample_rate: u32,
}

impl WavAudioSource {
    /// Open a WAV file and convert it to 16kHz mono.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| VoximError::AudioCapture {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        Self::from_reader(Box::new(BufReader::new(file)))
    }

    /// Create from any reader, converting to 16kHz mono.
    pub fn from_reader(reader: Box<dyn Read + Send>) -> Result<Self> {
        Self::from_reader_at(reader, defaults::SAMPLE_RATE)
    }

    /// Create from any reader, converting to `target_rate` mono.
    pub fn from_reader_at(reader: Box<dyn Read + Send>, target_rate: u32) -> Result<Self> {
        let mut wav_reader =
            hound::WavReader::new(reader).map_err(|e| VoximError::AudioCapture {
                message: format!("Failed to parse WAV file: {}", e),
            })?;

        let spec = wav_reader.spec();
        let channels = spec.channels.max(1) as usize;

        let raw_samples: Vec<i16> = match spec.sample_format {
            hound::SampleFormat::Int => wav_reader
                .samples::<i16>()
                .collect::<std::result::Result<Vec<_>, _>>(),
            hound::SampleFormat::Float => wav_reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<Vec<_>, _>>(),
        }
        .map_err(|e| VoximError::AudioCapture {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

        let mono = downmix(&raw_samples, channels);
        let samples = resample(&mono, spec.sample_rate, target_rate);

        Ok(Self {
            samples,
            position: 0,
            read_size: defaults::chunk_samples(target_rate, defaults::CHUNK_MS),
            sample_rate: target_rate,
        })
    }

    /// Rate of the converted samples.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total converted samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl AudioSource for WavAudioSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.position >= self.samples.len() {
            return Ok(Vec::new());
        }

        let end = std::cmp::min(self.position + self.read_size, self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;

        Ok(chunk)
    }

    fn is_finite(&self) -> bool {
        true
    }
}

/// Average interleaved channels into one.
pub(crate) fn downmix(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
pub(crate) fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
