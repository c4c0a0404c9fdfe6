use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::audio::domain::audio_source::AudioSource;
use crate::shared::constants::{PCM_BITS_PER_SAMPLE, PCM_CHANNELS, PCM_SAMPLE_RATE};
use crate::shared::error::PipelineError;

/// Reads windows of samples from a mono 16-bit 16 kHz WAV file via hound.
pub struct WavAudioSource {
    reader: hound::WavReader<BufReader<File>>,
    path: PathBuf,
    total: usize,
}

impl WavAudioSource {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let reader = hound::WavReader::open(path).map_err(|e| PipelineError::audio(path, e))?;
        let spec = reader.spec();

        if spec.channels != PCM_CHANNELS
            || spec.bits_per_sample != PCM_BITS_PER_SAMPLE
            || spec.sample_format != hound::SampleFormat::Int
            || spec.sample_rate != PCM_SAMPLE_RATE
        {
            return Err(PipelineError::audio(
                path,
                format!(
                    "expected mono 16-bit {PCM_SAMPLE_RATE} Hz PCM, got {} channel(s) {}-bit {} Hz",
                    spec.channels, spec.bits_per_sample, spec.sample_rate
                ),
            ));
        }

        let total = reader.duration() as usize;
        Ok(Self {
            reader,
            path: path.to_path_buf(),
            total,
        })
    }
}

impl AudioSource for WavAudioSource {
    fn sample_rate(&self) -> u32 {
        self.reader.spec().sample_rate
    }

    fn total_samples(&self) -> Option<usize> {
        Some(self.total)
    }

    fn read_window(&mut self, max_samples: usize) -> Result<Vec<i16>, PipelineError> {
        self.reader
            .samples::<i16>()
            .take(max_samples)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PipelineError::audio(&self.path, e))
    }
}
