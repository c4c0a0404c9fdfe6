use crate::audio::domain::audio_source::AudioSource;
use crate::shared::error::PipelineError;

/// Serves PCM samples already held in memory.
pub struct MemoryAudioSource {
    samples: Vec<i16>,
    sample_rate: u32,
    position: usize,
}

impl MemoryAudioSource {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            position: 0,
        }
    }
}

impl AudioSource for MemoryAudioSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_samples(&self) -> Option<usize> {
        Some(self.samples.len())
    }

    fn read_window(&mut self, max_samples: usize) -> Result<Vec<i16>, PipelineError> {
        let end = (self.position + max_samples).min(self.samples.len());
        let window = self.samples[self.position..end].to_vec();
        self.position = end;
        Ok(window)
    }
}
