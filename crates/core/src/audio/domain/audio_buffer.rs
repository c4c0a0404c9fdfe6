/// One recognition window: mono 16-bit PCM tagged with its position in the stream.
///
/// The sequence index is assigned when the stream is split and is the only
/// thing used to restore order after concurrent recognition.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    index: usize,
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(index: usize, samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            index,
            samples,
            sample_rate,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples normalized to [-1.0, 1.0).
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|&s| s as f32 / 32768.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_keeps_index_and_samples() {
        let buf = AudioBuffer::new(4, vec![1, 2, 3], 16000);
        assert_eq!(buf.index(), 4);
        assert_eq!(buf.samples(), &[1, 2, 3]);
        assert_eq!(buf.sample_rate(), 16000);
        assert_eq!(buf.len(), 3);
        assert!(!buf.is_empty());
    }

    #[test]
    fn test_duration_of_full_chunk() {
        let buf = AudioBuffer::new(0, vec![0; 40_000], 16000);
        assert_relative_eq!(buf.duration(), 2.5);
    }

    #[test]
    fn test_to_f32_range() {
        let buf = AudioBuffer::new(0, vec![0, i16::MAX, i16::MIN], 16000);
        let floats = buf.to_f32();
        assert_relative_eq!(floats[0], 0.0);
        assert!(floats[1] < 1.0 && floats[1] > 0.999);
        assert_relative_eq!(floats[2], -1.0);
    }
}
