use crate::shared::error::PipelineError;

/// Sequential reader over a mono 16-bit PCM stream.
pub trait AudioSource: Send {
    fn sample_rate(&self) -> u32;

    /// Total samples in the stream, if known up front.
    fn total_samples(&self) -> Option<usize>;

    /// Read up to `max_samples` samples. An empty result means end of stream.
    fn read_window(&mut self, max_samples: usize) -> Result<Vec<i16>, PipelineError>;
}
