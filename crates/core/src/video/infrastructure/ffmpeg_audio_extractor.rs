use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::shared::constants::{PCM_BITS_PER_SAMPLE, PCM_CHANNELS, PCM_SAMPLE_RATE};
use crate::shared::error::PipelineError;
use crate::video::domain::audio_extractor::{AudioExtractor, ExtractionLimits};

type WavWriter = hound::WavWriter<BufWriter<File>>;

enum Outcome {
    Finished,
    Cancelled,
    TimedOut,
}

/// Decodes the best audio stream with ffmpeg-next, resamples it to mono
/// 16-bit 16 kHz and streams the samples into a WAV file.
pub struct FfmpegAudioExtractor;

impl AudioExtractor for FfmpegAudioExtractor {
    fn extract(
        &self,
        video_path: &Path,
        output_path: &Path,
        limits: &ExtractionLimits<'_>,
    ) -> Result<(), PipelineError> {
        let start = Instant::now();
        let result = decode_to_wav(video_path, output_path, limits);

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                remove_partial(output_path);
                return Err(PipelineError::extraction(video_path, e));
            }
        };

        match outcome {
            Outcome::Finished => {
                log::info!(
                    "Audio extraction completed in {:.2} seconds",
                    start.elapsed().as_secs_f64()
                );
                Ok(())
            }
            Outcome::Cancelled => {
                remove_partial(output_path);
                Err(PipelineError::Cancelled)
            }
            Outcome::TimedOut => {
                remove_partial(output_path);
                Err(PipelineError::TimedOut {
                    stage: "audio extraction",
                })
            }
        }
    }
}

fn decode_to_wav(
    video_path: &Path,
    output_path: &Path,
    limits: &ExtractionLimits<'_>,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    ffmpeg_next::init()?;

    let mut ictx = ffmpeg_next::format::input(video_path)?;

    let audio_stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Audio)
        .ok_or("no audio stream found")?;

    let audio_stream_index = audio_stream.index();
    let codec_ctx =
        ffmpeg_next::codec::context::Context::from_parameters(audio_stream.parameters())?;
    let mut decoder = codec_ctx.decoder().audio()?;

    let mut resampler = ffmpeg_next::software::resampling::Context::get(
        decoder.format(),
        decoder.channel_layout(),
        decoder.rate(),
        ffmpeg_next::format::Sample::I16(ffmpeg_next::format::sample::Type::Packed),
        ffmpeg_next::ChannelLayout::MONO,
        PCM_SAMPLE_RATE,
    )?;

    let spec = hound::WavSpec {
        channels: PCM_CHANNELS,
        sample_rate: PCM_SAMPLE_RATE,
        bits_per_sample: PCM_BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output_path, spec)?;

    let mut decoded_frame = ffmpeg_next::util::frame::audio::Audio::empty();
    let mut resampled_frame = ffmpeg_next::util::frame::audio::Audio::empty();

    for (stream, packet) in ictx.packets() {
        if limits.cancelled.load(Ordering::Relaxed) {
            return Ok(Outcome::Cancelled);
        }
        if limits.deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(Outcome::TimedOut);
        }
        if stream.index() != audio_stream_index {
            continue;
        }

        decoder.send_packet(&packet)?;

        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            resampler.run(&decoded_frame, &mut resampled_frame)?;
            write_i16_samples(&resampled_frame, &mut writer)?;
        }
    }

    // Flush the decoder
    decoder.send_eof()?;
    while decoder.receive_frame(&mut decoded_frame).is_ok() {
        resampler.run(&decoded_frame, &mut resampled_frame)?;
        write_i16_samples(&resampled_frame, &mut writer)?;
    }

    // Flush the resampler (may have buffered samples)
    if let Ok(Some(delay)) = resampler.flush(&mut resampled_frame) {
        if delay.output > 0 {
            write_i16_samples(&resampled_frame, &mut writer)?;
        }
    }

    writer.finalize()?;
    Ok(Outcome::Finished)
}

/// Write samples from a packed mono i16 resampled frame.
fn write_i16_samples(
    frame: &ffmpeg_next::util::frame::audio::Audio,
    writer: &mut WavWriter,
) -> Result<(), hound::Error> {
    let num_samples = frame.samples();
    if num_samples == 0 {
        return Ok(());
    }
    let data = frame.data(0);
    let samples = unsafe { std::slice::from_raw_parts(data.as_ptr() as *const i16, num_samples) };
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    Ok(())
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Failed to remove partial audio {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tempfile::TempDir;

    #[test]
    fn test_extract_nonexistent_file() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("audio.wav");
        let cancelled = AtomicBool::new(false);
        let limits = ExtractionLimits {
            deadline: None,
            cancelled: &cancelled,
        };

        let result = FfmpegAudioExtractor.extract(
            Path::new("/nonexistent/file.mp4"),
            &output,
            &limits,
        );
        assert!(matches!(result, Err(PipelineError::Extraction { .. })));
        assert!(!output.exists());
    }

    #[test]
    fn test_extract_non_media_file() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("notes.mp4");
        std::fs::write(&input, b"this is not a video").unwrap();
        let output = tmp.path().join("audio.wav");
        let cancelled = AtomicBool::new(false);
        let limits = ExtractionLimits {
            deadline: None,
            cancelled: &cancelled,
        };

        let result = FfmpegAudioExtractor.extract(&input, &output, &limits);
        assert!(matches!(result, Err(PipelineError::Extraction { .. })));
        assert!(!output.exists());
    }
}
