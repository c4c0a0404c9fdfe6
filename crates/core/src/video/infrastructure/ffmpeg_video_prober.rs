use std::path::Path;

use crate::shared::error::PipelineError;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_prober::VideoProber;

/// Reads the best video stream's dimensions via ffmpeg-next.
pub struct FfmpegVideoProber;

impl VideoProber for FfmpegVideoProber {
    fn probe(&self, video_path: &Path) -> Result<VideoMetadata, PipelineError> {
        probe_dimensions(video_path)
            .map(|(width, height)| VideoMetadata::new(width, height))
            .map_err(|e| PipelineError::probe(video_path, e))
    }
}

fn probe_dimensions(path: &Path) -> Result<(u32, u32), Box<dyn std::error::Error>> {
    ffmpeg_next::init()?;

    let ictx = ffmpeg_next::format::input(path)?;

    let stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or("No video stream found")?;

    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
    let decoder = codec_ctx.decoder().video()?;

    let (width, height) = (decoder.width(), decoder.height());
    if width == 0 || height == 0 {
        return Err(format!("invalid dimensions {width}x{height}").into());
    }
    Ok((width, height))
}
