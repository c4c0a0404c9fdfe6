/// Canvas geometry of a probed video.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
}

impl VideoMetadata {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
