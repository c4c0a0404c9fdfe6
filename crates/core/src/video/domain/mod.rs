pub mod audio_extractor;
pub mod video_prober;
