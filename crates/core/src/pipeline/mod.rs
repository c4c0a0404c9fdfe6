pub mod generate_subtitles_use_case;
pub mod infrastructure;
pub mod transcription_executor;
