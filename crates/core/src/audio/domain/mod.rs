pub mod audio_buffer;
pub mod audio_source;
pub mod speech_recognizer;
pub mod transcript;
