pub mod memory_audio_source;
pub mod wav_audio_source;
pub mod whisper_recognizer;
