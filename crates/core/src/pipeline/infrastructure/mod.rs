pub mod threaded_transcription_executor;
