pub mod subtitle_document;
pub mod subtitle_synthesizer;
pub mod subtitle_writer;
