pub mod ass_file_writer;
