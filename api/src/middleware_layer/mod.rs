pub mod raw_file_guard;
