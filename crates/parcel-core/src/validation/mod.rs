//! Validation modules

pub mod file;

pub use file::{
    detect_kind, detect_mime_type, file_extension, format_file_size, short_file_name,
    validate_file_size,
};
