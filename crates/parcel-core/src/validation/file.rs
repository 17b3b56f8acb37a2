//! File metadata helpers used at intake and for display.

use std::path::Path;

use crate::error::AppError;
use crate::models::FileKind;

/// Lowercase extension without the dot, or an empty string.
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Guess a MIME type from the file name, falling back to `application/octet-stream`.
pub fn detect_mime_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Normalize MIME type by stripping parameters (e.g. "image/jpeg; charset=utf-8" -> "image/jpeg").
fn normalize_mime_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or(content_type)
}

/// Classify a file. The MIME type wins; the extension is consulted when the
/// MIME type is generic (e.g. `application/octet-stream`).
pub fn detect_kind(mime_type: &str, extension: &str) -> FileKind {
    let normalized = normalize_mime_type(mime_type).to_lowercase();
    if normalized.starts_with("image/") {
        return FileKind::Image;
    }
    if normalized.starts_with("video/") {
        return FileKind::Video;
    }

    if !extension.is_empty() {
        let guessed = mime_guess::from_ext(extension).first_raw().unwrap_or("");
        if guessed.starts_with("image/") {
            return FileKind::Image;
        }
        if guessed.starts_with("video/") {
            return FileKind::Video;
        }
    }

    FileKind::Document
}

/// Validate file size
pub fn validate_file_size(file_size: u64, max_size: u64) -> Result<(), AppError> {
    if file_size > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File size exceeds maximum allowed size of {} MB",
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Human-readable size, e.g. `512 B`, `14.2 KB`, `2.0 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else {
        format!("{:.1} GB", b / GB)
    }
}

/// Shorten a file name to `max_chars`, keeping the extension visible
/// (`a-very-long-name.pdf` -> `a-very...pdf`).
pub fn short_file_name(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }

    let extension = file_extension(name);
    let tail = if extension.is_empty() {
        String::new()
    } else {
        format!(".{}", extension)
    };
    let keep = max_chars.saturating_sub(tail.chars().count() + 3);
    let head: String = name.chars().take(keep).collect();
    format!("{}...{}", head, tail.trim_start_matches('.'))
}
