//! File intake: picks which selected files enter the session and normalizes them.

use parcel_core::{FileRecord, SelectedFile, UploadStatus};

/// Decide which files enter the session.
///
/// The primary selection is trusted as-is; the picker has already applied
/// its own count limit. When it is empty, every file was rejected by the
/// picker for exceeding the count limit of one gesture, so up to
/// `remaining_quota` of those are recovered and the rest dropped.
pub fn select_files(
    selected: Vec<SelectedFile>,
    rejected_by_selector_limit: Vec<SelectedFile>,
    remaining_quota: usize,
) -> Vec<SelectedFile> {
    if !selected.is_empty() {
        return selected;
    }

    let available = rejected_by_selector_limit.len();
    let recovered: Vec<SelectedFile> = rejected_by_selector_limit
        .into_iter()
        .take(remaining_quota)
        .collect();

    if recovered.len() < available {
        tracing::debug!(
            recovered = recovered.len(),
            dropped = available - recovered.len(),
            remaining_quota,
            "Truncated over-selection to remaining quota"
        );
    }

    recovered
}

/// Select and normalize files into records with fresh ids.
pub fn intake(
    selected: Vec<SelectedFile>,
    rejected_by_selector_limit: Vec<SelectedFile>,
    remaining_quota: usize,
) -> Vec<FileRecord> {
    select_files(selected, rejected_by_selector_limit, remaining_quota)
        .into_iter()
        .map(FileRecord::prepare)
        .collect()
}

/// Status a record enters the registry with.
///
/// Oversized files are rejected here, before any network call, and stay in
/// the session with that marker until the user removes them.
pub fn initial_status(record: &FileRecord, max_file_size_bytes: u64) -> UploadStatus {
    if record.exceeds(max_file_size_bytes) {
        UploadStatus::SizeRejected
    } else {
        UploadStatus::Pending
    }
}
