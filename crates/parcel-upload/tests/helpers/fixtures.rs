//! Test fixtures: picker selections of a given size.

use parcel_core::SelectedFile;

pub const MB: usize = 1024 * 1024;

pub fn file(name: &str, size: usize) -> SelectedFile {
    SelectedFile::new(name, vec![0xABu8; size])
}

/// `n` small PNGs named `photo-{i}.png`.
pub fn photos(n: usize) -> Vec<SelectedFile> {
    (0..n)
        .map(|i| file(&format!("photo-{}.png", i), 1024))
        .collect()
}
