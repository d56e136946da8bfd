//! Shared test utilities for creating temporary files.
//!
//! The file-mapped memory provider is exercised through these helpers.

use std::io::Write;

use imagelens::MappedFile;
use tempfile::NamedTempFile;

/// Creates a temporary file with the given content.
///
/// The file is removed when the returned `NamedTempFile` is dropped.
///
/// # Arguments
///
/// * `content` - The content to write to the temporary file
///
/// # Panics
///
/// Panics if the temporary file cannot be created or if writing to it fails
pub fn create_temp_file(content: &[u8]) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Writes `content` to a temporary file and maps it at `base`.
///
/// The temporary file is returned alongside the mapping so it outlives it.
///
/// # Panics
///
/// Panics if the file cannot be created or mapped
pub fn map_temp_file(content: &[u8], base: u64) -> (NamedTempFile, MappedFile) {
    let temp_file = create_temp_file(content);
    let mapped = MappedFile::open(temp_file.path(), base).unwrap();
    (temp_file, mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_create_temp_file() {
        let content = b"hello world";
        let temp_file = create_temp_file(content);

        let path = temp_file.path();
        assert!(path.exists());
        assert_eq!(fs::read(path).unwrap(), content);
    }
}
