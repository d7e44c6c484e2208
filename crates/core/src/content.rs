use std::io::ErrorKind;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0} does not exist")]
    NotFound(PathBuf),
    #[error("permission denied for {0}")]
    PermissionDenied(PathBuf),
    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ContentError {
    fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => ContentError::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => ContentError::PermissionDenied(path.to_path_buf()),
            ErrorKind::InvalidData => ContentError::InvalidUtf8(path.to_path_buf()),
            _ => ContentError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

pub async fn read_text(path: &Path) -> Result<String, ContentError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ContentError::from_io(path, e))?;
    String::from_utf8(bytes).map_err(|_| ContentError::InvalidUtf8(path.to_path_buf()))
}

/// Byte range of the file as text. The range is clamped to the file length
/// and must fall on character boundaries.
pub async fn read_text_range(path: &Path, range: Range<usize>) -> Result<String, ContentError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ContentError::from_io(path, e))?;
    let end = range.end.min(bytes.len());
    let start = range.start.min(end);
    std::str::from_utf8(&bytes[start..end])
        .map(str::to_string)
        .map_err(|_| ContentError::InvalidUtf8(path.to_path_buf()))
}

/// Replace the whole file.
pub async fn write_text(path: &Path, text: &str) -> Result<(), ContentError> {
    tokio::fs::write(path, text)
        .await
        .map_err(|e| ContentError::from_io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_write_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sql");
        write_text(&path, "select 1;").await.unwrap();
        assert_eq!(read_text(&path).await.unwrap(), "select 1;");
        assert_eq!(read_text_range(&path, 7..100).await.unwrap(), "1;");
        assert_eq!(read_text_range(&path, 50..60).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_missing_and_binary_files_are_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        assert!(matches!(
            read_text(&missing).await,
            Err(ContentError::NotFound(_))
        ));

        let binary = dir.path().join("blob.bin");
        std::fs::write(&binary, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            read_text(&binary).await,
            Err(ContentError::InvalidUtf8(_))
        ));
    }

    #[tokio::test]
    async fn test_range_splitting_a_character_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u.txt");
        write_text(&path, "é").await.unwrap();
        assert!(matches!(
            read_text_range(&path, 0..1).await,
            Err(ContentError::InvalidUtf8(_))
        ));
    }
}
