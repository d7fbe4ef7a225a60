use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("compression error: {0}")]
    Compression(String),
}

/// Write bytes to a file, creating parent directories as needed.
pub async fn save_to_file(
    data: impl AsRef<[u8]>,
    path: impl AsRef<Path>,
) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, data.as_ref()).await?;
    Ok(())
}

/// Read a whole file.
pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Vec<u8>, PersistenceError> {
    Ok(tokio::fs::read(path.as_ref()).await?)
}

/// Append one line to a file, creating it (and parent directories) if absent.
pub async fn append_line(
    line: impl AsRef<str>,
    path: impl AsRef<Path>,
) -> Result<(), PersistenceError> {
    use tokio::io::AsyncWriteExt;

    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_ref().as_bytes()).await?;
    file.write_all(b"\n").await?;
    file.flush().await?;
    Ok(())
}

/// Compress data with zstd at the default level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, PersistenceError> {
    zstd::encode_all(data, 0).map_err(|e| PersistenceError::Compression(e.to_string()))
}

/// Decompress zstd data.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, PersistenceError> {
    zstd::decode_all(data).map_err(|e| PersistenceError::Compression(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("maestro-test-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let path = temp_path("data.json");
        save_to_file(b"hello", &path).await.unwrap();
        let loaded = load_from_file(&path).await.unwrap();
        assert_eq!(loaded, b"hello");
    }

    #[tokio::test]
    async fn test_append_line_accumulates() {
        let path = temp_path("log.jsonl");
        append_line("{\"a\":1}", &path).await.unwrap();
        append_line("{\"a\":2}", &path).await.unwrap();
        let content = String::from_utf8(load_from_file(&path).await.unwrap()).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_compress_roundtrip() {
        let data = b"abcabcabcabcabcabc".repeat(64);
        let compressed = compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed).unwrap(), data);
    }
}
