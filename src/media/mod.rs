//! Media storage for Innsikt.
//!
//! One canonical addressing scheme: staged chunks live at
//! `<staging>/<session_id>/<index>.part`, assembled media objects at
//! `<media_dir>/<record_id>.<ext>`. Nothing probes alternative paths.

use crate::error::{InnsiktError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Filesystem-backed store for staged chunks and media objects.
pub struct MediaStore {
    staging_dir: PathBuf,
    media_dir: PathBuf,
    http: reqwest::Client,
}

impl MediaStore {
    /// Create a media store rooted at the given directories.
    pub fn new(staging_dir: PathBuf, media_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&staging_dir)?;
        std::fs::create_dir_all(&media_dir)?;

        Ok(Self {
            staging_dir,
            media_dir,
            http: reqwest::Client::new(),
        })
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.staging_dir.join(session_id)
    }

    fn chunk_path(&self, session_id: &str, index: u32) -> PathBuf {
        self.session_dir(session_id).join(format!("{}.part", index))
    }

    /// Path of the media object for a record.
    pub fn media_path(&self, record_id: Uuid, file_name: &str) -> PathBuf {
        self.media_dir
            .join(format!("{}.{}", record_id, extension_of(file_name)))
    }

    // ========================================================================
    // Chunk staging
    // ========================================================================

    /// Store one chunk, overwriting any previous bytes at the same index.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn write_chunk(&self, session_id: &str, index: u32, bytes: &[u8]) -> Result<()> {
        let dir = self.session_dir(session_id);
        tokio::fs::create_dir_all(&dir).await?;

        tokio::fs::write(self.chunk_path(session_id, index), bytes)
            .await
            .map_err(|e| InnsiktError::Storage(format!("Failed to write chunk {}: {}", index, e)))?;

        debug!("Stored chunk {} for session {}", index, session_id);
        Ok(())
    }

    /// Indices in `0..total_chunks` that are absent or empty on disk.
    pub async fn missing_chunks(&self, session_id: &str, total_chunks: u32) -> Result<Vec<u32>> {
        let mut missing = Vec::new();

        for index in 0..total_chunks {
            match tokio::fs::metadata(self.chunk_path(session_id, index)).await {
                Ok(meta) if meta.len() > 0 => {}
                _ => missing.push(index),
            }
        }

        Ok(missing)
    }

    /// Assemble a complete chunk set into `dest`.
    ///
    /// Chunks are read and appended in strict ascending index order, never
    /// arrival order. Returns the assembled byte count.
    #[instrument(skip(self))]
    pub async fn assemble(&self, session_id: &str, total_chunks: u32, dest: &Path) -> Result<u64> {
        let missing = self.missing_chunks(session_id, total_chunks).await?;
        if !missing.is_empty() {
            return Err(InnsiktError::MissingChunks(missing));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut assembled: Vec<u8> = Vec::new();
        for index in 0..total_chunks {
            let bytes = tokio::fs::read(self.chunk_path(session_id, index))
                .await
                .map_err(|e| {
                    InnsiktError::Storage(format!("Failed to read chunk {}: {}", index, e))
                })?;
            assembled.extend_from_slice(&bytes);
        }

        let total = assembled.len() as u64;
        tokio::fs::write(dest, assembled)
            .await
            .map_err(|e| InnsiktError::Storage(format!("Failed to write media object: {}", e)))?;

        info!(
            "Assembled {} chunks ({} bytes) into {:?}",
            total_chunks, total, dest
        );
        Ok(total)
    }

    /// Delete a session's staged chunks. Failure is logged, not fatal.
    pub async fn discard_session(&self, session_id: &str) {
        let dir = self.session_dir(session_id);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove staged chunks for {}: {}", session_id, e);
            }
        }
    }

    // ========================================================================
    // Media objects
    // ========================================================================

    /// Write a media object directly (single-shot create).
    pub async fn write_media(&self, dest: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, bytes)
            .await
            .map_err(|e| InnsiktError::Storage(format!("Failed to write media object: {}", e)))
    }

    /// Read a media object fully into memory.
    pub async fn read_media(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| InnsiktError::Storage(format!("Failed to read media {}: {}", path, e)))
    }

    /// Fetch remote media over http(s) into `dest`.
    ///
    /// Only http and https URLs are accepted.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_remote(&self, url: &str, dest: &Path) -> Result<u64> {
        let parsed = url::Url::parse(url)
            .map_err(|e| InnsiktError::InvalidInput(format!("Invalid media URL: {}", e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(InnsiktError::InvalidInput(format!(
                "Unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        info!("Fetching remote media");

        let response = self.http.get(parsed).send().await?;
        if !response.status().is_success() {
            return Err(InnsiktError::Storage(format!(
                "Remote media fetch failed with status {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        self.write_media(dest, &bytes).await?;

        Ok(bytes.len() as u64)
    }
}

/// File extension for a media object, defaulting to `bin`.
fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_store(dir: &Path) -> MediaStore {
        MediaStore::new(dir.join("staging"), dir.join("media")).unwrap()
    }

    #[tokio::test]
    async fn test_assemble_concatenates_in_index_order() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        // Write out of arrival order on purpose.
        store.write_chunk("abc", 2, &[3u8; 150]).await.unwrap();
        store.write_chunk("abc", 0, &[1u8; 100]).await.unwrap();
        store.write_chunk("abc", 1, &[2u8; 200]).await.unwrap();

        let dest = dir.path().join("media").join("out.bin");
        let total = store.assemble("abc", 3, &dest).await.unwrap();
        assert_eq!(total, 450);

        let bytes = std::fs::read(&dest).unwrap();
        assert_eq!(bytes.len(), 450);
        assert!(bytes[..100].iter().all(|b| *b == 1));
        assert!(bytes[100..300].iter().all(|b| *b == 2));
        assert!(bytes[300..].iter().all(|b| *b == 3));
    }

    #[tokio::test]
    async fn test_assemble_fails_naming_every_missing_index() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        store.write_chunk("abc", 1, b"present").await.unwrap();
        // Empty chunks count as missing.
        store.write_chunk("abc", 3, b"").await.unwrap();

        let dest = dir.path().join("media").join("out.bin");
        let err = store.assemble("abc", 5, &dest).await.unwrap_err();

        match err {
            InnsiktError::MissingChunks(missing) => {
                assert_eq!(missing, vec![0, 2, 3, 4]);
            }
            other => panic!("Expected MissingChunks, got {:?}", other),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_duplicate_chunk_overwrites() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        store.write_chunk("abc", 0, b"first").await.unwrap();
        store.write_chunk("abc", 0, b"second").await.unwrap();

        let dest = dir.path().join("media").join("out.bin");
        store.assemble("abc", 1, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_discard_session_is_quiet_when_absent() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        store.write_chunk("abc", 0, b"data").await.unwrap();
        store.discard_session("abc").await;
        store.discard_session("abc").await;

        let missing = store.missing_chunks("abc", 1).await.unwrap();
        assert_eq!(missing, vec![0]);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("call.MP3"), "mp3");
        assert_eq!(extension_of("recording.webm"), "webm");
        assert_eq!(extension_of("no_extension"), "bin");
    }
}
