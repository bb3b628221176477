//! Content-addressed on-disk store with atomic, digest-verified writes.

use std::path::{Path, PathBuf};

use rand::RngCore;
use sha3::{Digest, Keccak256};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::error::StoreError;
use crate::magnet::shard_path;

/// Content-addressed store rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final on-disk path for `magnet`'s bytes.
    pub fn absolute_path(&self, magnet: &str) -> Result<PathBuf, StoreError> {
        let shards = shard_path(magnet)?;
        Ok(self.root.join(shards.join("/")))
    }

    /// Destination directory for `magnet`'s extracted content.
    pub fn unpack_path(&self, magnet: &str) -> Result<PathBuf, StoreError> {
        let shards = shard_path(magnet)?;
        Ok(self.root.join("unpacked").join(shards.join("/")))
    }

    /// Stream `content` into the store, verifying it hashes to `magnet`.
    ///
    /// Bytes are written to a uniquely-named sibling temp path while
    /// incrementally hashing with keccak-256. On a digest mismatch the temp
    /// file is removed and `StoreError::InvalidChecksum` is returned; on
    /// success the temp file is atomically renamed onto the final path,
    /// creating parent shard directories as needed. The temp file is always
    /// unlinked on failure paths, so a partial write is never observable at
    /// the final path.
    pub async fn store<R>(&self, magnet: &str, mut content: R) -> Result<PathBuf, StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let final_path = self.absolute_path(magnet)?;
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp_path = sibling_temp_path(&final_path);
        let result = write_and_hash(&tmp_path, &mut content).await;

        let checksum = match result {
            Ok(checksum) => checksum,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(e);
            }
        };

        if checksum != magnet {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::InvalidChecksum {
                magnet: magnet.to_string(),
                observed: checksum,
            });
        }

        fs::rename(&tmp_path, &final_path).await?;
        Ok(final_path)
    }
}

async fn write_and_hash<R>(tmp_path: &Path, content: &mut R) -> Result<String, StoreError>
where
    R: AsyncRead + Unpin,
{
    let mut file = fs::File::create(tmp_path).await?;
    let mut hasher = Keccak256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = content.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).await?;
        hasher.update(&buf[..n]);
    }
    file.flush().await?;
    Ok(hex::encode(hasher.finalize()))
}

/// Build an unpredictable sibling temp path for `final_path`.
fn sibling_temp_path(final_path: &Path) -> PathBuf {
    let suffix: u64 = rand::thread_rng().next_u64();
    let mut name = final_path.as_os_str().to_owned();
    name.push(format!(".tmp.{suffix:016x}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MAGNET: &str = "13600b294191fc92924bb3ce4b969c1e7e2bab8f4c93c3fc6d0a51733df3c060";

    #[tokio::test]
    async fn store_rejects_content_with_wrong_digest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        let err = store
            .store(MAGNET, Cursor::new(b"not the right bytes".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidChecksum { .. }));
        assert!(!store.absolute_path(MAGNET).unwrap().exists());
    }

    #[tokio::test]
    async fn store_installs_content_matching_its_own_digest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());

        let mut hasher = Keccak256::new();
        hasher.update(b"hello bundle");
        let magnet = hex::encode(hasher.finalize());

        let path = store
            .store(&magnet, Cursor::new(b"hello bundle".to_vec()))
            .await
            .unwrap();
        let bytes = tokio::fs::read(&path).await.unwrap();
        assert_eq!(bytes, b"hello bundle");

        let mut check = Keccak256::new();
        check.update(&bytes);
        assert_eq!(hex::encode(check.finalize()), magnet);
    }

    #[tokio::test]
    async fn failed_store_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        let _ = store
            .store(MAGNET, Cursor::new(b"garbage".to_vec()))
            .await
            .unwrap_err();

        let shard_dir = store.absolute_path(MAGNET).unwrap().parent().unwrap().to_path_buf();
        if shard_dir.exists() {
            let entries: Vec<_> = std::fs::read_dir(&shard_dir).unwrap().collect();
            assert!(entries.is_empty(), "temp file was not cleaned up");
        }
    }
}
