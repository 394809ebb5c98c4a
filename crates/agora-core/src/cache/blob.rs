use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Longest hex-encoded key used verbatim as a file name. Longer keys are
/// hashed so the name stays under the 255-byte filesystem limit.
const MAX_ENCODED_NAME: usize = 200;

/// Key/value store for arbitrary binary payloads (images and the like).
///
/// Each blob is one file named after the hex encoding of its key, or a blake3
/// digest of the key when the encoding would be too long. Writes go
/// through a temporary file and a rename, so concurrent `set` calls on the
/// same name are last-write-wins and readers never see a torn payload.
/// Nothing is evicted implicitly.
pub struct BlobCache {
    blob_dir: PathBuf,
}

impl BlobCache {
    pub fn new(blob_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&blob_dir)
            .with_context(|| format!("Failed to create blob dir {}", blob_dir.display()))?;
        let cache = Self { blob_dir };
        cache.remove_stale_temp_files();
        Ok(cache)
    }

    /// Drop temp files a crashed writer left behind.
    fn remove_stale_temp_files(&self) {
        let Ok(entries) = std::fs::read_dir(&self.blob_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "tmp") {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove stale temp blob");
                }
            }
        }
    }

    fn file_name(name: &str) -> String {
        let encoded = hex::encode(name);
        if encoded.len() <= MAX_ENCODED_NAME {
            format!("{}.bin", encoded)
        } else {
            format!("h-{}.bin", blake3::hash(name.as_bytes()).to_hex())
        }
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.blob_dir.join(Self::file_name(name))
    }

    pub async fn set(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.blob_path(name);
        let tmp = path.with_extension(format!("{:016x}.tmp", rand::random::<u64>()));
        let written = match tokio::fs::write(&tmp, bytes).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("Failed to store blob: {}", name));
        }
        debug!(blob = name, size = bytes.len(), "Stored blob");
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.blob_path(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read blob: {}", name)),
        }
    }

    /// Remove a blob. Deleting a missing blob is not an error.
    pub async fn delete(&self, name: &str) -> Result<()> {
        match tokio::fs::remove_file(self.blob_path(name)).await {
            Ok(()) => {
                debug!(blob = name, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete blob: {}", name)),
        }
    }

    pub async fn contains(&self, name: &str) -> bool {
        tokio::fs::try_exists(self.blob_path(name))
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use tempfile::TempDir;

    fn create_test_cache() -> (BlobCache, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = BlobCache::new(temp_dir.path().join("blobs")).expect("Failed to create cache");
        (cache, temp_dir)
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let (cache, _dir) = create_test_cache();
        let bytes = b"hello blob".to_vec();

        cache.set("t.txt", &bytes).await.unwrap();
        assert_eq!(cache.get("t.txt").await.unwrap(), Some(bytes));
        assert!(cache.contains("t.txt").await);

        cache.delete("t.txt").await.unwrap();
        assert_eq!(cache.get("t.txt").await.unwrap(), None);
        assert!(!cache.contains("t.txt").await);
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let (cache, _dir) = create_test_cache();
        assert!(cache.delete("never-set").await.is_ok());
    }

    #[tokio::test]
    async fn test_names_with_separators_stay_inside_dir() {
        let (cache, dir) = create_test_cache();
        cache.set("../escape/../x.png", b"x").await.unwrap();
        assert_eq!(cache.get("../escape/../x.png").await.unwrap(), Some(b"x".to_vec()));
        assert!(!dir.path().join("x.png").exists());
    }

    #[tokio::test]
    async fn test_long_names_are_hashed() {
        let (cache, dir) = create_test_cache();
        let long = "https://cdn.example.org/".to_string() + &"a".repeat(400);
        cache.set(&long, b"poster").await.unwrap();
        assert_eq!(cache.get(&long).await.unwrap(), Some(b"poster".to_vec()));

        let names: Vec<String> = std::fs::read_dir(dir.path().join("blobs"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("h-"));
        assert!(names[0].len() < 255);

        cache.delete(&long).await.unwrap();
        assert!(!cache.contains(&long).await);
    }

    #[test]
    fn test_short_names_keep_hex_file_name() {
        assert_eq!(BlobCache::file_name("img"), "696d67.bin");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_file() {
        let (cache, dir) = create_test_cache();
        let blobs = dir.path().join("blobs");
        // A directory at the target path makes the rename fail.
        std::fs::create_dir(blobs.join(BlobCache::file_name("taken"))).unwrap();

        assert!(cache.set("taken", b"x").await.is_err());
        let leftovers = std::fs::read_dir(&blobs)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_new_clears_stale_temp_files() {
        let (_cache, dir) = create_test_cache();
        let blobs = dir.path().join("blobs");
        std::fs::write(blobs.join("6869.00000000000000ab.tmp"), b"partial").unwrap();
        std::fs::write(blobs.join("6869.bin"), b"whole").unwrap();

        let cache = BlobCache::new(blobs.clone()).unwrap();
        assert_eq!(std::fs::read_dir(&blobs).unwrap().count(), 1);
        assert_eq!(cache.get("hi").await.unwrap(), Some(b"whole".to_vec()));
    }

    #[tokio::test]
    async fn test_overwrite_is_last_write_wins() {
        let (cache, _dir) = create_test_cache();
        cache.set("img", b"first").await.unwrap();
        cache.set("img", b"second").await.unwrap();
        assert_eq!(cache.get("img").await.unwrap(), Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn test_concurrent_sets_leave_one_whole_payload() {
        let (cache, _dir) = create_test_cache();
        let cache = Arc::new(cache);
        let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 4096]).collect();

        let handles: Vec<_> = payloads
            .iter()
            .cloned()
            .map(|p| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.set("shared", &p).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = cache.get("shared").await.unwrap().unwrap();
        assert!(payloads.contains(&stored));
    }
}
