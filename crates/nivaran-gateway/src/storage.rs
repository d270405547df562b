use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{GatewayError, GatewayResult};

/// Upload rules for one bucket.
#[derive(Debug, Clone)]
pub struct BucketPolicy {
    pub max_bytes: usize,
    /// `None` accepts any content type.
    pub allowed_types: Option<Vec<String>>,
}

impl BucketPolicy {
    pub fn images(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            allowed_types: Some(
                ["image/jpeg", "image/jpg", "image/png", "image/webp"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ),
        }
    }

    pub fn any(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            allowed_types: None,
        }
    }

    fn check(&self, size: usize, content_type: &str) -> GatewayResult<()> {
        if size == 0 {
            return Err(GatewayError::Rejected("empty object".into()));
        }
        if size > self.max_bytes {
            return Err(GatewayError::Rejected(format!(
                "object is {} bytes, limit is {}",
                size, self.max_bytes
            )));
        }
        if let Some(allowed) = &self.allowed_types {
            if !allowed.iter().any(|t| t == content_type) {
                return Err(GatewayError::Rejected(format!("content type '{}' not allowed", content_type)));
            }
        }
        Ok(())
    }
}

/// What `put` wrote.
#[derive(Debug, Clone)]
pub struct PutResult {
    pub size: u64,
    pub sha256: String,
}

/// Object buckets on local disk.
///
/// Each object is stored at `{dir}/{bucket}/{path}`. Paths are relative and
/// may contain `/` separators but never `..`.
pub struct Storage {
    dir: PathBuf,
    public_base_url: String,
    buckets: HashMap<String, BucketPolicy>,
}

impl Storage {
    pub async fn new(dir: PathBuf, public_base_url: String, buckets: HashMap<String, BucketPolicy>) -> GatewayResult<Self> {
        for bucket in buckets.keys() {
            fs::create_dir_all(dir.join(bucket)).await?;
        }
        info!("Object storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            buckets,
        })
    }

    /// Public URL for an object, whether or not it exists.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.public_base_url, bucket, path)
    }

    /// Validate against the bucket policy and write. Fails if the object exists.
    pub async fn put(&self, bucket: &str, path: &str, bytes: &Bytes, content_type: &str) -> GatewayResult<PutResult> {
        let policy = self
            .buckets
            .get(bucket)
            .ok_or_else(|| GatewayError::NotFound(format!("bucket '{}'", bucket)))?;
        policy.check(bytes.len(), content_type)?;

        let file_path = self.object_path(bucket, path)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&file_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(GatewayError::Conflict(format!("{}/{} already exists", bucket, path)));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(bytes).await?;
        file.flush().await?;

        let mut hasher = Sha256::new();
        hasher.update(bytes);

        Ok(PutResult {
            size: bytes.len() as u64,
            sha256: hex::encode(hasher.finalize()),
        })
    }

    pub async fn read(&self, bucket: &str, path: &str) -> GatewayResult<Bytes> {
        let file_path = self.object_path(bucket, path)?;
        match fs::read(&file_path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GatewayError::NotFound(format!("{}/{}", bucket, path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, bucket: &str, path: &str) -> GatewayResult<()> {
        let file_path = self.object_path(bucket, path)?;
        match fs::remove_file(&file_path).await {
            Ok(()) => {
                info!("Deleted object {}/{}", bucket, path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Object {}/{} already gone", bucket, path);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn object_path(&self, bucket: &str, path: &str) -> GatewayResult<PathBuf> {
        if !self.buckets.contains_key(bucket) {
            return Err(GatewayError::NotFound(format!("bucket '{}'", bucket)));
        }
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(GatewayError::Rejected(format!("invalid object path '{}'", path)));
        }
        Ok(self.dir.join(bucket).join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage(dir: &Path) -> Storage {
        let mut buckets = HashMap::new();
        buckets.insert("post-images".to_string(), BucketPolicy::images(16));
        buckets.insert("chat-attachments".to_string(), BucketPolicy::any(16));
        Storage::new(dir.to_path_buf(), "http://localhost:3000/".into(), buckets)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn put_then_read() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path()).await;

        let data = Bytes::from_static(b"jpegdata");
        let put = storage.put("post-images", "u1/1-0-a.jpg", &data, "image/jpeg").await.unwrap();
        assert_eq!(put.size, 8);
        assert_eq!(put.sha256.len(), 64);
        assert_eq!(storage.read("post-images", "u1/1-0-a.jpg").await.unwrap(), data);
        assert_eq!(
            storage.public_url("post-images", "u1/1-0-a.jpg"),
            "http://localhost:3000/storage/v1/object/public/post-images/u1/1-0-a.jpg"
        );
    }

    #[tokio::test]
    async fn rejects_policy_violations() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path()).await;

        let too_big = Bytes::from(vec![0u8; 17]);
        assert!(matches!(
            storage.put("post-images", "a.png", &too_big, "image/png").await,
            Err(GatewayError::Rejected(_))
        ));
        assert!(matches!(
            storage.put("post-images", "a.gif", &Bytes::from_static(b"gif"), "image/gif").await,
            Err(GatewayError::Rejected(_))
        ));
        assert!(storage.put("chat-attachments", "a.pdf", &Bytes::from_static(b"pdf"), "application/pdf").await.is_ok());
    }

    #[tokio::test]
    async fn rejects_traversal_and_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path()).await;
        let data = Bytes::from_static(b"x");

        assert!(matches!(
            storage.put("chat-attachments", "../escape", &data, "text/plain").await,
            Err(GatewayError::Rejected(_))
        ));
        storage.put("chat-attachments", "c/u/1-a.txt", &data, "text/plain").await.unwrap();
        assert!(matches!(
            storage.put("chat-attachments", "c/u/1-a.txt", &data, "text/plain").await,
            Err(GatewayError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn unknown_bucket_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path()).await;
        assert!(matches!(
            storage.put("nope", "a", &Bytes::from_static(b"x"), "text/plain").await,
            Err(GatewayError::NotFound(_))
        ));
    }
}
