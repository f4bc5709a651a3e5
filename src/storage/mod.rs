//! Sighting persistence: a remote-style blob store plus an independent local archive.
//!
//! Addresses are `/`-separated relative keys such as
//! `02-12-2025/bird_20250212_081500_count_1_conf_0.87.jpg`.

mod filesystem;
#[cfg(feature = "blob-http")]
mod http;
mod memory;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub use filesystem::{FilesystemArchive, FilesystemBlobStore};
#[cfg(feature = "blob-http")]
pub use http::{HttpBlobStore, HttpBlobStoreConfig};
pub use memory::InMemoryBlobStore;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// One object in a blob store listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    pub key: String,
    pub size: u64,
}

/// Object storage for finished sightings.
pub trait BlobStore: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Check the store is reachable and writable.
    fn verify(&self) -> Result<()>;

    fn put(&self, address: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Entries whose key starts with `prefix`, sorted by key.
    fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>>;

    fn get(&self, address: &str) -> Result<Vec<u8>>;
}

/// Flat local directory of files, written independently of the blob store.
pub trait LocalArchive: Send {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Where sightings are uploaded.
#[derive(Clone, Debug, PartialEq)]
pub enum BlobTarget {
    Memory,
    Filesystem(PathBuf),
    Http {
        endpoint: String,
        bucket: String,
        token_env: Option<String>,
    },
}

pub fn build_blob_store(target: &BlobTarget) -> Result<Box<dyn BlobStore>> {
    match target {
        BlobTarget::Memory => Ok(Box::new(InMemoryBlobStore::new())),
        BlobTarget::Filesystem(root) => Ok(Box::new(FilesystemBlobStore::new(root)?)),
        #[cfg(feature = "blob-http")]
        BlobTarget::Http {
            endpoint,
            bucket,
            token_env,
        } => Ok(Box::new(HttpBlobStore::new(HttpBlobStoreConfig {
            endpoint: endpoint.clone(),
            bucket: bucket.clone(),
            token: token_env.as_deref().and_then(|name| std::env::var(name).ok()),
            ..HttpBlobStoreConfig::default()
        })?)),
        #[cfg(not(feature = "blob-http"))]
        BlobTarget::Http { endpoint, .. } => Err(anyhow!(
            "blob endpoint {} requires building with --features blob-http",
            endpoint
        )),
    }
}

/// Reject addresses that could escape the store root or are not plain keys.
pub fn validate_address(address: &str) -> Result<()> {
    if address.is_empty() {
        return Err(anyhow!("blob address cannot be empty"));
    }
    for segment in address.split('/') {
        validate_segment(segment)
            .map_err(|err| anyhow!("invalid blob address {:?}: {}", address, err))?;
    }
    Ok(())
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(anyhow!("empty or relative path segment"));
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(anyhow!("segments must be [A-Za-z0-9._-] only"));
    }
    Ok(())
}

fn address_path(root: &Path, address: &str) -> Result<PathBuf> {
    validate_address(address)?;
    let mut path = root.to_path_buf();
    path.extend(address.split('/'));
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_validated() {
        assert!(validate_address("02-12-2025/bird_20250212_081500_count_1_conf_0.87.jpg").is_ok());
        assert!(validate_address("motion.jpg").is_ok());
        assert!(validate_address("").is_err());
        assert!(validate_address("../etc/passwd").is_err());
        assert!(validate_address("a//b.jpg").is_err());
        assert!(validate_address("/abs.jpg").is_err());
        assert!(validate_address("a/b c.jpg").is_err());
    }

    #[test]
    fn address_path_joins_segments() -> Result<()> {
        let path = address_path(Path::new("/srv/birds"), "02-12-2025/x.jpg")?;
        assert_eq!(path, PathBuf::from("/srv/birds/02-12-2025/x.jpg"));
        Ok(())
    }
}
