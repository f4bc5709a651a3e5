#![cfg(feature = "blob-http")]

use std::io::Read;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use super::{validate_address, BlobEntry, BlobStore};

#[derive(Clone, Debug)]
pub struct HttpBlobStoreConfig {
    /// Base URL, e.g. `https://storage.example.net`.
    pub endpoint: String,
    pub bucket: String,
    /// Bearer token sent on every request.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for HttpBlobStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            bucket: String::new(),
            token: None,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Object store spoken to over plain HTTP.
///
/// Objects live at `{endpoint}/{bucket}/{address}` (PUT/GET). `verify` issues a
/// HEAD on the bucket. Listing GETs `{endpoint}/{bucket}?prefix=...` and expects
/// a JSON array of `{"key": ..., "size": ...}`.
pub struct HttpBlobStore {
    config: HttpBlobStoreConfig,
    agent: ureq::Agent,
}

impl HttpBlobStore {
    pub fn new(config: HttpBlobStoreConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(anyhow!("blob endpoint cannot be empty"));
        }
        if config.bucket.is_empty() {
            return Err(anyhow!("blob bucket cannot be empty"));
        }
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self { config, agent })
    }

    fn bucket_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket
        )
    }

    fn object_url(&self, address: &str) -> String {
        format!("{}/{}", self.bucket_url(), address)
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        match &self.config.token {
            Some(token) => request.set("Authorization", &format!("Bearer {}", token)),
            None => request,
        }
    }
}

impl BlobStore for HttpBlobStore {
    fn name(&self) -> &'static str {
        "http"
    }

    fn verify(&self) -> Result<()> {
        let url = self.bucket_url();
        self.authorize(self.agent.head(&url))
            .call()
            .with_context(|| format!("reach blob bucket {}", url))?;
        Ok(())
    }

    fn put(&self, address: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        validate_address(address)?;
        let url = self.object_url(address);
        self.authorize(self.agent.put(&url))
            .set("Content-Type", content_type)
            .send_bytes(bytes)
            .with_context(|| format!("upload {}", url))?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>> {
        let url = self.bucket_url();
        let response = self
            .authorize(self.agent.get(&url))
            .query("prefix", prefix)
            .call()
            .with_context(|| format!("list {} prefix {:?}", url, prefix))?;
        let mut entries: Vec<BlobEntry> = serde_json::from_reader(response.into_reader())
            .with_context(|| format!("decode listing from {}", url))?;
        entries.retain(|e| e.key.starts_with(prefix));
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    fn get(&self, address: &str) -> Result<Vec<u8>> {
        validate_address(address)?;
        let url = self.object_url(address);
        let response = self
            .authorize(self.agent.get(&url))
            .call()
            .with_context(|| format!("fetch {}", url))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .with_context(|| format!("read body of {}", url))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_joined_without_double_slashes() -> Result<()> {
        let store = HttpBlobStore::new(HttpBlobStoreConfig {
            endpoint: "https://storage.example.net/".into(),
            bucket: "birds".into(),
            ..HttpBlobStoreConfig::default()
        })?;
        assert_eq!(
            store.object_url("02-12-2025/a.jpg"),
            "https://storage.example.net/birds/02-12-2025/a.jpg"
        );
        Ok(())
    }

    #[test]
    fn empty_bucket_is_rejected() {
        let config = HttpBlobStoreConfig {
            endpoint: "https://storage.example.net".into(),
            ..HttpBlobStoreConfig::default()
        };
        assert!(HttpBlobStore::new(config).is_err());
    }
}
