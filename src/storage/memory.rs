use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use super::{validate_address, BlobEntry, BlobStore};

#[derive(Clone, Debug)]
struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

/// Blob store kept in memory. Clones share the same objects.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBlobStore {
    objects: Arc<Mutex<BTreeMap<String, StoredBlob>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, to simulate an unreachable store.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn content_type(&self, address: &str) -> Option<String> {
        self.lock().get(address).map(|b| b.content_type.clone())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, StoredBlob>> {
        match self.objects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("in-memory blob store is unavailable"));
        }
        Ok(())
    }
}

impl BlobStore for InMemoryBlobStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn verify(&self) -> Result<()> {
        self.check_available()
    }

    fn put(&self, address: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        self.check_available()?;
        validate_address(address)?;
        self.lock().insert(
            address.to_string(),
            StoredBlob {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>> {
        self.check_available()?;
        Ok(self
            .lock()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, blob)| BlobEntry {
                key: key.clone(),
                size: blob.bytes.len() as u64,
            })
            .collect())
    }

    fn get(&self, address: &str) -> Result<Vec<u8>> {
        self.check_available()?;
        self.lock()
            .get(address)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| anyhow!("blob {} not found", address))
    }
}
