//! In-memory [`RemoteStore`] used by the engine's tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{RemoteStore, StoreError};

/// Keeps objects in a map and can be told to reject specific keys.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    failing_keys: HashSet<String>,
    listing_fails: bool,
    listed_partitions: Mutex<Vec<String>>,
    puts: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with empty objects at `"{partition}/{file}"`.
    pub fn with_files(self, partition: &str, files: &[&str]) -> Self {
        {
            let mut objects = self.objects.lock().unwrap();
            for file in files {
                objects.insert(format!("{partition}/{file}"), Vec::new());
            }
        }
        self
    }

    /// Every put to `key` fails.
    pub fn failing_on(mut self, key: &str) -> Self {
        self.failing_keys.insert(key.to_string());
        self
    }

    /// Every listing call fails.
    pub fn unavailable(mut self) -> Self {
        self.listing_fails = true;
        self
    }

    /// Keys that have been put, in call order (including failed attempts).
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    /// Partitions whose file listing was requested.
    pub fn listed_partitions(&self) -> Vec<String> {
        self.listed_partitions.lock().unwrap().clone()
    }

    /// Contents stored at `key`.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    fn check_listing(&self, prefix: &str) -> Result<(), StoreError> {
        if self.listing_fails {
            return Err(StoreError::List {
                bucket: "memory".to_string(),
                prefix: prefix.to_string(),
                source: "listing disabled".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_partitions(&self) -> Result<BTreeSet<String>, StoreError> {
        self.check_listing("")?;
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .keys()
            .filter_map(|key| key.split_once('/').map(|(p, _)| p.to_string()))
            .collect())
    }

    async fn list_files(&self, partition: &str) -> Result<BTreeSet<String>, StoreError> {
        let prefix = format!("{partition}/");
        self.check_listing(&prefix)?;
        self.listed_partitions
            .lock()
            .unwrap()
            .push(partition.to_string());
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|suffix| !suffix.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn put_file(&self, key: &str, local_path: &Path) -> Result<(), StoreError> {
        self.puts.lock().unwrap().push(key.to_string());
        let data = tokio::fs::read(local_path).await?;
        if self.failing_keys.contains(key) {
            return Err(StoreError::Upload {
                bucket: "memory".to_string(),
                key: key.to_string(),
                source: "injected failure".into(),
            });
        }
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }
}
