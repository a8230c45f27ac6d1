use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Minimal get/set persistence boundary. The shell embedding this crate may
/// supply its own implementation; `JsonFileStore` is the default.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
}

pub fn get_typed<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(value) => {
            let typed = serde_json::from_value(value)
                .with_context(|| format!("Failed to decode store key '{key}'"))?;
            Ok(Some(typed))
        }
        None => Ok(None),
    }
}

pub fn set_typed<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let encoded = serde_json::to_value(value)
        .with_context(|| format!("Failed to encode store key '{key}'"))?;
    store.set(key, encoded)
}

/// File-backed store holding one JSON object. Every mutation rewrites the
/// whole file; readers always see a complete document (write to a sibling
/// temp file, then rename).
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cache = Self::load(&path)?;
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    fn load(path: &Path) -> Result<BTreeMap<String, Value>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read store file {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("Store file {} is not valid JSON", path.display()))
    }

    fn flush(&self, cache: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(cache)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serialized)
            .with_context(|| format!("Failed to write store file {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace store file {}", self.path.display()))?;
        Ok(())
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("Store cache lock poisoned"))?;
        Ok(cache.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("Store cache lock poisoned"))?;
        cache.insert(key.to_string(), value);
        self.flush(&cache)
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    cache: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("Store cache lock poisoned"))?;
        Ok(cache.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("Store cache lock poisoned"))?;
        cache.insert(key.to_string(), value);
        Ok(())
    }
}
