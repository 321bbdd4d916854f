//! Per-module JSON configuration documents.
//!
//! Each module owns one document at `<config_path>/<name>.json`. A missing
//! document is an empty configuration, not an error; an unreadable one is
//! reported and the module still loads with empty config.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use futures::future::join_all;
use serde_json::{Map, Value};

use crate::kernel::error::{KernelError, Result};

/// Loads, caches and persists per-module configuration.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    configs: RwLock<HashMap<String, Value>>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            configs: RwLock::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn config_file(&self, name: &str) -> PathBuf {
        self.path.join(format!("{}.json", name))
    }

    fn store(&self, name: &str, value: Value) {
        match self.configs.write() {
            Ok(mut configs) => {
                configs.insert(name.to_string(), value);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(name.to_string(), value);
            }
        }
    }

    /// Load every `*.json` document under the config directory.
    ///
    /// Creates the directory if needed. Documents load concurrently; the
    /// number of loaded configs is returned.
    pub async fn load_all(&self) -> Result<usize> {
        tokio::fs::create_dir_all(&self.path)
            .await
            .map_err(|e| KernelError::io(e, "create_dir", self.path.clone()))?;

        let mut read_dir = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|e| KernelError::io(e, "read_dir", self.path.clone()))?;

        let mut names = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) == Some("json") {
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            names.push(stem.to_string());
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("failed to enumerate config directory: {}", e);
                    break;
                }
            }
        }

        let loads = names.iter().map(|name| self.load_config(name));
        let count = join_all(loads).await.len();
        log::info!("loaded {} module configuration(s) from {}", count, self.path.display());
        Ok(count)
    }

    /// Load one module's document into the store and return it.
    ///
    /// Missing file: empty object. Unreadable or invalid file: reported,
    /// empty object.
    pub async fn load_config(&self, name: &str) -> Value {
        let file = self.config_file(name);
        let value = match tokio::fs::read_to_string(&file).await {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(value) => value,
                Err(e) => {
                    log::error!(
                        "configuration for module '{}' is invalid ({}); using empty config",
                        name,
                        e
                    );
                    Value::Object(Map::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Object(Map::new()),
            Err(e) => {
                log::error!(
                    "failed to read configuration for module '{}' ({}); using empty config",
                    name,
                    e
                );
                Value::Object(Map::new())
            }
        };
        self.store(name, value.clone());
        value
    }

    /// Persist a module's document with 2-space indentation.
    pub async fn save_config(&self, name: &str, value: Value) -> Result<()> {
        tokio::fs::create_dir_all(&self.path)
            .await
            .map_err(|e| KernelError::io(e, "create_dir", self.path.clone()))?;
        let file = self.config_file(name);
        let serialized = serde_json::to_string_pretty(&value)?;
        tokio::fs::write(&file, serialized)
            .await
            .map_err(|e| KernelError::io(e, "write", file))?;
        self.store(name, value);
        Ok(())
    }

    /// Shallow-merge `patch` over the stored document and persist.
    pub async fn update_config(&self, name: &str, patch: Value) -> Result<Value> {
        let current = self.get_config(name).unwrap_or(Value::Object(Map::new()));
        let merged = match (current, patch) {
            (Value::Object(mut base), Value::Object(patch)) => {
                for (key, value) in patch {
                    base.insert(key, value);
                }
                Value::Object(base)
            }
            (_, patch) => patch,
        };
        self.save_config(name, merged.clone()).await?;
        Ok(merged)
    }

    /// Remove the document from disk and from the store.
    pub async fn delete_config(&self, name: &str) -> Result<()> {
        let file = self.config_file(name);
        match tokio::fs::remove_file(&file).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(KernelError::io(e, "remove", file)),
        }
        match self.configs.write() {
            Ok(mut configs) => {
                configs.remove(name);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(name);
            }
        }
        Ok(())
    }

    pub fn has_config(&self, name: &str) -> bool {
        match self.configs.read() {
            Ok(configs) => configs.contains_key(name),
            Err(poisoned) => poisoned.into_inner().contains_key(name),
        }
    }

    pub fn get_config(&self, name: &str) -> Option<Value> {
        match self.configs.read() {
            Ok(configs) => configs.get(name).cloned(),
            Err(poisoned) => poisoned.into_inner().get(name).cloned(),
        }
    }

    /// Whether the stored document disables the module.
    pub fn module_disabled(&self, name: &str) -> bool {
        self.get_config(name)
            .and_then(|config| config.get("disabled").and_then(Value::as_bool))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests;
