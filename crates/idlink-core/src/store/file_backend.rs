use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::util::safe_filename;

use super::backend::StoreBackend;

/// File-based store: one JSON file per document under the data directory.
///
/// The default backend for local runs and tests.
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: &Path) -> Self {
        std::fs::create_dir_all(root).ok();
        Self {
            root: root.to_path_buf(),
        }
    }

    fn doc_path(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
        while let Some(segment) = segments.next() {
            let safe = safe_filename(segment);
            if segments.peek().is_none() {
                full.push(format!("{}.json", safe));
            } else {
                full.push(safe);
            }
        }
        full
    }
}

#[async_trait]
impl StoreBackend for FileBackend {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let file = self.doc_path(path);
        if !file.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&file).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn put(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let file = self.doc_path(path);
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&file, content).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let file = self.doc_path(path);
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
