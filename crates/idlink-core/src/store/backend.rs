use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Trait for hierarchical key-value store backends.
///
/// Paths are slash-separated (e.g. `users/U123`); each path addresses one
/// JSON document.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Read the document at `path`. Returns `None` if absent.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Write the document at `path`, replacing any existing value.
    async fn put(&self, path: &str, value: &Value) -> Result<(), StoreError>;

    /// Delete the document at `path`. Deleting an absent document is not an
    /// error.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}
