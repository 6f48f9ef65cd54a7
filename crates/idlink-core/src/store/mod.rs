pub mod backend;
pub mod file_backend;
pub mod firebase_backend;

use std::sync::Arc;

use crate::error::StoreError;
use crate::types::IdentityRecord;

use backend::StoreBackend;

/// Data access for identity-link records.
///
/// Owns the `users/<lineUserId>` layout; no other component reads or writes
/// these documents.
#[derive(Clone)]
pub struct LinkStore {
    backend: Arc<dyn StoreBackend>,
}

impl LinkStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    fn identity_path(line_user_id: &str) -> String {
        format!("users/{}", line_user_id)
    }

    /// Load the identity record, or an empty default when none is stored.
    pub async fn load(&self, line_user_id: &str) -> Result<IdentityRecord, StoreError> {
        match self.backend.get(&Self::identity_path(line_user_id)).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(IdentityRecord::default()),
        }
    }

    /// Persist the whole identity record.
    pub async fn save(
        &self,
        line_user_id: &str,
        record: &IdentityRecord,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        self.backend
            .put(&Self::identity_path(line_user_id), &value)
            .await
    }

    /// Delete the whole identity record.
    pub async fn remove(&self, line_user_id: &str) -> Result<(), StoreError> {
        self.backend.delete(&Self::identity_path(line_user_id)).await
    }
}
