use tracing::{error, info};

use crate::error::LinkError;
use crate::store::LinkStore;
use crate::types::LinkRecord;
use crate::util::now_millis;

/// Business rules for identity links.
///
/// Shared by the webhook path and the registration HTTP path, so both apply
/// the same duplicate-detection rule.
#[derive(Clone)]
pub struct LinkService {
    store: LinkStore,
}

impl LinkService {
    pub fn new(store: LinkStore) -> Self {
        Self { store }
    }

    /// Link `external_id` to `line_user_id`.
    ///
    /// The read-modify-write here is unguarded: two concurrent links for the
    /// same identity can lose one update (last writer wins).
    pub async fn link(
        &self,
        line_user_id: &str,
        external_id: &str,
        display_name: &str,
    ) -> Result<LinkRecord, LinkError> {
        let mut identity = self.store.load(line_user_id).await?;

        if identity.linked_users.contains_key(external_id) {
            return Err(LinkError::Duplicate);
        }

        let record = LinkRecord {
            user_id: external_id.to_string(),
            user_name: display_name.to_string(),
            linked_at: now_millis(),
        };
        identity
            .linked_users
            .insert(external_id.to_string(), record.clone());
        identity.last_updated = record.linked_at;
        self.store.save(line_user_id, &identity).await?;

        info!("Linked {} to {}", external_id, line_user_id);
        Ok(record)
    }

    /// All links held by `line_user_id`.
    ///
    /// Never fails outward: store failures are logged and degrade to an
    /// empty list.
    pub async fn list(&self, line_user_id: &str) -> Vec<LinkRecord> {
        match self.store.load(line_user_id).await {
            Ok(identity) => identity.linked_users.into_values().collect(),
            Err(e) => {
                error!("Failed to list links for {}: {}", line_user_id, e);
                Vec::new()
            }
        }
    }

    /// Remove one link and refresh `lastUpdated`.
    ///
    /// Removing an id that was never linked still succeeds; only a
    /// store-access failure is an error.
    pub async fn unlink(&self, line_user_id: &str, external_id: &str) -> Result<(), LinkError> {
        let mut identity = self.store.load(line_user_id).await?;
        identity.linked_users.remove(external_id);
        identity.last_updated = now_millis();
        self.store.save(line_user_id, &identity).await?;

        info!("Unlinked {} from {}", external_id, line_user_id);
        Ok(())
    }

    /// Drop the identity record and every link under it.
    pub async fn unlink_all(&self, line_user_id: &str) -> Result<(), LinkError> {
        self.store.remove(line_user_id).await?;
        info!("Removed all links for {}", line_user_id);
        Ok(())
    }
}
