use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One external-id link held by a LINE identity.
///
/// Persisted as `{ userId, userName, linkedAt }` under
/// `users/<lineUserId>/linkedUsers/<userId>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    /// Externally issued identifier (employee/student number).
    pub user_id: String,
    /// Display name supplied at registration time.
    pub user_name: String,
    /// Epoch milliseconds at link time.
    pub linked_at: i64,
}

/// Everything stored for one LINE identity: `users/<lineUserId>`.
///
/// Created implicitly on the first successful link. Removing individual
/// links leaves the record in place; only an unlink-all deletes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityRecord {
    pub linked_users: BTreeMap<String, LinkRecord>,
    pub last_updated: i64,
}
