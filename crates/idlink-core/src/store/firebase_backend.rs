use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::util::http::client;

use super::backend::StoreBackend;

/// Firebase Realtime Database REST backend.
///
/// Documents live at `{database_url}/{path}.json`; the optional auth token is
/// passed as the `auth` query parameter. The database returns JSON `null`
/// for absent paths.
pub struct FirebaseBackend {
    database_url: String,
    auth_token: Option<String>,
}

impl FirebaseBackend {
    pub fn new(database_url: &str, auth_token: Option<&str>) -> Self {
        Self {
            database_url: database_url.trim_end_matches('/').to_string(),
            auth_token: auth_token
                .filter(|t| !t.is_empty())
                .map(|t| t.to_string()),
        }
    }

    fn doc_url(&self, path: &str) -> String {
        let mut url = format!(
            "{}/{}.json",
            self.database_url,
            path.trim_matches('/')
        );
        if let Some(ref token) = self.auth_token {
            url.push_str("?auth=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    async fn check(resp: reqwest::Response, op: &str, path: &str) -> Result<reqwest::Response, StoreError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api { status, message });
        }
        debug!("Firebase {} {} ok", op, path);
        Ok(resp)
    }
}

#[async_trait]
impl StoreBackend for FirebaseBackend {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let resp = client().get(self.doc_url(path)).send().await?;
        let resp = Self::check(resp, "GET", path).await?;
        let value: Value = resp.json().await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn put(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let resp = client().put(self.doc_url(path)).json(value).send().await?;
        Self::check(resp, "PUT", path).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let resp = client().delete(self.doc_url(path)).send().await?;
        Self::check(resp, "DELETE", path).await?;
        Ok(())
    }
}
