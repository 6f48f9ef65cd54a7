use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::ChannelError;
use crate::util::http::client;

const LINE_API_BASE: &str = "https://api.line.me";

/// Verify a webhook signature using HMAC-SHA256.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    let expected = base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        mac.finalize().into_bytes(),
    );
    expected == signature
}

/// Parse LINE webhook events from the request body.
pub fn parse_webhook_events(body: &str) -> Result<Vec<LineEvent>, serde_json::Error> {
    let webhook: LineWebhook = serde_json::from_str(body)?;
    Ok(webhook.events)
}

/// LINE Messaging API client.
#[derive(Clone)]
pub struct LineClient {
    access_token: String,
    api_base: String,
}

impl LineClient {
    pub fn new(access_token: &str) -> Self {
        Self::with_api_base(access_token, LINE_API_BASE)
    }

    /// Point the client at a different API host (tests).
    pub fn with_api_base(access_token: &str, api_base: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Reply to an event using its single-use reply token.
    /// Must be called within 1 minute of receiving the webhook.
    pub async fn reply(
        &self,
        reply_token: &str,
        messages: &[OutgoingMessage],
    ) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": messages,
        });
        self.post("/v2/bot/message/reply", &body).await
    }

    /// Push messages to a user outside of any reply context.
    pub async fn push(&self, to: &str, messages: &[OutgoingMessage]) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "to": to,
            "messages": messages,
        });
        self.post("/v2/bot/message/push", &body).await
    }

    async fn post(&self, endpoint: &str, body: &serde_json::Value) -> Result<(), ChannelError> {
        let resp = client()
            .post(format!("{}{}", self.api_base, endpoint))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            error!("LINE API error on {}: {} {}", endpoint, status, message);
            return Err(ChannelError::Api { status, message });
        }

        debug!("LINE {} delivered", endpoint);
        Ok(())
    }
}

// ====== Outbound message payloads ======

/// Message payloads accepted by the reply/push endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingMessage {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Flex {
        alt_text: String,
        contents: serde_json::Value,
    },
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        OutgoingMessage::Text { text: text.into() }
    }

    pub fn flex(alt_text: impl Into<String>, contents: serde_json::Value) -> Self {
        OutgoingMessage::Flex {
            alt_text: alt_text.into(),
            contents,
        }
    }
}

// ====== LINE Webhook Types ======

#[derive(Debug, Deserialize)]
pub struct LineWebhook {
    #[serde(default)]
    pub events: Vec<LineEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reply_token: Option<String>,
    pub source: Option<LineSource>,
    pub message: Option<LineMessage>,
    pub postback: Option<LinePostback>,
    pub timestamp: Option<u64>,
}

impl LineEvent {
    /// LINE user id of the event source, when present.
    pub fn user_id(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.user_id.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub room_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMessage {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinePostback {
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_webhook_text_message() {
        let body = r#"{
            "events": [{
                "type": "message",
                "replyToken": "token123",
                "source": {
                    "type": "user",
                    "userId": "U1234567890"
                },
                "message": {
                    "id": "msg001",
                    "type": "text",
                    "text": "リスト"
                },
                "timestamp": 1625000000000
            }]
        }"#;

        let events = parse_webhook_events(body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "message");
        assert_eq!(events[0].reply_token.as_deref(), Some("token123"));
        assert_eq!(events[0].user_id(), Some("U1234567890"));
        assert_eq!(
            events[0].message.as_ref().unwrap().text.as_deref(),
            Some("リスト")
        );
    }

    #[test]
    fn test_parse_webhook_follow_event() {
        let body = r#"{
            "events": [{
                "type": "follow",
                "source": {
                    "type": "user",
                    "userId": "U9999"
                },
                "timestamp": 1625000001000
            }]
        }"#;

        let events = parse_webhook_events(body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "follow");
        assert!(events[0].message.is_none());
    }

    #[test]
    fn test_parse_webhook_postback_event() {
        let body = r#"{
            "events": [{
                "type": "postback",
                "replyToken": "reply456",
                "source": {
                    "type": "user",
                    "userId": "U1234"
                },
                "postback": {
                    "data": "action=delete&userId=EMP001"
                }
            }]
        }"#;

        let events = parse_webhook_events(body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "postback");
        assert_eq!(
            events[0].postback.as_ref().unwrap().data,
            "action=delete&userId=EMP001"
        );
    }

    #[test]
    fn test_parse_webhook_empty() {
        let body = r#"{"events": []}"#;
        let events = parse_webhook_events(body).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_verify_signature_known_vector() {
        // HMAC-SHA256("test-channel-secret", '{"events":[]}'), base64.
        let body = br#"{"events":[]}"#;
        let signature = "sKRrt+MTE71nWWZPaYrvYSdH9JGlgckmBidZxDuPgPc=";

        assert!(verify_signature("test-channel-secret", body, signature));
        assert!(!verify_signature("wrong-secret", body, signature));
        assert!(!verify_signature(
            "test-channel-secret",
            br#"{"events":[{}]}"#,
            signature
        ));
        assert!(!verify_signature("test-channel-secret", body, ""));
    }

    #[test]
    fn test_outgoing_text_serialization() {
        let msg = OutgoingMessage::text("こんにちは");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, serde_json::json!({ "type": "text", "text": "こんにちは" }));
    }

    #[test]
    fn test_outgoing_flex_serialization() {
        let msg = OutgoingMessage::flex(
            "リスト",
            serde_json::json!({ "type": "carousel", "contents": [] }),
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "flex");
        assert_eq!(value["altText"], "リスト");
        assert_eq!(value["contents"]["type"], "carousel");
    }
}
