use chrono::{FixedOffset, TimeZone, Utc};
use serde_json::json;
use tracing::error;

use crate::channel::line::{LineClient, OutgoingMessage};
use crate::types::LinkRecord;

const WELCOME_TEXT: &str = "ご登録ありがとうございます！\n\nQRコードを読み取ってIDを登録してください。\n\n【コマンド一覧】\n・リスト → 登録済みIDを表示\n・ヘルプ → 使い方を表示";

const HELP_TEXT: &str = "【使い方】\n\n1️⃣ QRコードを読み取る\n登録用のQRコードを読み取ると、IDと氏名が自動で登録されます。\n\n2️⃣ リストを表示\n「リスト」と送信すると、登録済みのIDが表示されます。\n\n3️⃣ IDを削除\nリスト表示後、削除したいIDの「削除」ボタンをタップしてください。\n\n※ 1つのLINEアカウントに複数のIDを登録できます。";

const EMPTY_LIST_TEXT: &str = "登録されているIDはありません。\n\nQRコードを読み取って登録してください。";

/// Formats and sends the bot's outbound messages.
///
/// Delivery is best-effort: a failed send is logged and swallowed so it
/// never blocks the data mutation it follows.
#[derive(Clone)]
pub struct Notifier {
    client: LineClient,
}

impl Notifier {
    pub fn new(client: LineClient) -> Self {
        Self { client }
    }

    /// Welcome message pushed to a new follower.
    pub async fn send_welcome(&self, user_id: &str) {
        if let Err(e) = self
            .client
            .push(user_id, &[OutgoingMessage::text(WELCOME_TEXT)])
            .await
        {
            error!("Failed to send welcome message: {}", e);
        }
    }

    /// Registration confirmation pushed after a successful link.
    pub async fn send_registration_success(
        &self,
        user_id: &str,
        external_id: &str,
        user_name: &str,
    ) {
        let text = format!(
            "✅ 登録完了\n\nID: {}\n氏名: {}\n\nが登録されました。",
            external_id, user_name
        );
        if let Err(e) = self
            .client
            .push(user_id, &[OutgoingMessage::text(text)])
            .await
        {
            error!("Failed to send registration success: {}", e);
        }
    }

    /// Registered-id list: one carousel bubble per link, or a plain text
    /// when nothing is registered.
    pub async fn send_link_list(&self, user_id: &str, links: &[LinkRecord]) {
        let message = if links.is_empty() {
            OutgoingMessage::text(EMPTY_LIST_TEXT)
        } else {
            let bubbles: Vec<_> = links.iter().map(link_bubble).collect();
            OutgoingMessage::flex(
                "登録済みIDリスト",
                json!({ "type": "carousel", "contents": bubbles }),
            )
        };

        if let Err(e) = self.client.push(user_id, &[message]).await {
            error!("Failed to send link list: {}", e);
        }
    }

    /// Usage instructions, tied to the inbound event's reply token.
    pub async fn send_help(&self, reply_token: &str) {
        if let Err(e) = self
            .client
            .reply(reply_token, &[OutgoingMessage::text(HELP_TEXT)])
            .await
        {
            error!("Failed to send help: {}", e);
        }
    }

    /// Generic error notice.
    pub async fn send_error(&self, user_id: &str, detail: &str) {
        let text = format!("❌ エラー\n\n{}", detail);
        if let Err(e) = self
            .client
            .push(user_id, &[OutgoingMessage::text(text)])
            .await
        {
            error!("Failed to send error message: {}", e);
        }
    }

    /// Deletion confirmation.
    pub async fn send_deletion_success(&self, user_id: &str, user_name: &str) {
        let text = format!("✅ 削除完了\n\n{} の登録を削除しました。", user_name);
        if let Err(e) = self
            .client
            .push(user_id, &[OutgoingMessage::text(text)])
            .await
        {
            error!("Failed to send deletion success: {}", e);
        }
    }
}

/// One carousel bubble: display name, id, link time, delete button.
fn link_bubble(link: &LinkRecord) -> serde_json::Value {
    json!({
        "type": "bubble",
        "body": {
            "type": "box",
            "layout": "vertical",
            "contents": [
                {
                    "type": "text",
                    "text": link.user_name,
                    "weight": "bold",
                    "size": "lg",
                    "wrap": true
                },
                {
                    "type": "box",
                    "layout": "baseline",
                    "margin": "md",
                    "contents": [
                        { "type": "text", "text": "ID:", "size": "sm", "color": "#aaaaaa", "flex": 0 },
                        { "type": "text", "text": link.user_id, "size": "sm", "color": "#666666", "wrap": true, "flex": 4 }
                    ]
                },
                {
                    "type": "text",
                    "text": format_linked_at(link.linked_at),
                    "size": "xs",
                    "color": "#aaaaaa",
                    "margin": "md"
                }
            ]
        },
        "footer": {
            "type": "box",
            "layout": "vertical",
            "spacing": "sm",
            "contents": [
                {
                    "type": "button",
                    "style": "primary",
                    "color": "#ff6b6b",
                    "action": {
                        "type": "postback",
                        "label": "削除",
                        "data": format!("action=delete&userId={}", urlencoding::encode(&link.user_id)),
                        "displayText": format!("{} を削除", link.user_name)
                    }
                }
            ]
        }
    })
}

/// Render epoch milliseconds as JST wall-clock time.
fn format_linked_at(millis: i64) -> String {
    let Some(jst) = FixedOffset::east_opt(9 * 3600) else {
        return String::new();
    };
    match Utc.timestamp_millis_opt(millis) {
        chrono::LocalResult::Single(dt) => {
            dt.with_timezone(&jst).format("%Y/%m/%d %H:%M").to_string()
        }
        _ => String::new(),
    }
}
