use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::channel::line::LineEvent;
use crate::service::links::LinkService;
use crate::service::notifier::Notifier;

/// Registration command prefix: `登録:<id>:<name>`.
const REGISTER_PREFIX: &str = "登録:";

/// Routes decoded webhook events to link operations and their replies.
///
/// Stateless apart from the injected service and notifier.
#[derive(Clone)]
pub struct EventRouter {
    links: LinkService,
    notifier: Notifier,
}

impl EventRouter {
    pub fn new(links: LinkService, notifier: Notifier) -> Self {
        Self { links, notifier }
    }

    /// Handle one webhook event.
    ///
    /// Never fails outward: anything that goes wrong inside is logged and
    /// confined to this event, so one bad event cannot take down a batch.
    pub async fn dispatch(&self, event: &LineEvent) {
        match event.event_type.as_str() {
            "follow" => self.on_follow(event).await,
            "message" => self.on_message(event).await,
            "postback" => self.on_postback(event).await,
            other => debug!("Ignoring LINE event type: {}", other),
        }
    }

    async fn on_follow(&self, event: &LineEvent) {
        let Some(user_id) = event.user_id() else {
            warn!("Follow event without a user id");
            return;
        };
        info!("New follower: {}", user_id);
        self.notifier.send_welcome(user_id).await;
    }

    async fn on_message(&self, event: &LineEvent) {
        let Some(message) = event.message.as_ref() else {
            return;
        };
        if message.msg_type != "text" {
            debug!("Ignoring non-text LINE message: {}", message.msg_type);
            return;
        }
        let Some(user_id) = event.user_id() else {
            warn!("Text message without a user id");
            return;
        };
        let text = message.text.as_deref().unwrap_or("").trim();

        if let Some((external_id, display_name)) = parse_register_command(text) {
            match self.links.link(user_id, external_id, display_name).await {
                Ok(record) => {
                    self.notifier
                        .send_registration_success(user_id, &record.user_id, &record.user_name)
                        .await;
                }
                Err(e) => {
                    warn!("Registration via chat failed for {}: {}", user_id, e);
                    self.notifier.send_error(user_id, e.user_message()).await;
                }
            }
            return;
        }

        if is_list_command(text) {
            let links = self.links.list(user_id).await;
            self.notifier.send_link_list(user_id, &links).await;
            return;
        }

        if is_help_command(text) {
            if let Some(reply_token) = event.reply_token.as_deref() {
                self.notifier.send_help(reply_token).await;
            }
            return;
        }

        // Anything else gets the usage instructions too.
        if let Some(reply_token) = event.reply_token.as_deref() {
            self.notifier.send_help(reply_token).await;
        }
    }

    async fn on_postback(&self, event: &LineEvent) {
        let Some(user_id) = event.user_id() else {
            warn!("Postback event without a user id");
            return;
        };
        let Some(postback) = event.postback.as_ref() else {
            return;
        };

        let params = parse_postback_data(&postback.data);
        if params.get("action").map(String::as_str) != Some("delete") {
            debug!("Ignoring postback: {}", postback.data);
            return;
        }
        let Some(target) = params.get("userId") else {
            debug!("Delete postback without a userId: {}", postback.data);
            return;
        };

        // Resolve the display name before the record disappears; fall back
        // to the raw id when it is already gone.
        let links = self.links.list(user_id).await;
        let display_name = links
            .iter()
            .find(|l| &l.user_id == target)
            .map(|l| l.user_name.clone())
            .unwrap_or_else(|| target.clone());

        match self.links.unlink(user_id, target).await {
            Ok(()) => {
                self.notifier
                    .send_deletion_success(user_id, &display_name)
                    .await;
            }
            Err(e) => {
                warn!("Failed to delete {} for {}: {}", target, user_id, e);
                self.notifier.send_error(user_id, "削除に失敗しました。").await;
            }
        }
    }
}

/// Parse `登録:<id>:<name>`.
///
/// Only the first two colons delimit, so a display name may itself contain
/// colons. Returns `None` when either field is missing or blank.
pub fn parse_register_command(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix(REGISTER_PREFIX)?;
    let (id, name) = rest.split_once(':')?;
    let id = id.trim();
    let name = name.trim();
    if id.is_empty() || name.is_empty() {
        return None;
    }
    Some((id, name))
}

/// List keyword: two Japanese scripts plus the English form.
pub fn is_list_command(text: &str) -> bool {
    text == "リスト" || text == "りすと" || text.eq_ignore_ascii_case("list")
}

/// Help keyword, same matching rule as the list keyword.
pub fn is_help_command(text: &str) -> bool {
    text == "ヘルプ" || text == "へるぷ" || text.eq_ignore_ascii_case("help")
}

/// Decode `key=value&key=value` postback data.
fn parse_postback_data(data: &str) -> HashMap<String, String> {
    data.split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter_map(|(k, v)| {
            let k = urlencoding::decode(k).ok()?;
            let v = urlencoding::decode(v).ok()?;
            Some((k.into_owned(), v.into_owned()))
        })
        .collect()
}
