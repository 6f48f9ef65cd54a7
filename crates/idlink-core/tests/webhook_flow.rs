//! End-to-end webhook scenarios: events go through the router, links land in
//! a temporary file store, and outbound LINE calls hit a mock server.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use idlink_core::channel::line::{parse_webhook_events, LineClient, LineEvent};
use idlink_core::service::links::LinkService;
use idlink_core::service::notifier::Notifier;
use idlink_core::service::router::EventRouter;
use idlink_core::store::file_backend::FileBackend;
use idlink_core::store::LinkStore;

fn build_router(tmp: &TempDir, api_base: &str) -> (EventRouter, LinkService) {
    let backend = Arc::new(FileBackend::new(tmp.path()));
    let links = LinkService::new(LinkStore::new(backend));
    let notifier = Notifier::new(LineClient::with_api_base("test-token", api_base));
    (EventRouter::new(links.clone(), notifier), links)
}

async fn mock_line_api() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    server
}

fn one_event(body: serde_json::Value) -> LineEvent {
    let mut events =
        parse_webhook_events(&json!({ "events": [body] }).to_string()).unwrap();
    events.remove(0)
}

fn text_event(user_id: &str, text: &str) -> LineEvent {
    one_event(json!({
        "type": "message",
        "replyToken": "rt-1",
        "source": { "type": "user", "userId": user_id },
        "message": { "id": "m-1", "type": "text", "text": text }
    }))
}

async fn sent_bodies(server: &MockServer) -> Vec<(String, String)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| {
            (
                r.url.path().to_string(),
                String::from_utf8_lossy(&r.body).into_owned(),
            )
        })
        .collect()
}

#[tokio::test]
async fn follow_event_sends_welcome_push() {
    let server = mock_line_api().await;
    let tmp = tempfile::tempdir().unwrap();
    let (router, _) = build_router(&tmp, &server.uri());

    let event = one_event(json!({
        "type": "follow",
        "source": { "type": "user", "userId": "U1" }
    }));
    router.dispatch(&event).await;

    let sent = sent_bodies(&server).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "/v2/bot/message/push");
    assert!(sent[0].1.contains("ご登録ありがとうございます"));
    assert!(sent[0].1.contains("U1"));
}

#[tokio::test]
async fn register_command_stores_link_and_notifies() {
    let server = mock_line_api().await;
    let tmp = tempfile::tempdir().unwrap();
    let (router, links) = build_router(&tmp, &server.uri());

    router
        .dispatch(&text_event("U1", "登録:EMP001:山田太郎"))
        .await;

    let stored = links.list("U1").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_id, "EMP001");
    assert_eq!(stored[0].user_name, "山田太郎");

    let sent = sent_bodies(&server).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "/v2/bot/message/push");
    assert!(sent[0].1.contains("登録完了"));
    assert!(sent[0].1.contains("EMP001"));
    assert!(sent[0].1.contains("山田太郎"));
}

#[tokio::test]
async fn register_command_accepts_colons_in_display_name() {
    let server = mock_line_api().await;
    let tmp = tempfile::tempdir().unwrap();
    let (router, links) = build_router(&tmp, &server.uri());

    router
        .dispatch(&text_event("U1", "登録:EMP001:山田:太郎"))
        .await;

    let stored = links.list("U1").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_name, "山田:太郎");
}

#[tokio::test]
async fn duplicate_register_sends_error_and_keeps_record() {
    let server = mock_line_api().await;
    let tmp = tempfile::tempdir().unwrap();
    let (router, links) = build_router(&tmp, &server.uri());

    router
        .dispatch(&text_event("U1", "登録:EMP001:山田太郎"))
        .await;
    router
        .dispatch(&text_event("U1", "登録:EMP001:別の名前"))
        .await;

    let stored = links.list("U1").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_name, "山田太郎");

    let sent = sent_bodies(&server).await;
    assert_eq!(sent.len(), 2);
    assert!(sent[1].1.contains("エラー"));
    assert!(sent[1].1.contains("このIDは既に登録されています"));
}

#[tokio::test]
async fn list_command_sends_carousel_with_all_links() {
    let server = mock_line_api().await;
    let tmp = tempfile::tempdir().unwrap();
    let (router, links) = build_router(&tmp, &server.uri());

    links.link("U1", "EMP001", "山田太郎").await.unwrap();
    links.link("U1", "EMP002", "佐藤花子").await.unwrap();

    router.dispatch(&text_event("U1", "リスト")).await;

    let sent = sent_bodies(&server).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "/v2/bot/message/push");
    assert!(sent[0].1.contains("\"flex\""));
    assert!(sent[0].1.contains("山田太郎"));
    assert!(sent[0].1.contains("佐藤花子"));
    assert!(sent[0].1.contains("action=delete&userId=EMP001"));
    assert!(sent[0].1.contains("action=delete&userId=EMP002"));
}

#[tokio::test]
async fn list_command_with_no_links_sends_plain_text() {
    let server = mock_line_api().await;
    let tmp = tempfile::tempdir().unwrap();
    let (router, _) = build_router(&tmp, &server.uri());

    router.dispatch(&text_event("U1", "list")).await;

    let sent = sent_bodies(&server).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("登録されているIDはありません"));
    assert!(!sent[0].1.contains("\"flex\""));
}

#[tokio::test]
async fn unknown_text_gets_help_reply() {
    let server = mock_line_api().await;
    let tmp = tempfile::tempdir().unwrap();
    let (router, _) = build_router(&tmp, &server.uri());

    router.dispatch(&text_event("U1", "こんにちは")).await;

    let sent = sent_bodies(&server).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "/v2/bot/message/reply");
    assert!(sent[0].1.contains("rt-1"));
    assert!(sent[0].1.contains("使い方"));
}

#[tokio::test]
async fn help_command_gets_help_reply() {
    let server = mock_line_api().await;
    let tmp = tempfile::tempdir().unwrap();
    let (router, _) = build_router(&tmp, &server.uri());

    router.dispatch(&text_event("U1", "ヘルプ")).await;

    let sent = sent_bodies(&server).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "/v2/bot/message/reply");
}

#[tokio::test]
async fn delete_postback_removes_link_and_falls_back_to_raw_id_when_repeated() {
    let server = mock_line_api().await;
    let tmp = tempfile::tempdir().unwrap();
    let (router, links) = build_router(&tmp, &server.uri());

    links.link("U1", "EMP001", "山田太郎").await.unwrap();

    let postback = one_event(json!({
        "type": "postback",
        "replyToken": "rt-2",
        "source": { "type": "user", "userId": "U1" },
        "postback": { "data": "action=delete&userId=EMP001" }
    }));

    router.dispatch(&postback).await;
    assert!(links.list("U1").await.is_empty());

    // The same postback again: unlink is idempotent, but the display name
    // is gone, so the notification falls back to the raw id.
    router.dispatch(&postback).await;

    let sent = sent_bodies(&server).await;
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.contains("削除完了"));
    assert!(sent[0].1.contains("山田太郎"));
    assert!(sent[1].1.contains("削除完了"));
    assert!(sent[1].1.contains("EMP001"));
}

#[tokio::test]
async fn unrelated_events_are_ignored() {
    let server = mock_line_api().await;
    let tmp = tempfile::tempdir().unwrap();
    let (router, _) = build_router(&tmp, &server.uri());

    let event = one_event(json!({
        "type": "unfollow",
        "source": { "type": "user", "userId": "U1" }
    }));
    router.dispatch(&event).await;

    assert!(sent_bodies(&server).await.is_empty());
}

#[tokio::test]
async fn send_failure_does_not_block_the_mutation() {
    // LINE API rejects everything; the link must still be stored.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let (router, links) = build_router(&tmp, &server.uri());

    router
        .dispatch(&text_event("U1", "登録:EMP001:山田太郎"))
        .await;

    assert_eq!(links.list("U1").await.len(), 1);
}
