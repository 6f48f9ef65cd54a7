use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{self, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::channel::line;
use crate::config::Config;
use crate::error::LinkError;
use crate::service::links::LinkService;
use crate::service::notifier::Notifier;
use crate::service::router::EventRouter;
use crate::util::escape_html;

/// Shared application state, constructed once at startup and injected into
/// every handler.
pub struct AppState {
    pub config: Config,
    pub links: LinkService,
    pub notifier: Notifier,
    pub router: EventRouter,
}

impl AppState {
    pub fn new(config: Config, links: LinkService, notifier: Notifier) -> Self {
        let router = EventRouter::new(links.clone(), notifier.clone());
        Self {
            config,
            links,
            notifier,
            router,
        }
    }
}

/// Create the axum Router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/webhook", post(handle_webhook))
        .route("/register", get(handle_register))
        .route("/link", get(handle_link_page))
        .route("/generate-qr", get(handle_generate_qr))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([http::Method::GET, http::Method::POST]),
        )
        .with_state(state)
}

/// GET / — liveness summary.
async fn handle_root() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "idlink bot server is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /health
async fn handle_health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

/// POST /webhook — LINE webhook receiver.
///
/// Each event in the batch is dispatched concurrently; one event's failure
/// is confined to that event, so the batch responds `success` once every
/// dispatch has settled.
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !line::verify_signature(&state.config.line.channel_secret, body.as_bytes(), signature) {
        warn!("Rejected webhook with bad signature");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let events = match line::parse_webhook_events(&body) {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to parse webhook body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    info!("Webhook received: {} event(s)", events.len());

    futures::future::join_all(events.iter().map(|event| state.router.dispatch(event))).await;

    Json(json!({ "success": true })).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterParams {
    line_id: Option<String>,
    user_id: Option<String>,
    user_name: Option<String>,
}

/// GET /register — the HTTP twin of the chat registration command, reached
/// from a scanned QR code. Applies the same duplicate rule through the same
/// LinkService.
async fn handle_register(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RegisterParams>,
) -> Response {
    let (Some(line_id), Some(user_id), Some(user_name)) = (
        non_empty(params.line_id),
        non_empty(params.user_id),
        non_empty(params.user_name),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            error_page(
                "❌",
                "エラー",
                "必要なパラメータが不足しています。<br>正しいQRコードをご使用ください。",
            ),
        )
            .into_response();
    };

    match state.links.link(&line_id, &user_id, &user_name).await {
        Ok(record) => {
            // Best-effort: the link is already stored either way.
            state
                .notifier
                .send_registration_success(&line_id, &record.user_id, &record.user_name)
                .await;

            let page = include_str!("../../../../web/register_success.html")
                .replace("{{userId}}", &escape_html(&record.user_id))
                .replace("{{userName}}", &escape_html(&record.user_name));
            Html(page).into_response()
        }
        Err(e @ LinkError::Duplicate) => (
            StatusCode::BAD_REQUEST,
            error_page("⚠️", "登録エラー", e.user_message()),
        )
            .into_response(),
        Err(e) => {
            error!("Registration failed for {}: {}", line_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_page(
                    "💥",
                    "サーバーエラー",
                    "サーバーでエラーが発生しました。<br>しばらく経ってから再度お試しください。",
                ),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkPageParams {
    user_id: Option<String>,
    user_name: Option<String>,
}

/// GET /link — deep-link page that pre-fills the chat registration message.
/// The LINE identity comes from whoever sends the message, so only the
/// external id and name are needed here. Pure presentation.
async fn handle_link_page(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LinkPageParams>,
) -> Response {
    let (Some(user_id), Some(user_name)) =
        (non_empty(params.user_id), non_empty(params.user_name))
    else {
        return (
            StatusCode::BAD_REQUEST,
            error_page(
                "❌",
                "エラー",
                "必要なパラメータが不足しています。<br>正しいQRコードをご使用ください。",
            ),
        )
            .into_response();
    };

    let register_text = format!("登録:{}:{}", user_id, user_name);
    let line_url = format!(
        "https://line.me/R/oaMessage/{}/?{}",
        state.config.line.bot_basic_id,
        urlencoding::encode(&register_text)
    );

    let page = include_str!("../../../../web/link.html")
        .replace("{{userId}}", &escape_html(&user_id))
        .replace("{{userName}}", &escape_html(&user_name))
        .replace("{{registerText}}", &escape_html(&register_text))
        .replace("{{lineUrl}}", &escape_html(&line_url));
    Html(page).into_response()
}

/// GET /generate-qr — QR generator page; the code is rendered client-side.
async fn handle_generate_qr() -> impl IntoResponse {
    Html(include_str!("../../../../web/qr.html"))
}

/// Treat empty and whitespace-only query values as missing, the way the
/// original endpoint did.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Render the shared error page. `message` is always one of our fixed
/// strings (may contain markup); user input never flows into it.
fn error_page(icon: &str, title: &str, message: &str) -> Html<String> {
    Html(
        include_str!("../../../../web/error.html")
            .replace("{{icon}}", icon)
            .replace("{{title}}", &escape_html(title))
            .replace("{{message}}", message),
    )
}

/// Bind and serve the HTTP surface.
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("idlink listening on {}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
