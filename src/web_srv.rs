use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use teloxide::types::ChatId;
use teloxide::Bot;
use tokio_util::sync::CancellationToken;

use crate::modules::notifications::{send_notification, NotificationKind};

struct AppState {
    bot: Bot,
    prometheus: PrometheusHandle,
}

pub async fn run(
    bot: Bot,
    addr: SocketAddr,
    prometheus: PrometheusHandle,
    cancel: CancellationToken,
) {
    let app_state = Arc::new(AppState { bot, prometheus });

    let app = Router::new()
        .route("/api/notify", post(notify))
        .route("/metrics", get(metrics_endpoint))
        .with_state(app_state);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .unwrap();
}

#[derive(Deserialize, Debug)]
struct NotifyRequest {
    user_id: i64,
    notification_type: NotificationKind,
    message: String,
    status: Option<String>,
}

#[derive(Serialize)]
struct NotifyResponse {
    status: &'static str,
    message: String,
}

async fn notify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NotifyRequest>,
) -> (StatusCode, Json<NotifyResponse>) {
    log::info!("Received notification request for user {}", request.user_id);
    match send_notification(
        &state.bot,
        ChatId(request.user_id),
        request.notification_type,
        &request.message,
        request.status.as_deref(),
    )
    .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(NotifyResponse {
                status: "success",
                message: "Notification sent successfully".to_string(),
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(NotifyResponse {
                status: "error",
                message: format!("Failed to send notification: {e}"),
            }),
        ),
    }
}

async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> String {
    state.prometheus.render()
}
