/**
 * Logs Route Handler
 * Endpoint for receiving client logs from frontend
 */
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::IntoResponse,
};
use tower_http::request_id::RequestId;

use crate::logging::config::{ClientLogBatch, ClientLogEntry, LogLevel, LogResponse};

/// POST /api/logs - Receive client logs
#[tracing::instrument(skip(logs), fields(batch_size = logs.logs.len()))]
pub async fn receive_client_logs(
    request_id: Option<Extension<RequestId>>,
    Json(logs): Json<ClientLogBatch>,
) -> impl IntoResponse {
    let req_id = request_id
        .as_ref()
        .and_then(|ext| ext.0.header_value().to_str().ok())
        .unwrap_or("unknown");

    tracing::info!(
        request_id = %req_id,
        batch_size = logs.logs.len(),
        "received client logs"
    );

    for log in &logs.logs {
        emit_client_log(log, req_id);
    }

    let response = LogResponse {
        success: true,
        received: logs.logs.len(),
        processed: logs.logs.len(),
        error: None,
    };

    (StatusCode::ACCEPTED, Json(response))
}

/// Re-emit a single client log entry through the server's subscriber.
fn emit_client_log(log: &ClientLogEntry, request_id: &str) {
    let span = tracing::info_span!(
        "client_log",
        request_id = %request_id,
        timestamp = %log.timestamp,
        source = "client",
    );
    let _enter = span.enter();

    match log.level {
        LogLevel::Trace => tracing::trace!(
            message = %log.message,
            context = ?log.context,
            metadata = ?log.metadata,
            "client log"
        ),
        LogLevel::Debug => tracing::debug!(
            message = %log.message,
            context = ?log.context,
            metadata = ?log.metadata,
            "client log"
        ),
        LogLevel::Info => tracing::info!(
            message = %log.message,
            context = ?log.context,
            metadata = ?log.metadata,
            "client log"
        ),
        LogLevel::Warn => tracing::warn!(
            message = %log.message,
            context = ?log.context,
            metadata = ?log.metadata,
            "client log"
        ),
        LogLevel::Error => tracing::error!(
            message = %log.message,
            context = ?log.context,
            metadata = ?log.metadata,
            "client log"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_client_logs_are_accepted_and_counted() {
        let app = Router::new().route("/api/logs", post(receive_client_logs));
        let body = r#"{"logs":[
            {"timestamp":"2026-08-25T10:00:00Z","level":"info","message":"gallery loaded"},
            {"timestamp":"2026-08-25T10:00:01Z","level":"error","message":"image failed"}
        ]}"#;
        let req = Request::post("/api/logs")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let response: LogResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(response.success);
        assert_eq!(response.received, 2);
        assert_eq!(response.processed, 2);
    }
}
