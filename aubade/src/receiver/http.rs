//! HTTP surface of the receiver.

use super::ScheduleReceiver;
use crate::errors::{AubadeError, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Builds the receiver router: `POST /greeting` and `GET /health`.
pub fn router(receiver: Arc<ScheduleReceiver>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/greeting", post(receive_greeting))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(receiver)
}

/// Serves `app` on `listener` until the process ends.
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "Greeting receiver listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "status": "error", "message": message.into() })),
    )
}

async fn receive_greeting(
    State(receiver): State<Arc<ScheduleReceiver>>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let mut audio = Vec::new();
    let mut references = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Malformed multipart body");
                return error_response(StatusCode::BAD_REQUEST, e.body_text());
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("audio") => match field.bytes().await {
                Ok(bytes) => audio = bytes.to_vec(),
                Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
            },
            Some("references") => match field.text().await {
                Ok(text) => references = text.lines().map(str::to_string).collect(),
                Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
            },
            other => warn!(field = ?other, "Ignoring unknown multipart field"),
        }
    }

    let size = audio.len();
    let accepted =
        tokio::task::spawn_blocking(move || receiver.accept(&audio, &references)).await;

    match accepted {
        Ok(Ok(record)) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "size_bytes": size,
                "due": record.due,
                "due_at": record.due_at().map(|at| at.to_rfc3339()),
            })),
        ),
        Ok(Err(AubadeError::InvalidDelivery(message))) => {
            warn!(%message, "Delivery rejected");
            error_response(StatusCode::BAD_REQUEST, message)
        }
        Ok(Err(e)) => {
            error!(error = %e, "Error receiving greeting");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Receiver task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn health() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{FileScheduleStore, ManualClock, ScheduleStore, SunriseSource};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use std::path::Path;
    use tower::ServiceExt;

    const BOUNDARY: &str = "aubade-test-boundary";

    struct SixAm;

    impl SunriseSource for SixAm {
        fn sunrise_on(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
            Ok(Utc.from_utc_datetime(&date.and_hms_opt(6, 0, 0).unwrap()))
        }
    }

    fn app(dir: &Path) -> (Router, Arc<FileScheduleStore>) {
        let store = Arc::new(FileScheduleStore::new(dir.join(".playback_schedule")));
        let receiver = ScheduleReceiver::new(
            dir.join("greeting.wav"),
            dir.join("references.txt"),
            store.clone(),
            Arc::new(SixAm),
        )
        .with_clock(Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 2, 0, 0).unwrap(),
        )));
        (router(Arc::new(receiver), 1024 * 1024), store)
    }

    fn multipart_body(audio: Option<&[u8]>, references: Option<&str>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(audio) = audio {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"greeting.wav\"\r\nContent-Type: audio/wav\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(audio);
            body.extend_from_slice(b"\r\n");
        }
        if let Some(references) = references {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"references\"\r\n\r\n{references}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn post_greeting(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/greeting")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_receive_greeting() {
        let dir = tempfile::tempdir().unwrap();
        let (app, store) = app(dir.path());

        let response = app
            .oneshot(post_greeting(multipart_body(
                Some(b"RIFF....WAVE"),
                Some("stream?id=1\nstream?id=2"),
            )))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let six = Utc.with_ymd_and_hms(2026, 6, 1, 6, 0, 0).unwrap().timestamp();
        assert_eq!(body["status"], "success");
        assert_eq!(body["due"], six);
        assert_eq!(store.load().unwrap().map(|r| r.due), Some(six));
        assert_eq!(std::fs::read(dir.path().join("greeting.wav")).unwrap(), b"RIFF....WAVE");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("references.txt")).unwrap(),
            "stream?id=1\nstream?id=2\n"
        );
    }

    #[tokio::test]
    async fn test_empty_audio_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (app, store) = app(dir.path());

        let response = app
            .oneshot(post_greeting(multipart_body(Some(b""), None)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "No audio data received");
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_audio_part_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path());

        let response = app
            .oneshot(post_greeting(multipart_body(None, Some("stream?id=1"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_storage_failure_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let (app, _) = app(&blocker);

        let response = app
            .oneshot(post_greeting(multipart_body(Some(b"RIFF"), None)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
