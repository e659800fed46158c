//! Delivery of the finished artifact to the playback node.
//!
//! The artifact travels as a multipart POST: an `audio` file part and an
//! optional newline-delimited `references` text part. Connection failures,
//! timeouts and 5xx responses are retried with exponential backoff; any 4xx
//! response fails immediately.

mod backoff;

pub use backoff::{BackoffSchedule, Pause, RecordingPause, TokioPause};

use crate::config::DeliveryConfig;
use crate::core::Artifact;
use crate::errors::{DeliveryFailed, DeliveryFailureKind, Result};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Successful delivery details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Attempts used.
    pub attempts: usize,
    /// Status returned by the endpoint.
    pub status: u16,
}

enum AttemptOutcome {
    Delivered(StatusCode),
    Retryable(String),
    Rejected(String),
}

/// Posts artifacts to the playback node.
#[derive(Clone)]
pub struct DeliveryClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    schedule: BackoffSchedule,
    pause: Arc<dyn Pause>,
}

impl std::fmt::Debug for DeliveryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryClient")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

impl DeliveryClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// [`crate::errors::AubadeError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("aubade/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            schedule: BackoffSchedule::new(
                config.max_attempts,
                Duration::from_secs(config.initial_backoff_secs),
                config.backoff_factor,
            ),
            pause: Arc::new(TokioPause),
        })
    }

    /// Replaces the pause used between attempts.
    #[must_use]
    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    /// Returns the endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Delivers an artifact.
    pub async fn deliver_artifact(&self, artifact: &Artifact) -> Result<DeliveryReceipt, DeliveryFailed> {
        self.deliver(&artifact.audio, &artifact.references).await
    }

    /// Delivers audio bytes and references.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryFailed`] when the endpoint rejects the request (after
    /// one attempt) or every attempt hits a retryable error.
    pub async fn deliver(
        &self,
        audio: &[u8],
        references: &[String],
    ) -> Result<DeliveryReceipt, DeliveryFailed> {
        info!(
            endpoint = %self.endpoint,
            audio_bytes = audio.len(),
            references = references.len(),
            "Delivering artifact"
        );

        let mut attempt = 1;
        loop {
            match self.attempt(audio, references).await {
                AttemptOutcome::Delivered(status) => {
                    info!(attempt, status = status.as_u16(), "Artifact delivered");
                    return Ok(DeliveryReceipt {
                        attempts: attempt,
                        status: status.as_u16(),
                    });
                }
                AttemptOutcome::Rejected(message) => {
                    error!(attempt, error = %message, "Delivery rejected, not retrying");
                    return Err(DeliveryFailed {
                        attempts: attempt,
                        last_error: message,
                        kind: DeliveryFailureKind::Rejected,
                    });
                }
                AttemptOutcome::Retryable(message) => {
                    if !self.schedule.allows_retry_after(attempt) {
                        error!(attempt, error = %message, "Delivery attempts exhausted");
                        return Err(DeliveryFailed {
                            attempts: attempt,
                            last_error: message,
                            kind: DeliveryFailureKind::Exhausted,
                        });
                    }

                    let delay = self.schedule.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.schedule.max_attempts,
                        delay_secs = delay.as_secs(),
                        error = %message,
                        "Delivery attempt failed, retrying"
                    );
                    self.pause.pause(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, audio: &[u8], references: &[String]) -> AttemptOutcome {
        let form = match build_form(audio, references) {
            Ok(form) => form,
            Err(e) => return AttemptOutcome::Rejected(format!("cannot build request: {e}")),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => AttemptOutcome::Delivered(resp.status()),
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                let message = format!("HTTP {status}: {}", body.trim());
                if status.is_client_error() {
                    AttemptOutcome::Rejected(message)
                } else {
                    AttemptOutcome::Retryable(message)
                }
            }
            Err(e) if e.is_timeout() => AttemptOutcome::Retryable(format!("timed out after {:?}", self.timeout)),
            Err(e) => AttemptOutcome::Retryable(e.to_string()),
        }
    }
}

fn build_form(audio: &[u8], references: &[String]) -> reqwest::Result<Form> {
    let part = Part::bytes(audio.to_vec())
        .file_name("greeting.wav")
        .mime_str("audio/wav")?;
    let mut form = Form::new().part("audio", part);
    if !references.is_empty() {
        form = form.text("references", references.join("\n"));
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(endpoint: String, pause: Arc<RecordingPause>) -> DeliveryClient {
        let config = DeliveryConfig {
            endpoint,
            timeout_secs: 5,
            ..DeliveryConfig::default()
        };
        DeliveryClient::new(&config).unwrap().with_pause(pause)
    }

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|&s| Duration::from_secs(s)).collect()
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/greeting"))
            .and(body_string_contains("name=\"audio\""))
            .and(body_string_contains("https://music.local/stream?id=1\nhttps://music.local/stream?id=2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let pause = Arc::new(RecordingPause::new());
        let client = client(format!("{}/greeting", server.uri()), pause.clone());
        assert!(client.endpoint().ends_with("/greeting"));
        let receipt = client
            .deliver(
                b"RIFF....WAVE",
                &[
                    "https://music.local/stream?id=1".to_string(),
                    "https://music.local/stream?id=2".to_string(),
                ],
            )
            .await
            .unwrap();

        assert_eq!(receipt, DeliveryReceipt { attempts: 1, status: 200 });
        assert!(pause.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_retried_five_times() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/greeting"))
            .respond_with(ResponseTemplate::new(500))
            .expect(5)
            .mount(&server)
            .await;

        let pause = Arc::new(RecordingPause::new());
        let err = client(format!("{}/greeting", server.uri()), pause.clone())
            .deliver(b"RIFF", &[])
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 5);
        assert_eq!(err.kind, DeliveryFailureKind::Exhausted);
        assert!(err.last_error.contains("500"));
        let pauses = pause.pauses();
        assert_eq!(pauses, secs(&[2, 4, 8, 16]));
        assert!(pauses.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_client_error_single_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/greeting"))
            .respond_with(ResponseTemplate::new(400).set_body_string("No audio data received"))
            .expect(1)
            .mount(&server)
            .await;

        let pause = Arc::new(RecordingPause::new());
        let err = client(format!("{}/greeting", server.uri()), pause.clone())
            .deliver(b"", &[])
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert!(err.is_rejected());
        assert!(err.last_error.contains("No audio data received"));
        assert!(pause.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_recovers_after_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let pause = Arc::new(RecordingPause::new());
        let receipt = client(format!("{}/greeting", server.uri()), pause.clone())
            .deliver(b"RIFF", &[])
            .await
            .unwrap();

        assert_eq!(receipt.attempts, 3);
        assert_eq!(pause.pauses(), secs(&[2, 4]));
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let pause = Arc::new(RecordingPause::new());
        let err = client(format!("http://{addr}/greeting"), pause.clone())
            .deliver(b"RIFF", &[])
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 5);
        assert_eq!(err.kind, DeliveryFailureKind::Exhausted);
        assert_eq!(pause.pauses().len(), 4);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let pause = Arc::new(RecordingPause::new());
        let config = DeliveryConfig {
            endpoint: format!("{}/greeting", server.uri()),
            max_attempts: 2,
            timeout_secs: 0,
            ..DeliveryConfig::default()
        };
        let err = DeliveryClient::new(&config)
            .unwrap()
            .with_pause(pause.clone())
            .deliver(b"RIFF", &[])
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 2);
        assert!(err.last_error.contains("timed out"));
        assert_eq!(pause.pauses(), secs(&[2]));
    }
}
