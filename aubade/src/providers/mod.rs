//! Concrete collaborators for the greeting stages.
//!
//! Each adapter is a thin client over one external service. Failures are
//! reported as [`AubadeError::Collaborator`] or [`AubadeError::Http`] so the
//! stages can decide between retry and absence.

mod gutendex;
mod navidrome;
mod nws;
mod ollama;
mod speech;

pub use gutendex::{extract_excerpt, GutendexLiterature};
pub use navidrome::NavidromeLibrary;
pub use nws::NwsWeather;
pub use ollama::OllamaClient;
pub use speech::CommandSpeech;

use crate::config::AubadeConfig;
use crate::errors::{AubadeError, Result};
use crate::greeting::Collaborators;
use std::sync::Arc;
use std::time::Duration;

/// Builds an HTTP client with a timeout and user agent.
pub(crate) fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(AubadeError::from)
}

/// Turns a non-success response into a collaborator error.
pub(crate) async fn check_status(service: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AubadeError::collaborator(
        service,
        format!("HTTP {status}: {}", body.trim()),
    ))
}

/// Builds every collaborator from configuration.
pub fn collaborators_from_config(config: &AubadeConfig) -> Result<Collaborators> {
    Ok(Collaborators {
        weather: Arc::new(NwsWeather::new(&config.weather, config.location.latitude, config.location.longitude)?),
        literature: Arc::new(GutendexLiterature::new(&config.literature)?),
        library: Arc::new(NavidromeLibrary::new(&config.navidrome)?),
        model: Arc::new(OllamaClient::new(&config.ollama)?),
        speech: Arc::new(CommandSpeech::from_config(&config.tts)),
    })
}
