//! Ollama text and vision client.

use super::{check_status, http_client};
use crate::config::OllamaConfig;
use crate::errors::Result;
use crate::greeting::LanguageModel;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct UnloadRequest<'a> {
    model: &'a str,
    keep_alive: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Talks to `/api/generate`.
///
/// Only one model is kept resident: switching between the text and the
/// vision model unloads the previous one first.
#[derive(Debug)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    vision_model: String,
    loaded: Mutex<Option<String>>,
}

impl OllamaClient {
    /// Creates a client from configuration.
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        Ok(Self {
            http: http_client(concat!("aubade/", env!("CARGO_PKG_VERSION")), config.timeout())?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            vision_model: config.vision_model.clone(),
            loaded: Mutex::new(None),
        })
    }

    async fn switch_to(&self, model: &str) {
        let previous = self.loaded.lock().replace(model.to_string());
        if let Some(previous) = previous.filter(|p| p != model) {
            self.unload(&previous).await;
        }
    }

    /// Asks the server to drop `model` from memory. Failures are logged only.
    pub async fn unload(&self, model: &str) {
        let result = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&UnloadRequest { model, keep_alive: 0 })
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => debug!(model, "Model unloaded"),
            Ok(resp) => warn!(model, status = %resp.status(), "Model unload rejected"),
            Err(e) => warn!(model, error = %e, "Model unload failed"),
        }
    }

    async fn request(&self, model: &str, prompt: &str, images: Vec<String>) -> Result<String> {
        self.switch_to(model).await;
        info!(model, prompt_chars = prompt.len(), images = images.len(), "Sending request to Ollama");

        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&GenerateRequest {
                model,
                prompt,
                stream: false,
                images,
            })
            .send()
            .await?;
        let body: GenerateResponse = check_status("ollama", response).await?.json().await?;
        debug!(model, response_chars = body.response.len(), "Ollama responded");
        Ok(body.response)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.request(&self.model, prompt, Vec::new()).await
    }

    async fn describe_image(&self, prompt: &str, image: &[u8]) -> Result<String> {
        self.request(&self.vision_model, prompt, vec![STANDARD.encode(image)])
            .await
    }
}
