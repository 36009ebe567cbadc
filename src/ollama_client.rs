//! # Text Generation Module
//!
//! This module defines the text-generation capability consumed by the recipe
//! synthesizer and its HTTP implementation against a local Ollama server.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::GeneratorConfig;
use crate::planner_errors::CapabilityError;

/// Sampling parameters sent with a generation request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
    /// Output cap in tokens
    pub max_tokens: u32,
}

impl SamplingOptions {
    /// Fixed parameters used for recipe generation
    pub fn recipe() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 2000,
        }
    }
}

impl From<&GeneratorConfig> for SamplingOptions {
    fn from(config: &GeneratorConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        }
    }
}

/// Anything that can turn a prompt into free text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &SamplingOptions,
    ) -> Result<String, CapabilityError>;
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// HTTP client for the Ollama `/api/generate` endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(config: &GeneratorConfig) -> Result<Self, CapabilityError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        info!(base_url = %config.base_url, "Created Ollama client");
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Names of the models installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>, CapabilityError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?;
        let body = read_success_body(response).await?;

        let tags: TagsResponse = serde_json::from_str(&body)
            .map_err(|e| CapabilityError::MalformedEnvelope(e.to_string()))?;
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &SamplingOptions,
    ) -> Result<String, CapabilityError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = build_request(model, prompt, options);

        debug!(model = %model, prompt_len = prompt.len(), "Sending generation request");
        let response = self.client.post(&url).json(&request).send().await?;
        let body = read_success_body(response).await?;

        let text = parse_generate_envelope(&body)?;
        debug!(response_len = text.len(), "Received generated text");
        Ok(text)
    }
}

fn build_request<'a>(model: &'a str, prompt: &'a str, options: &SamplingOptions) -> GenerateRequest<'a> {
    GenerateRequest {
        model,
        prompt,
        stream: false,
        options: GenerateOptions {
            temperature: options.temperature,
            top_p: options.top_p,
            num_predict: options.max_tokens,
        },
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<String, CapabilityError> {
    let status = response.status();
    if status.is_success() {
        Ok(response.text().await?)
    } else {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        Err(CapabilityError::Status { status, body })
    }
}

/// Pull the generated text out of a non-streaming `/api/generate` body
pub fn parse_generate_envelope(body: &str) -> Result<String, CapabilityError> {
    let envelope: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| CapabilityError::MalformedEnvelope(e.to_string()))?;

    if !envelope.done {
        debug!("Generation envelope not marked done; using partial text");
    }
    Ok(envelope.response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = build_request("llama3.2:latest", "Make soup", &SamplingOptions::recipe());
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "llama3.2:latest");
        assert_eq!(body["prompt"], "Make soup");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 2000);
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!((body["options"]["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_parse_envelope() {
        let body = r#"{"model":"llama3.2","response":"{\"name\": \"Upma\"}","done":true}"#;
        assert_eq!(parse_generate_envelope(body).unwrap(), "{\"name\": \"Upma\"}");
    }

    #[test]
    fn test_malformed_envelope() {
        let err = parse_generate_envelope("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, CapabilityError::MalformedEnvelope(_)));

        let err = parse_generate_envelope(r#"{"done": true}"#).unwrap_err();
        assert!(matches!(err, CapabilityError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_sampling_from_config() {
        let options = SamplingOptions::from(&GeneratorConfig::default());
        assert_eq!(options, SamplingOptions::recipe());
    }
}
