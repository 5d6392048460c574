//! Remote Ollama embedding proxy provider.
//!
//! Forwards embedding requests to an Ollama server's `/api/embeddings`
//! endpoint. `load` validates the configuration and builds the HTTP client;
//! no network probe is made until the first embedding request.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::config::OllamaProviderConfig;

/// Remote embedding provider backed by an Ollama server.
pub struct OllamaProvider {
    model_name: String,
    url: String,
    timeout_secs: u64,
    client: Option<reqwest::blocking::Client>,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaProvider {
    /// Construct an unloaded provider. Model name `"default"` resolves to the
    /// configured proxy model. Per-load `parameters` keys `url` and `model`
    /// override the config for this instance only.
    pub fn new(
        model_name: &str,
        config: &OllamaProviderConfig,
        parameters: Option<&serde_json::Value>,
    ) -> Self {
        let param = |key: &str| {
            parameters
                .and_then(|p| p.get(key))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let model_name = param("model").unwrap_or_else(|| {
            if model_name == "default" {
                config.model.clone()
            } else {
                model_name.to_string()
            }
        });
        let url = param("url").unwrap_or_else(|| config.url.clone());
        Self {
            model_name,
            url,
            timeout_secs: config.timeout_secs,
            client: None,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.url.trim_end_matches('/'))
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn load(&mut self) -> Result<()> {
        anyhow::ensure!(
            !self.model_name.is_empty() && !self.url.is_empty(),
            "model name or proxy url is missing"
        );
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        self.client = Some(client);
        tracing::info!(url = %self.url, model = %self.model_name, "Ollama proxy ready");
        Ok(())
    }

    fn unload(&mut self) {
        self.client = None;
    }

    fn get_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("model '{}' is not loaded", self.model_name))?;

        let response = client
            .post(self.endpoint())
            .json(&EmbeddingsRequest {
                model: &self.model_name,
                prompt: text,
            })
            .send()
            .with_context(|| format!("embedding request to {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_else(|_| "unknown error".into());
            anyhow::bail!("Ollama returned HTTP {status}: {detail}");
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .context("failed to parse Ollama embedding response")?;

        anyhow::ensure!(
            !parsed.embedding.is_empty(),
            "Ollama returned an empty embedding for model '{}'",
            self.model_name
        );
        Ok(parsed.embedding)
    }

    fn describe(&self) -> String {
        format!("Ollama embedding proxy model '{}'", self.model_name)
    }
}
