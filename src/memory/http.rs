//! HTTP embedding provider
//!
//! Talks to any OpenAI-compatible `/embeddings` endpoint (LM Studio,
//! Ollama's OpenAI shim, OpenAI itself). Transient failures are retried with
//! exponential backoff; the client timeout bounds every request.

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::embedding::EmbeddingProvider;
use super::selector::Backend;
use crate::config::HttpEmbeddingConfig;
use crate::error::{Error, Result};

/// Delay before the first retry
const RETRY_INITIAL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// OpenAI-compatible embeddings client
#[derive(Clone)]
pub struct HttpEmbeddingProvider {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

impl HttpEmbeddingProvider {
    /// Create a new HTTP provider; does not contact the endpoint
    pub fn new(config: &HttpEmbeddingConfig) -> Result<Self> {
        Url::parse(&config.endpoint).map_err(|e| {
            Error::Config(format!("Invalid embedding endpoint {}: {}", config.endpoint, e))
        })?;

        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
                    .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
            );
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(HttpEmbeddingProvider {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout,
            max_retries: config.max_retries,
        })
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(RETRY_INITIAL_INTERVAL)
            .with_max_elapsed_time(Some(self.timeout))
            .build()
    }

    /// One request, no retries
    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: [text],
        };

        debug!("Requesting embedding: model={}", self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body = response.json::<EmbeddingResponse>().await?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::provider(Backend::Http, "empty embedding response"))
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn backend(&self) -> Backend {
        Backend::Http
    }

    async fn probe(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Embedding endpoint {} answered {}", url, response.status());
                false
            }
            Err(e) => {
                warn!("Embedding endpoint {} unreachable: {}", url, e);
                false
            }
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let max_retries = self.max_retries;
        let mut attempt = 0u32;

        retry(self.backoff_policy(), || {
            attempt += 1;
            let current = attempt;
            async move {
                self.request_embedding(text).await.map_err(|e| {
                    if e.is_retryable() && current <= max_retries {
                        warn!("Embedding request failed (attempt {}), retrying: {}", current, e);
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
        .map_err(|e| match e {
            Error::ProviderTransport { .. } => e,
            other => Error::provider(Backend::Http, other.to_string()),
        })
    }
}
