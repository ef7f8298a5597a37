//! Local embedding generation via fastembed
//!
//! Default model is all-MiniLM-L6-v2 (384 dimensions). The model is
//! downloaded and loaded on first use, on the blocking pool, and shared by
//! every later call.

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::embedding::EmbeddingProvider;
use super::selector::Backend;
use crate::config::LocalEmbeddingConfig;
use crate::error::{Error, Result};

/// Map a model name to a fastembed model
pub fn parse_model(name: &str) -> Result<EmbeddingModel> {
    let model = match name {
        "all-MiniLM-L6-v2" | "AllMiniLML6V2" => EmbeddingModel::AllMiniLML6V2,
        "all-MiniLM-L12-v2" | "AllMiniLML12V2" => EmbeddingModel::AllMiniLML12V2,
        "bge-small-en-v1.5" | "BGESmallENV15" => EmbeddingModel::BGESmallENV15,
        "bge-base-en-v1.5" | "BGEBaseENV15" => EmbeddingModel::BGEBaseENV15,
        "nomic-embed-text-v1.5" | "NomicEmbedTextV15" => EmbeddingModel::NomicEmbedTextV15,
        "multilingual-e5-small" | "MultilingualE5Small" => EmbeddingModel::MultilingualE5Small,
        "multilingual-e5-base" | "MultilingualE5Base" => EmbeddingModel::MultilingualE5Base,
        _ => {
            return Err(Error::Config(format!(
                "Unknown local embedding model: '{}'. Supported models: all-MiniLM-L6-v2, \
                 all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5, nomic-embed-text-v1.5, \
                 multilingual-e5-small, multilingual-e5-base",
                name
            )));
        }
    };
    Ok(model)
}

/// In-process embedding provider wrapping fastembed
#[derive(Clone)]
pub struct LocalEmbeddingProvider {
    enabled: bool,
    model_name: EmbeddingModel,
    model: Arc<OnceCell<Arc<TextEmbedding>>>,
}

impl LocalEmbeddingProvider {
    /// Create the provider; the model itself loads on first use
    pub fn new(config: &LocalEmbeddingConfig) -> Result<Self> {
        Ok(LocalEmbeddingProvider {
            enabled: config.enabled,
            model_name: parse_model(&config.model)?,
            model: Arc::new(OnceCell::new()),
        })
    }

    async fn model(&self) -> Result<Arc<TextEmbedding>> {
        if !self.enabled {
            return Err(Error::provider(Backend::LocalModel, "local model disabled"));
        }

        self.model
            .get_or_try_init(|| async {
                let model_name = self.model_name.clone();
                let model = tokio::task::spawn_blocking(move || {
                    TextEmbedding::try_new(
                        InitOptions::new(model_name).with_show_download_progress(false),
                    )
                })
                .await
                .map_err(|e| Error::Internal(format!("Embedding task join error: {}", e)))?
                .map_err(|e| {
                    Error::provider(
                        Backend::LocalModel,
                        format!("Failed to init embedding model: {}", e),
                    )
                })?;
                info!("Local embedding model loaded: {:?}", self.model_name);
                Ok::<_, Error>(Arc::new(model))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    fn backend(&self) -> Backend {
        Backend::LocalModel
    }

    async fn probe(&self) -> bool {
        match self.model().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Local embedding model unavailable: {}", e);
                false
            }
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model().await?;
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let embeddings = model
                .embed(vec![text], None)
                .map_err(|e| {
                    Error::provider(Backend::LocalModel, format!("Embedding error: {}", e))
                })?;
            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| Error::provider(Backend::LocalModel, "No embedding returned"))
        })
        .await
        .map_err(|e| Error::Internal(format!("Embedding task join error: {}", e)))?
    }
}
