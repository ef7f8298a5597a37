//! Backend selection
//!
//! Picks the embedding backend once at startup from the preferred name and
//! the probed provider availability, and fixes the order in which the
//! remaining providers are tried when the active one fails.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Embedding-producing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// OpenAI-compatible embeddings endpoint
    #[serde(alias = "lm_studio", alias = "lm-studio", alias = "openai")]
    Http,
    /// In-process model
    #[serde(
        alias = "local_model",
        alias = "local",
        alias = "sentence_transformers",
        alias = "fastembed"
    )]
    LocalModel,
    /// No embeddings, substring search only
    #[serde(alias = "none")]
    Simple,
}

impl Backend {
    /// Semantic backends in fallback order
    pub const FALLBACK_ORDER: [Backend; 2] = [Backend::Http, Backend::LocalModel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Http => "http",
            Backend::LocalModel => "local-model",
            Backend::Simple => "simple",
        }
    }

    /// Whether this backend can produce vectors at all
    pub fn is_semantic(&self) -> bool {
        !matches!(self, Backend::Simple)
    }
}

impl std::str::FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "http" | "lm_studio" | "lm-studio" | "openai" => Ok(Backend::Http),
            "local-model" | "local_model" | "local" | "sentence_transformers" | "fastembed" => {
                Ok(Backend::LocalModel)
            }
            "simple" | "none" => Ok(Backend::Simple),
            _ => Err(Error::Config(format!(
                "Invalid backend: {}. Valid options: http, local-model, simple",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider availability established by the startup probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub http: bool,
    pub local_model: bool,
}

impl Availability {
    pub fn is_available(&self, backend: Backend) -> bool {
        match backend {
            Backend::Http => self.http,
            Backend::LocalModel => self.local_model,
            Backend::Simple => true,
        }
    }

    pub fn set(&mut self, backend: Backend, available: bool) {
        match backend {
            Backend::Http => self.http = available,
            Backend::LocalModel => self.local_model = available,
            Backend::Simple => {}
        }
    }
}

/// Pick the active backend.
///
/// An available preferred backend wins; `simple` is honored unconditionally;
/// otherwise the first available provider in [`Backend::FALLBACK_ORDER`],
/// and `simple` when none is.
pub fn select_backend(preferred: Backend, availability: &Availability) -> Backend {
    match preferred {
        Backend::Simple => return Backend::Simple,
        backend if availability.is_available(backend) => return backend,
        _ => {}
    }

    Backend::FALLBACK_ORDER
        .into_iter()
        .find(|b| availability.is_available(*b))
        .unwrap_or(Backend::Simple)
}

/// Selected backend plus the availability it was chosen from.
///
/// Fixed at construction; never re-probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendState {
    pub backend: Backend,
    pub availability: Availability,
}

impl BackendState {
    pub fn new(preferred: Backend, availability: Availability) -> Self {
        BackendState {
            backend: select_backend(preferred, &availability),
            availability,
        }
    }

    /// Backends to try for one embedding, in order.
    ///
    /// The active backend always comes first (even if it has since gone
    /// away); the others follow in fallback order when they were available
    /// at startup. `simple` never appears.
    pub fn attempt_order(&self) -> Vec<Backend> {
        let mut order = Vec::with_capacity(Backend::FALLBACK_ORDER.len());
        if self.backend.is_semantic() {
            order.push(self.backend);
        }
        order.extend(
            Backend::FALLBACK_ORDER
                .into_iter()
                .filter(|b| *b != self.backend && self.availability.is_available(*b)),
        );
        order
    }
}
