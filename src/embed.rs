//! Provider-agnostic embedding client.
//!
//! A model identifier of the form `provider:model` selects the backend:
//! `ollama` talks to a local HTTP endpoint, `openai` to an OpenAI-compatible
//! API behind `OPENAI_API_KEY`, and `mock` produces deterministic offline
//! vectors (smoke indexing and tests). All clients are synchronous with a
//! 30 s request timeout; the daemon wraps calls in `spawn_blocking`.

use crate::hash::hash_text;
use crate::types::{Result, SeekError};
use serde::Deserialize;
use serde_json::json;
use std::sync::OnceLock;
use std::time::Duration;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProviderHealth {
    pub ok: bool,
    pub model: String,
    pub dimensions: usize,
}

pub trait EmbeddingProvider: Send + Sync {
    /// Full identifier, `provider:model`.
    fn model_id(&self) -> &str;
    /// Fixed output dimension for this model.
    fn dimensions(&self) -> Result<usize>;
    /// Embed a batch of strings into vectors of `dimensions()` length.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn health_check(&self) -> Result<ProviderHealth>;
}

/// Instantiate a provider from a `provider:model` identifier.
pub fn create_provider(model_id: &str) -> Result<Box<dyn EmbeddingProvider>> {
    let (provider, model) = model_id
        .split_once(':')
        .ok_or_else(|| SeekError::input(format!("model id '{model_id}' must be provider:model")))?;
    if model.is_empty() {
        return Err(SeekError::input(format!("model id '{model_id}' has an empty model name")));
    }
    match provider {
        "ollama" => Ok(Box::new(OllamaProvider::new(model)?)),
        "openai" => Ok(Box::new(OpenAiProvider::new(model)?)),
        "mock" => Ok(Box::new(MockProvider::new(model)?)),
        other => Err(SeekError::input(format!("unknown embedding provider '{other}'"))),
    }
}

fn http_client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| SeekError::provider(format!("could not build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// Ollama
// ---------------------------------------------------------------------------

pub struct OllamaProvider {
    model_id: String,
    model: String,
    base_url: String,
    client: reqwest::blocking::Client,
    dims: OnceLock<usize>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaProvider {
    pub fn new(model: &str) -> Result<Self> {
        let base_url = std::env::var("OLLAMA_HOST")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "http://127.0.0.1:11434".to_string());
        Ok(OllamaProvider {
            model_id: format!("ollama:{model}"),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client()?,
            dims: OnceLock::new(),
        })
    }

    fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .map_err(|e| SeekError::provider(format!("{}: {e}", self.model_id)))?;
        if !response.status().is_success() {
            return Err(SeekError::provider(format!(
                "{}: HTTP {} from {url}",
                self.model_id,
                response.status()
            )));
        }
        let body: OllamaEmbedResponse = response
            .json()
            .map_err(|e| SeekError::provider(format!("{}: bad response: {e}", self.model_id)))?;
        if body.embeddings.len() != texts.len() {
            return Err(SeekError::provider(format!(
                "{}: expected {} vectors, got {}",
                self.model_id,
                texts.len(),
                body.embeddings.len()
            )));
        }
        Ok(body.embeddings)
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> Result<usize> {
        if let Some(d) = self.dims.get() {
            return Ok(*d);
        }
        let probe = self.request(&["dimension probe".to_string()])?;
        let d = probe.first().map(|v| v.len()).unwrap_or(0);
        if d == 0 {
            return Err(SeekError::provider(format!("{}: empty probe vector", self.model_id)));
        }
        Ok(*self.dims.get_or_init(|| d))
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.request(texts)?;
        if let Some(first) = vectors.first() {
            let _ = self.dims.get_or_init(|| first.len());
        }
        Ok(vectors)
    }

    fn health_check(&self) -> Result<ProviderHealth> {
        let dimensions = self.dimensions()?;
        Ok(ProviderHealth { ok: true, model: self.model_id.clone(), dimensions })
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible
// ---------------------------------------------------------------------------

pub struct OpenAiProvider {
    model_id: String,
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    dims: OnceLock<usize>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

impl OpenAiProvider {
    pub fn new(model: &str) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                SeekError::provider("openai provider requires OPENAI_API_KEY".to_string())
            })?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        Ok(OpenAiProvider {
            model_id: format!("openai:{model}"),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: http_client()?,
            dims: OnceLock::new(),
        })
    }

    fn known_dimensions(model: &str) -> Option<usize> {
        match model {
            "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
            "text-embedding-3-large" => Some(3072),
            _ => None,
        }
    }
}

impl EmbeddingProvider for OpenAiProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> Result<usize> {
        if let Some(d) = self.dims.get() {
            return Ok(*d);
        }
        if let Some(d) = Self::known_dimensions(&self.model) {
            return Ok(*self.dims.get_or_init(|| d));
        }
        let probe = self.embed(&["dimension probe".to_string()])?;
        let d = probe.first().map(|v| v.len()).unwrap_or(0);
        if d == 0 {
            return Err(SeekError::provider(format!("{}: empty probe vector", self.model_id)));
        }
        Ok(*self.dims.get_or_init(|| d))
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .map_err(|e| SeekError::provider(format!("{}: {e}", self.model_id)))?;
        if !response.status().is_success() {
            return Err(SeekError::provider(format!(
                "{}: HTTP {}",
                self.model_id,
                response.status()
            )));
        }
        let body: OpenAiEmbedResponse = response
            .json()
            .map_err(|e| SeekError::provider(format!("{}: bad response: {e}", self.model_id)))?;
        if body.data.len() != texts.len() {
            return Err(SeekError::provider(format!(
                "{}: expected {} vectors, got {}",
                self.model_id,
                texts.len(),
                body.data.len()
            )));
        }
        let vectors: Vec<Vec<f32>> = body.data.into_iter().map(|d| d.embedding).collect();
        if let Some(first) = vectors.first() {
            let _ = self.dims.get_or_init(|| first.len());
        }
        Ok(vectors)
    }

    fn health_check(&self) -> Result<ProviderHealth> {
        let dimensions = self.dimensions()?;
        Ok(ProviderHealth { ok: true, model: self.model_id.clone(), dimensions })
    }
}

// ---------------------------------------------------------------------------
// Mock (deterministic, offline)
// ---------------------------------------------------------------------------

/// Deterministic vectors derived from the content hash. Not semantically
/// meaningful, but stable across runs and platforms, which is exactly what
/// offline smoke indexing and the test suite need.
pub struct MockProvider {
    model_id: String,
    dims: usize,
}

impl MockProvider {
    pub fn new(spec: &str) -> Result<Self> {
        let dims: usize = spec
            .parse()
            .map_err(|_| SeekError::input(format!("mock provider expects mock:<dims>, got '{spec}'")))?;
        if dims == 0 {
            return Err(SeekError::input("mock dimension must be positive".to_string()));
        }
        Ok(MockProvider { model_id: format!("mock:{dims}"), dims })
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        // Expand the content hash into as many pseudo-random floats as the
        // dimension needs, then L2-normalize.
        let mut values = Vec::with_capacity(self.dims);
        let mut block = 0usize;
        while values.len() < self.dims {
            let digest = hash_text(&format!("{block}:{text}"));
            for pair in digest.as_bytes().chunks(2) {
                if values.len() == self.dims {
                    break;
                }
                let byte = u8::from_str_radix(std::str::from_utf8(pair).unwrap_or("00"), 16)
                    .unwrap_or(0);
                values.push((byte as f32 - 127.5) / 127.5);
            }
            block += 1;
        }
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt().max(1e-9);
        values.iter().map(|v| v / norm).collect()
    }
}

impl EmbeddingProvider for MockProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> Result<usize> {
        Ok(self.dims)
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn health_check(&self) -> Result<ProviderHealth> {
        Ok(ProviderHealth { ok: true, model: self.model_id.clone(), dimensions: self.dims })
    }
}

// ---------------------------------------------------------------------------
// Vector math shared by search and rerank
// ---------------------------------------------------------------------------

/// Cosine similarity; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Cosine distance as reported by vector search: `1 − similarity`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_parses_model_ids() {
        assert!(create_provider("mock:384").is_ok());
        assert!(matches!(create_provider("no-colon"), Err(SeekError::Input(_))));
        assert!(matches!(create_provider("mock:"), Err(SeekError::Input(_))));
        assert!(matches!(create_provider("warp:engine"), Err(SeekError::Input(_))));
    }

    #[test]
    fn test_mock_provider_is_deterministic() {
        let p = MockProvider::new("64").unwrap();
        let a = p.embed(&["hello".to_string()]).unwrap();
        let b = p.embed(&["hello".to_string()]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 64);

        let c = p.embed(&["different".to_string()]).unwrap();
        assert_ne!(a[0], c[0]);

        // normalized
        let norm: f32 = a[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_cosine_math() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0];
        let c = vec![0.0, 1.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert!((cosine_distance(&a, &c) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_health_check_mock() {
        let p = MockProvider::new("128").unwrap();
        let h = p.health_check().unwrap();
        assert!(h.ok);
        assert_eq!(h.dimensions, 128);
        assert_eq!(h.model, "mock:128");
    }
}
