//! Symbol summarization contract.
//!
//! Summaries are an optional enrichment: a missing provider short-circuits
//! with a recorded "summarization skipped" flag, and per-symbol failures are
//! logged and non-fatal. The registry mirrors the embedding client:
//! `provider:model` with `ollama` over local HTTP and `mock` for offline use.

use crate::types::{Result, SeekError};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// What the summarizer gets to look at for one symbol.
#[derive(Debug, Clone)]
pub struct SymbolContext<'a> {
    pub name: &'a str,
    pub kind: &'a str,
    pub signature: Option<&'a str>,
    pub documentation: Option<&'a str>,
    pub code: &'a str,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SummarizerHealth {
    pub healthy: bool,
    pub model_available: bool,
}

pub trait Summarizer: Send + Sync {
    fn model_id(&self) -> &str;
    fn summarize_symbol(&self, ctx: &SymbolContext) -> Result<String>;
    fn health_check(&self) -> Result<SummarizerHealth>;
}

pub fn create_summarizer(model_id: &str) -> Result<Box<dyn Summarizer>> {
    let (provider, model) = model_id
        .split_once(':')
        .ok_or_else(|| SeekError::input(format!("model id '{model_id}' must be provider:model")))?;
    match provider {
        "ollama" => Ok(Box::new(OllamaSummarizer::new(model)?)),
        "mock" => Ok(Box::new(MockSummarizer { model_id: model_id.to_string() })),
        other => Err(SeekError::input(format!("unknown summarization provider '{other}'"))),
    }
}

fn prompt_for(ctx: &SymbolContext) -> String {
    let mut prompt = format!(
        "Summarize the purpose of this {} named `{}` in one sentence.\n",
        ctx.kind, ctx.name
    );
    if let Some(sig) = ctx.signature {
        prompt.push_str(&format!("Signature: {sig}\n"));
    }
    if let Some(doc) = ctx.documentation {
        prompt.push_str(&format!("Doc: {doc}\n"));
    }
    prompt.push_str("Code:\n");
    prompt.push_str(ctx.code);
    prompt
}

// ---------------------------------------------------------------------------
// Ollama
// ---------------------------------------------------------------------------

pub struct OllamaSummarizer {
    model_id: String,
    model: String,
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaTag>,
}

#[derive(Deserialize)]
struct OllamaTag {
    name: String,
}

impl OllamaSummarizer {
    pub fn new(model: &str) -> Result<Self> {
        let base_url = std::env::var("OLLAMA_HOST")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "http://127.0.0.1:11434".to_string());
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SeekError::Summarizer(format!("could not build HTTP client: {e}")))?;
        Ok(OllamaSummarizer {
            model_id: format!("ollama:{model}"),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl Summarizer for OllamaSummarizer {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn summarize_symbol(&self, ctx: &SymbolContext) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "prompt": prompt_for(ctx), "stream": false }))
            .send()
            .map_err(|e| SeekError::Summarizer(format!("{}: {e}", self.model_id)))?;
        if !response.status().is_success() {
            return Err(SeekError::Summarizer(format!(
                "{}: HTTP {}",
                self.model_id,
                response.status()
            )));
        }
        let body: OllamaGenerateResponse = response
            .json()
            .map_err(|e| SeekError::Summarizer(format!("{}: bad response: {e}", self.model_id)))?;
        Ok(body.response.trim().to_string())
    }

    fn health_check(&self) -> Result<SummarizerHealth> {
        let url = format!("{}/api/tags", self.base_url);
        let response = match self.client.get(&url).send() {
            Ok(r) => r,
            Err(_) => return Ok(SummarizerHealth { healthy: false, model_available: false }),
        };
        if !response.status().is_success() {
            return Ok(SummarizerHealth { healthy: false, model_available: false });
        }
        let tags: OllamaTagsResponse = match response.json() {
            Ok(t) => t,
            Err(_) => return Ok(SummarizerHealth { healthy: true, model_available: false }),
        };
        let available = tags
            .models
            .iter()
            .any(|m| m.name == self.model || m.name.starts_with(&format!("{}:", self.model)));
        Ok(SummarizerHealth { healthy: true, model_available: available })
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Deterministic offline summarizer used by tests and dry runs.
pub struct MockSummarizer {
    model_id: String,
}

impl Summarizer for MockSummarizer {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn summarize_symbol(&self, ctx: &SymbolContext) -> Result<String> {
        Ok(format!("{} `{}`", ctx.kind, ctx.name))
    }

    fn health_check(&self) -> Result<SummarizerHealth> {
        Ok(SummarizerHealth { healthy: true, model_available: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry() {
        assert!(create_summarizer("mock:any").is_ok());
        assert!(matches!(create_summarizer("bare"), Err(SeekError::Input(_))));
        assert!(matches!(create_summarizer("azure:gpt"), Err(SeekError::Input(_))));
    }

    #[test]
    fn test_mock_summary_shape() {
        let s = create_summarizer("mock:any").unwrap();
        let out = s
            .summarize_symbol(&SymbolContext {
                name: "validateUser",
                kind: "function",
                signature: Some("function validateUser(id: string)"),
                documentation: None,
                code: "function validateUser(id) { return !!id; }",
            })
            .unwrap();
        assert_eq!(out, "function `validateUser`");
        let health = s.health_check().unwrap();
        assert!(health.healthy && health.model_available);
    }
}
