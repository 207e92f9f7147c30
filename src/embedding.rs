//! Embedding generation.
//!
//! [`Embedder`] maps an ordered batch of texts to vectors of one fixed
//! dimension, in the same order. [`OllamaEmbedder`] calls a local Ollama
//! server; [`HashingEmbedder`] is a deterministic offline stand-in used by
//! the tests and when no embedding service is available.

use std::{
    hash::{DefaultHasher, Hash, Hasher},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Default Ollama base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default embedding model served by Ollama.
pub const DEFAULT_MODEL: &str = "nomic-embed-text";

/// Dimension of [`HashingEmbedder`] vectors.
pub const HASHING_DIMENSION: usize = 384;

pub trait Embedder: Send + Sync {
    /// Embed `texts`, returning exactly one vector per input, in order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the model producing the vectors.
    fn model_id(&self) -> &str;

    /// Embed a single text.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .pop()
            .ok_or_else(|| Error::Embedding("no embedding returned".into()))
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for Ollama's `POST /api/embed` endpoint.
///
/// Uses a blocking HTTP client. Construct it outside of any async runtime
/// and call it from blocking threads only.
pub struct OllamaEmbedder {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::Embedding(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = texts.len(), model = %self.model, "requesting embeddings");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .map_err(|e| {
                Error::Embedding(format!("request to {} failed: {e}", self.endpoint))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Embedding(format!(
                "{} returned {status}: {body}",
                self.endpoint
            )));
        }

        let parsed: EmbedResponse = response.json().map_err(|e| {
            Error::Embedding(format!("invalid embedding response: {e}"))
        })?;

        check_batch(texts.len(), parsed.embeddings)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OllamaEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaEmbedder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Verify a backend returned one vector per input, all of one dimension.
pub fn check_batch(
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(Error::Embedding(format!(
            "expected {expected} embeddings, got {}",
            vectors.len()
        )));
    }
    if let Some(first) = vectors.first()
        && vectors.iter().any(|v| v.len() != first.len())
    {
        return Err(Error::Embedding(
            "embeddings have inconsistent dimensions".into(),
        ));
    }
    Ok(vectors)
}

/// Feature-hashing embedder.
///
/// Every lower-cased alphanumeric token is hashed into one of `dimension`
/// buckets with a hash-derived sign, and the result is L2-normalised. Texts
/// sharing vocabulary get similar vectors. No network, fully deterministic.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(HASHING_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model_id(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn request_serializes_as_ollama_expects() {
        let input = vec!["first".to_string(), "second".to_string()];
        let json = serde_json::to_value(EmbedRequest {
            model: "nomic-embed-text",
            input: &input,
        })
        .unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "model": "nomic-embed-text",
                "input": ["first", "second"],
            })
        );
    }

    #[test]
    fn response_ignores_extra_fields() {
        let body = r#"{
            "model": "nomic-embed-text",
            "embeddings": [[0.1, 0.2], [0.3, 0.4]],
            "total_duration": 14143917
        }"#;
        let parsed: EmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
        assert_eq!(parsed.embeddings[1], vec![0.3, 0.4]);
    }

    #[test]
    fn endpoint_joins_base_url() {
        let e = OllamaEmbedder::new(
            "http://localhost:11434/",
            DEFAULT_MODEL,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(e.endpoint, "http://localhost:11434/api/embed");
        assert_eq!(e.model_id(), DEFAULT_MODEL);
    }

    #[test]
    fn unreachable_service_is_an_embedding_error() {
        // Port 9 (discard) is closed on test machines.
        let e = OllamaEmbedder::new(
            "http://127.0.0.1:9",
            DEFAULT_MODEL,
            Duration::from_secs(2),
        )
        .unwrap();
        let err = e.embed(&["hello".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[test]
    fn empty_batch_makes_no_request() {
        let e = OllamaEmbedder::new(
            "http://127.0.0.1:9",
            DEFAULT_MODEL,
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(e.embed(&[]).unwrap().is_empty());
    }

    #[test]
    fn check_batch_rejects_count_mismatch() {
        let err = check_batch(3, vec![vec![1.0], vec![2.0]]).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[test]
    fn check_batch_rejects_ragged_dimensions() {
        assert!(check_batch(2, vec![vec![1.0, 0.0], vec![1.0]]).is_err());
        assert!(check_batch(2, vec![vec![1.0, 0.0], vec![0.0, 1.0]]).is_ok());
    }

    #[test]
    fn hashing_embedder_is_normalized_and_deterministic() {
        let e = HashingEmbedder::default();
        let texts = vec!["The quick brown fox".to_string()];
        let a = e.embed(&texts).unwrap();
        let b = e.embed(&texts).unwrap();

        assert_eq!(a, b);
        assert_eq!(a[0].len(), HASHING_DIMENSION);
        assert!((dot(&a[0], &a[0]) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hashing_embedder_ranks_shared_vocabulary_higher() {
        let e = HashingEmbedder::default();
        let query = e.embed_one("solar panel installation").unwrap();
        let near = e.embed_one("notes on solar panel installation costs").unwrap();
        let far = e.embed_one("grandmother's apple pie recipe").unwrap();

        assert!(dot(&query, &near) > dot(&query, &far));
    }

    #[test]
    fn hashing_embedder_blank_text_is_zero_vector() {
        let v = HashingEmbedder::new(8).embed_one("   ").unwrap();
        assert_eq!(v, vec![0.0; 8]);
    }
}
