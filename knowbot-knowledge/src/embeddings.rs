use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::KnowledgeSettings;
use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::storage::EMBEDDING_DIM;

/// Turns text into a fixed-length vector.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> KnowledgeResult<Vec<f32>>;
}

/// Pick the remote provider when a credential is configured, the local
/// deterministic embedder otherwise.
pub fn embedding_provider(
    settings: &KnowledgeSettings,
    api_key: Option<&str>,
) -> KnowledgeResult<Arc<dyn EmbeddingProvider>> {
    match api_key {
        Some(key) => Ok(Arc::new(RemoteEmbeddingClient::new(settings, key)?)),
        None => Ok(Arc::new(LocalEmbedder)),
    }
}

#[derive(Debug, Clone)]
pub struct RemoteEmbeddingClient {
    url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl RemoteEmbeddingClient {
    pub fn new(settings: &KnowledgeSettings, api_key: &str) -> KnowledgeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self {
            url: settings.embedding_url.trim_end_matches('/').to_string(),
            model: settings.embedding_model.clone(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for RemoteEmbeddingClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> KnowledgeResult<Vec<f32>> {
        let body = EmbedRequest {
            input: text,
            model: &self.model,
        };

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(KnowledgeError::Embedding(format!(
                "embedding request failed: {status} {text}"
            )));
        }

        let payload: EmbedResponse = response.json().await?;
        let embedding = payload
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| {
                KnowledgeError::Embedding("embedding response missing vectors".to_string())
            })?;

        if embedding.len() != EMBEDDING_DIM {
            return Err(KnowledgeError::EmbeddingDimMismatch {
                expected: EMBEDDING_DIM,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

const MAX_WORDS: usize = 80;
const WINDOW: usize = 18;
const WINDOW_SPAN: usize = 1500;
const SPREAD: f32 = 0.3;
const BASELINE: f32 = 0.05;

const SYNONYMS: &[(&str, &[&str])] = &[
    ("car", &["automobile", "vehicle", "ride"]),
    ("happy", &["glad", "joyful", "content"]),
    ("ai", &["artificial", "intelligence", "ml"]),
];

fn synonyms(word: &str) -> &'static [&'static str] {
    SYNONYMS
        .iter()
        .find(|(seed, _)| *seed == word)
        .map(|(_, related)| *related)
        .unwrap_or(&[])
}

/// Deterministic embedder that needs no external model.
///
/// Each word (plus its synonyms) hashes into an 18-wide window whose offset
/// depends on the word position, with 30% spill into both neighbours.
/// Identical input always yields bit-identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEmbedder;

impl LocalEmbedder {
    pub fn embed_text(text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let mut vector = vec![0.0f32; EMBEDDING_DIM];

        for (position, word) in lowered.split_whitespace().take(MAX_WORDS).enumerate() {
            let dim_start = (position * WINDOW) % WINDOW_SPAN;
            let tokens = std::iter::once(word).chain(synonyms(word).iter().copied());

            for token in tokens {
                let digest = md5::compute(token.as_bytes());
                for j in 0..WINDOW {
                    let dim = dim_start + j;
                    if dim >= EMBEDDING_DIM {
                        break;
                    }
                    let value = (f32::from(digest[j % 16]) - 127.5) / 255.0;

                    vector[dim] += value;
                    if dim + 1 < EMBEDDING_DIM {
                        vector[dim + 1] += value * SPREAD;
                    }
                    if dim >= 1 {
                        vector[dim - 1] += value * SPREAD;
                    }
                }
            }
        }

        for value in vector.iter_mut() {
            if *value == 0.0 {
                *value = BASELINE;
            }
        }

        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for LocalEmbedder {
    fn name(&self) -> &str {
        "local"
    }

    async fn embed(&self, text: &str) -> KnowledgeResult<Vec<f32>> {
        Ok(Self::embed_text(text))
    }
}

/// Cosine distance (`1 - cosine similarity`); 0 means same direction.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_embedding_has_fixed_length_and_no_empty_dims() {
        let vector = LocalEmbedder::embed_text("What is our refund policy?");
        assert_eq!(vector.len(), EMBEDDING_DIM);
        assert!(vector.iter().all(|v| *v != 0.0));
        assert!(vector.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn local_embedding_is_bit_identical() {
        let a = LocalEmbedder::embed_text("Refunds are issued within 14 days");
        let b = LocalEmbedder::embed_text("Refunds are issued within 14 days");
        let a_bits: Vec<u32> = a.iter().map(|v| v.to_bits()).collect();
        let b_bits: Vec<u32> = b.iter().map(|v| v.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
    }

    #[test]
    fn empty_text_is_all_baseline() {
        let vector = LocalEmbedder::embed_text("   ");
        assert!(vector.iter().all(|v| *v == BASELINE));
    }

    #[test]
    fn first_word_fills_its_window_and_spills_once() {
        let vector = LocalEmbedder::embed_text("refund");
        let digest = md5::compute(b"refund");

        // Dimension 18 only receives spill from dimension 17.
        let last = (f32::from(digest[17 % 16]) - 127.5) / 255.0;
        let expected_spill = last * SPREAD;
        if expected_spill != 0.0 {
            assert_eq!(vector[18], expected_spill);
        }
        assert!(vector[19..].iter().all(|v| *v == BASELINE));
    }

    #[test]
    fn case_is_ignored() {
        assert_eq!(
            LocalEmbedder::embed_text("Refund Policy"),
            LocalEmbedder::embed_text("refund policy")
        );
    }

    #[test]
    fn words_past_the_cap_are_ignored() {
        let base: Vec<String> = (0..80).map(|i| format!("w{i}")).collect();
        let mut extended = base.clone();
        extended.push("overflow".to_string());

        assert_eq!(
            LocalEmbedder::embed_text(&base.join(" ")),
            LocalEmbedder::embed_text(&extended.join(" "))
        );
    }

    #[test]
    fn shared_words_are_closer_than_unrelated_words() {
        let a = LocalEmbedder::embed_text("refund policy for customers");
        let b = LocalEmbedder::embed_text("refund window for purchases");
        let c = LocalEmbedder::embed_text("office wifi password reset");

        assert!(cosine_distance(&a, &b) < cosine_distance(&a, &c));
    }

    #[test]
    fn synonyms_pull_vectors_together() {
        let a = LocalEmbedder::embed_text("car");
        let b = LocalEmbedder::embed_text("vehicle");
        let c = LocalEmbedder::embed_text("invoice");

        assert!(cosine_distance(&a, &b) < cosine_distance(&a, &c));
    }

    #[test]
    fn cosine_distance_of_identical_vectors_is_zero() {
        let a = LocalEmbedder::embed_text("hello world");
        assert!(cosine_distance(&a, &a).abs() < 1e-5);
    }

    #[tokio::test]
    async fn provider_selection_follows_credential() {
        let settings = KnowledgeSettings::default();
        let local = embedding_provider(&settings, None).unwrap();
        assert_eq!(local.name(), "local");

        let remote = embedding_provider(&settings, Some("sk-test")).unwrap();
        assert_eq!(remote.name(), "text-embedding-3-small");
    }

    #[cfg(feature = "live-tests")]
    #[tokio::test]
    async fn live_remote_embedding() {
        knowbot_core::load_dotenv();
        let Ok(key) = std::env::var("OPENAI_API_KEY") else {
            return;
        };
        let client = RemoteEmbeddingClient::new(&KnowledgeSettings::default(), &key).unwrap();
        let vector = client.embed("refund policy").await.unwrap();
        assert_eq!(vector.len(), EMBEDDING_DIM);
    }
}
