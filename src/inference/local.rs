//! In-process inference engine
//!
//! Embeddings and intent classification run on the CPU with no model files.
//! Text generation needs an accelerator and a loaded generator; without both
//! it reports [`InferenceError::Unavailable`] so the hybrid selector falls
//! back to the server.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::inference::{InferenceError, Intent, IntentPrediction, LocalEngine};
use crate::system::accelerator::{detect_accelerator, AcceleratorInfo};

/// Embedding width
pub const EMBEDDING_DIM: usize = 256;

/// Upper bound on texts per embed call
pub const MAX_EMBED_BATCH: usize = 128;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}']+").expect("valid regex"));

static INTENT_RULES: Lazy<Vec<(Intent, Regex)>> = Lazy::new(|| {
    let rules = [
        (
            Intent::ImageRequest,
            r"(?i)\b(draw|paint|sketch|illustrat\w*|image|picture|photo|logo|render)\b",
        ),
        (
            Intent::SpeechRequest,
            r"(?i)\b(read (it|this) aloud|say|speak|voice|narrat\w*|pronounce|audio)\b",
        ),
        (
            Intent::Research,
            r"(?i)\b(research|trend\w*|compare|analy[sz]\w*|sources?|latest|news)\b",
        ),
        (
            Intent::Command,
            r"(?i)^\s*(please\s+)?(create|make|write|generate|send|delete|open|set|turn|start|stop)\b",
        ),
        (
            Intent::Question,
            r"(?i)(\?\s*$|^\s*(who|what|when|where|why|how|which|is|are|can|does|do)\b)",
        ),
    ];

    rules
        .into_iter()
        .map(|(intent, pattern)| (intent, Regex::new(pattern).expect("valid regex")))
        .collect()
});

/// Pluggable local text generator (e.g. a quantised on-device model)
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, InferenceError>;
}

/// CPU embedder/classifier with an optional accelerated generator
pub struct LocalModel {
    accelerator: AcceleratorInfo,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl LocalModel {
    /// Probe the machine for an accelerator
    pub fn detect() -> Self {
        Self::with_accelerator(detect_accelerator())
    }

    pub fn with_accelerator(accelerator: AcceleratorInfo) -> Self {
        Self {
            accelerator,
            generator: None,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn accelerator(&self) -> &AcceleratorInfo {
        &self.accelerator
    }
}

#[async_trait]
impl LocalEngine for LocalModel {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, InferenceError> {
        if texts.is_empty() {
            return Err(InferenceError::InvalidInput("no texts to embed".into()));
        }
        if texts.len() > MAX_EMBED_BATCH {
            return Err(InferenceError::InvalidInput(format!(
                "batch of {} exceeds limit of {}",
                texts.len(),
                MAX_EMBED_BATCH
            )));
        }

        Ok(texts.iter().map(|t| hash_embedding(t)).collect())
    }

    async fn classify_intent(&self, text: &str) -> Result<IntentPrediction, InferenceError> {
        if text.trim().is_empty() {
            return Err(InferenceError::InvalidInput("empty text".into()));
        }
        Ok(classify(text))
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, InferenceError> {
        if !self.accelerator.available {
            return Err(InferenceError::Unavailable(format!(
                "text generation needs an accelerator ({})",
                self.accelerator.name
            )));
        }
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| InferenceError::Unavailable("no local text model loaded".into()))?;

        generator.generate(prompt).await
    }
}

/// Signed feature hashing over lowercase tokens, L2-normalised.
///
/// Empty or token-free input maps to the zero vector.
pub fn hash_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];

    let lowered = text.to_lowercase();
    for token in TOKEN_RE.find_iter(&lowered) {
        let hash = fnv1a(token.as_str().as_bytes());
        let index = (hash % EMBEDDING_DIM as u64) as usize;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn classify(text: &str) -> IntentPrediction {
    let mut best: Option<(Intent, usize)> = None;
    let mut total = 0usize;

    for (intent, re) in INTENT_RULES.iter() {
        let hits = re.find_iter(text).count();
        total += hits;
        // Earlier rules win ties
        if hits > 0 && best.map_or(true, |(_, h)| hits > h) {
            best = Some((*intent, hits));
        }
    }

    match best {
        Some((intent, hits)) => IntentPrediction {
            intent,
            confidence: (0.5 + 0.5 * hits as f32 / total as f32).min(1.0),
        },
        None => IntentPrediction {
            intent: Intent::Chat,
            confidence: 0.5,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::accelerator::AcceleratorBackend;

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, InferenceError> {
            Ok(format!("echo: {}", prompt))
        }
    }

    fn gpu() -> AcceleratorInfo {
        AcceleratorInfo {
            name: "Test GPU".into(),
            backend: AcceleratorBackend::Vulkan,
            available: true,
        }
    }

    #[test]
    fn test_embedding_is_normalized_and_deterministic() {
        let a = hash_embedding("The quick brown fox");
        let b = hash_embedding("the QUICK brown fox");
        assert_eq!(a.len(), EMBEDDING_DIM);
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_embedding_of_punctuation_is_zero() {
        assert!(hash_embedding("?!...").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_classify_examples() {
        assert_eq!(classify("Draw me a picture of a cat").intent, Intent::ImageRequest);
        assert_eq!(classify("What time is it?").intent, Intent::Question);
        assert_eq!(classify("hello there friend").intent, Intent::Chat);
        assert_eq!(
            classify("research the latest trends in solar").intent,
            Intent::Research
        );
    }

    #[tokio::test]
    async fn test_embed_rejects_empty_batch() {
        let model = LocalModel::with_accelerator(AcceleratorInfo::unavailable());
        let err = model.embed(&[]).await.unwrap_err();
        assert!(matches!(err, InferenceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_generation_unavailable_without_accelerator() {
        let model = LocalModel::with_accelerator(AcceleratorInfo::unavailable())
            .with_generator(Arc::new(EchoGenerator));
        let err = model.generate_text("hi").await.unwrap_err();
        assert!(matches!(err, InferenceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_generation_unavailable_without_model() {
        let model = LocalModel::with_accelerator(gpu());
        let err = model.generate_text("hi").await.unwrap_err();
        assert!(matches!(err, InferenceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_generation_with_accelerator_and_model() {
        let model = LocalModel::with_accelerator(gpu()).with_generator(Arc::new(EchoGenerator));
        assert_eq!(model.generate_text("hi").await.unwrap(), "echo: hi");
    }
}
