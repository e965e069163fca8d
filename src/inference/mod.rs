//! Inference paths
//!
//! The local engine, the shared result types both paths produce, and the
//! hybrid selector that chooses between them.

pub mod hybrid;
pub mod local;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use hybrid::{execute_with_fallback, ExecutionPath, FallbackNotice, HybridExecutor, HybridOutcome};
pub use local::LocalModel;

/// Local inference errors
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Local inference unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Local inference failed: {0}")]
    Failed(String),
}

/// User intent labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Question,
    Command,
    ImageRequest,
    SpeechRequest,
    Research,
    Chat,
}

impl Intent {
    pub const ALL: [Intent; 6] = [
        Intent::Question,
        Intent::Command,
        Intent::ImageRequest,
        Intent::SpeechRequest,
        Intent::Research,
        Intent::Chat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Question => "question",
            Intent::Command => "command",
            Intent::ImageRequest => "image_request",
            Intent::SpeechRequest => "speech_request",
            Intent::Research => "research",
            Intent::Chat => "chat",
        }
    }

    /// Parse a label produced by a model; tolerant of case and spacing
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label
            .trim()
            .trim_matches(|c: char| c == '"' || c == '.' || c == '`')
            .to_lowercase()
            .replace([' ', '-'], "_");
        Intent::ALL
            .into_iter()
            .find(|intent| intent.as_str() == normalized)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentPrediction {
    pub intent: Intent,
    /// 0.0 - 1.0
    pub confidence: f32,
}

/// Engine that runs in-process
#[async_trait]
pub trait LocalEngine: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, InferenceError>;
    async fn classify_intent(&self, text: &str) -> Result<IntentPrediction, InferenceError>;
    async fn generate_text(&self, prompt: &str) -> Result<String, InferenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_from_label() {
        assert_eq!(Intent::from_label("Image Request"), Some(Intent::ImageRequest));
        assert_eq!(Intent::from_label(" \"research\". "), Some(Intent::Research));
        assert_eq!(Intent::from_label("speech-request"), Some(Intent::SpeechRequest));
        assert_eq!(Intent::from_label("poetry"), None);
    }
}
