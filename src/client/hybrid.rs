//! Hybrid AI hook
//!
//! Runs embeddings, intent classification and text generation on the local
//! engine when the preference allows it, and falls back to `ai-chat`.

use std::sync::Arc;

use crate::client::{ClientError, FunctionsClient};
use crate::functions::ai_chat::{ChatTask, ChatTaskResponse};
use crate::inference::{
    ExecutionPath, FallbackNotice, HybridExecutor, HybridOutcome, IntentPrediction, LocalEngine,
};
use crate::types::message::ChatMessage;

pub struct HybridAi {
    local: Arc<dyn LocalEngine>,
    functions: Arc<FunctionsClient>,
    executor: HybridExecutor,
    preference: ExecutionPath,
}

impl HybridAi {
    pub fn new(local: Arc<dyn LocalEngine>, functions: Arc<FunctionsClient>) -> Self {
        Self {
            local,
            functions,
            executor: HybridExecutor::new(),
            preference: ExecutionPath::default(),
        }
    }

    pub fn preference(&self) -> ExecutionPath {
        self.preference
    }

    pub fn set_preference(&mut self, preference: ExecutionPath) {
        self.preference = preference;
    }

    /// Set while the last call was served by the fallback
    pub fn notice(&self) -> FallbackNotice {
        self.executor.notice()
    }

    pub fn executor(&self) -> &HybridExecutor {
        &self.executor
    }

    pub async fn embed(&self, texts: &[String]) -> Result<HybridOutcome<Vec<Vec<f32>>>, ClientError> {
        self.executor
            .run(
                self.preference,
                || self.local.embed(texts),
                || async {
                    match self.server(ChatTask::Embed { texts: texts.to_vec() }).await? {
                        ChatTaskResponse::Embed { embeddings, .. } => Ok::<_, ClientError>(embeddings),
                        _ => Err(ClientError::UnexpectedResponse("embed")),
                    }
                },
            )
            .await
    }

    pub async fn classify_intent(
        &self,
        text: &str,
    ) -> Result<HybridOutcome<IntentPrediction>, ClientError> {
        self.executor
            .run(
                self.preference,
                || self.local.classify_intent(text),
                || async {
                    match self.server(ChatTask::Classify { text: text.to_string() }).await? {
                        ChatTaskResponse::Classify(prediction) => Ok::<_, ClientError>(prediction),
                        _ => Err(ClientError::UnexpectedResponse("classify")),
                    }
                },
            )
            .await
    }

    pub async fn generate_text(&self, prompt: &str) -> Result<HybridOutcome<String>, ClientError> {
        self.executor
            .run(
                self.preference,
                || self.local.generate_text(prompt),
                || async {
                    let task = ChatTask::Chat {
                        messages: vec![ChatMessage::user(prompt)],
                        model: None,
                        max_tokens: None,
                        temperature: None,
                    };
                    match self.server(task).await? {
                        ChatTaskResponse::Chat { content, .. } => Ok::<_, ClientError>(content),
                        _ => Err(ClientError::UnexpectedResponse("chat")),
                    }
                },
            )
            .await
    }

    async fn server(&self, task: ChatTask) -> Result<ChatTaskResponse, ClientError> {
        self.functions.ai_chat(&task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::local::EMBEDDING_DIM;
    use crate::inference::LocalModel;
    use crate::system::accelerator::AcceleratorInfo;

    fn hybrid() -> HybridAi {
        let local = Arc::new(LocalModel::with_accelerator(AcceleratorInfo::unavailable()));
        // No token: any server call fails without touching the network
        let functions = Arc::new(FunctionsClient::new("http://127.0.0.1:9"));
        HybridAi::new(local, functions)
    }

    #[tokio::test]
    async fn test_local_embedding_does_not_touch_server() {
        let ai = hybrid();
        let outcome = ai.embed(&["hello world".to_string()]).await.unwrap();
        assert!(!outcome.used_server);
        assert_eq!(outcome.value[0].len(), EMBEDDING_DIM);
        assert!(!ai.notice().is_set());
    }

    #[tokio::test]
    async fn test_generation_without_accelerator_falls_back() {
        let ai = hybrid();
        let err = ai.generate_text("write a haiku").await.unwrap_err();
        // The server's error surfaces, not the local one
        assert!(matches!(err, ClientError::NotSignedIn));
        assert!(ai.notice().is_set());
    }

    #[tokio::test]
    async fn test_server_preference_skips_local() {
        let mut ai = hybrid();
        ai.set_preference(ExecutionPath::Server);
        let err = ai.classify_intent("draw a cat").await.unwrap_err();
        assert!(matches!(err, ClientError::NotSignedIn));
        assert!(!ai.notice().is_set());
    }
}
