//! End-to-end tests for the edge functions router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use aihub::backend::{Database, MemoryBackend, UsageRecord, UserIdentity};
use aihub::functions::{build_router, FunctionContext, FunctionSettings};
use aihub::providers::{
    ChatCompletion, ChatProvider, ChatRequest, GeneratedImage, ImagePrompt, ImageProvider,
    ProviderError, SpeechAudio, SpeechProvider, TrendItem, TrendsProvider,
};

const TOKEN: &str = "test-token";

/// Chat fake: fails any call whose system prompt contains `fail_on`
#[derive(Default)]
struct FakeChat {
    fail_on: Option<&'static str>,
    /// Embedding width to answer with instead of the requested one
    embed_width: Option<usize>,
    calls: AtomicUsize,
}

#[async_trait]
impl ChatProvider for FakeChat {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first = &request.messages[0].content;
        if self.fail_on.is_some_and(|f| first.contains(f)) {
            return Err(ProviderError::Upstream {
                provider: "gateway",
                status: 500,
                message: "agent crashed".into(),
            });
        }
        Ok(ChatCompletion {
            model: "fake-model".into(),
            content: "fake reply".into(),
            usage: None,
        })
    }

    async fn embed(&self, texts: &[String], dimensions: usize) -> Result<Vec<Vec<f32>>, ProviderError> {
        let width = self.embed_width.unwrap_or(dimensions);
        Ok(texts.iter().map(|_| vec![0.0; width]).collect())
    }

    async fn generate_image(
        &self,
        _prompt: &str,
        _source_image: Option<&str>,
    ) -> Result<Vec<GeneratedImage>, ProviderError> {
        Ok(vec![GeneratedImage {
            url: "data:image/png;base64,AAAA".into(),
        }])
    }
}

#[derive(Default)]
struct FakeImages {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageProvider for FakeImages {
    async fn generate(&self, prompt: &ImagePrompt) -> Result<Vec<GeneratedImage>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..prompt.count)
            .map(|i| GeneratedImage {
                url: format!("https://img.example.com/{}.png", i),
            })
            .collect())
    }
}

struct FakeSpeech;

#[async_trait]
impl SpeechProvider for FakeSpeech {
    async fn synthesize(&self, _text: &str, _voice: Option<&str>) -> Result<SpeechAudio, ProviderError> {
        Ok(SpeechAudio {
            audio_base64: "SUQz".into(),
            mime_type: "audio/mpeg".into(),
        })
    }
}

struct FakeTrends;

#[async_trait]
impl TrendsProvider for FakeTrends {
    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<TrendItem>, ProviderError> {
        Ok(vec![TrendItem {
            title: format!("#{}", query),
            url: None,
            platform: Some("tiktok".into()),
            volume: Some(1200),
        }])
    }

    async fn trending(&self, _region: &str, _limit: usize) -> Result<Vec<TrendItem>, ProviderError> {
        Err(ProviderError::RateLimited { provider: "trends" })
    }
}

struct Harness {
    app: Router,
    backend: Arc<MemoryBackend>,
    user: UserIdentity,
    chat: Arc<FakeChat>,
    images: Arc<FakeImages>,
}

fn harness_with(chat: FakeChat, credits: i64) -> Harness {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_user(TOKEN, "user@example.com", credits);
    let chat = Arc::new(chat);
    let images = Arc::new(FakeImages::default());

    let ctx = FunctionContext {
        auth: backend.clone(),
        db: backend.clone(),
        chat: chat.clone(),
        images: images.clone(),
        speech: Arc::new(FakeSpeech),
        trends: Arc::new(FakeTrends),
        settings: FunctionSettings {
            image_credit_cost: 2,
            orchestrator_max_agents: 5,
        },
    };

    Harness {
        app: build_router(ctx, &["*".to_string()]),
        backend,
        user,
        chat,
        images,
    }
}

fn harness() -> Harness {
    harness_with(FakeChat::default(), 10)
}

async fn post(app: &Router, function: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .uri(format!("/functions/v1/{}", function))
        .method("POST")
        .header("content-type", "application/json");
    if let Some(token) = token {
        request = request.header("authorization", format!("Bearer {}", token));
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_image_generation_without_token_is_rejected_before_any_work() {
    let h = harness();

    let (status, body) = post(
        &h.app,
        "generate-image",
        None,
        json!({"action": "generate", "prompt": "a lighthouse"}),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
    assert_eq!(body["code"], "unauthorized");
    assert!(h.backend.usage_rows().is_empty());
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.backend.credits_remaining(h.user.id).await.unwrap(), 10);
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let h = harness();
    let (status, body) = post(
        &h.app,
        "ai-chat",
        Some("not-a-real-token"),
        json!({"task": "chat", "messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chat_records_one_usage_row() {
    let h = harness();
    let (status, body) = post(
        &h.app,
        "ai-chat",
        Some(TOKEN),
        json!({"task": "chat", "messages": [{"role": "user", "content": "hello"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"], "chat");
    assert_eq!(body["content"], "fake reply");

    let rows = h.backend.usage_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].function_name, "ai-chat");
    assert_eq!(rows[0].action, "chat");
    assert_eq!(rows[0].user_id, h.user.id);
}

#[tokio::test]
async fn test_unknown_task_is_bad_request() {
    let h = harness();
    let (status, body) = post(&h.app, "ai-chat", Some(TOKEN), json!({"task": "translate", "text": "hola"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
    assert!(h.backend.usage_rows().is_empty());
}

#[tokio::test]
async fn test_embed_returns_fixed_width_vectors() {
    let h = harness();
    let (status, body) = post(&h.app, "ai-chat", Some(TOKEN), json!({"task": "embed", "texts": ["a", "b"]})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dimensions"], 256);
    assert_eq!(body["embeddings"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_embed_with_wrong_width_is_upstream_error() {
    let h = harness_with(
        FakeChat {
            embed_width: Some(1536),
            ..Default::default()
        },
        10,
    );
    let (status, body) = post(&h.app, "ai-chat", Some(TOKEN), json!({"task": "embed", "texts": ["a"]})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "upstream");
    assert!(h.backend.usage_rows().is_empty());
}

#[tokio::test]
async fn test_image_generation_charges_after_success() {
    let h = harness();
    let (status, body) = post(
        &h.app,
        "generate-image",
        Some(TOKEN),
        json!({"action": "generate", "prompt": "a lighthouse", "count": 2}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["images"].as_array().unwrap().len(), 2);
    assert_eq!(body["credits_used"], 4);
    assert_eq!(body["credits_remaining"], 6);

    let rows = h.backend.usage_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].credits_used, 4);
}

#[tokio::test]
async fn test_gateway_engine_charges_for_delivered_images_only() {
    let h = harness();
    let (status, body) = post(
        &h.app,
        "generate-image",
        Some(TOKEN),
        json!({"action": "generate", "prompt": "fox", "count": 4, "engine": "gateway"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["images"].as_array().unwrap().len(), 1);
    assert_eq!(body["credits_used"], 2);
    assert_eq!(body["credits_remaining"], 8);
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.backend.credits_remaining(h.user.id).await.unwrap(), 8);
    assert_eq!(h.backend.usage_rows()[0].credits_used, 2);
}

#[tokio::test]
async fn test_insufficient_credits_is_payment_required() {
    let h = harness_with(FakeChat::default(), 1);
    let (status, body) = post(
        &h.app,
        "generate-image",
        Some(TOKEN),
        json!({"action": "generate", "prompt": "a lighthouse"}),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "insufficient_credits");
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 0);
    assert!(h.backend.usage_rows().is_empty());
}

#[tokio::test]
async fn test_orchestrator_reports_failed_agent_and_still_synthesises() {
    let h = harness_with(
        FakeChat {
            fail_on: Some("critic"),
            ..Default::default()
        },
        10,
    );

    let (status, body) = post(
        &h.app,
        "agent-orchestrator",
        Some(TOKEN),
        json!({"action": "run", "goal": "grow a newsletter"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contributions"].as_array().unwrap().len(), 2);
    assert_eq!(body["failed_agents"][0]["agent"], "critic");
    assert_eq!(body["synthesis"], "fake reply");
    // Three agents plus the synthesis call
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 4);
    assert_eq!(h.backend.usage_rows().len(), 1);
}

#[tokio::test]
async fn test_orchestrator_rejects_too_many_agents() {
    let h = harness();
    let agents: Vec<Value> = (0..6).map(|i| json!({"name": format!("agent{}", i)})).collect();
    let (status, _) = post(
        &h.app,
        "agent-orchestrator",
        Some(TOKEN),
        json!({"action": "run", "goal": "x", "agents": agents}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_provider_rate_limit_maps_to_429() {
    let h = harness();
    let (status, body) = post(&h.app, "social-trends", Some(TOKEN), json!({"action": "trending"})).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "rate_limited");
    assert!(h.backend.usage_rows().is_empty());
}

#[tokio::test]
async fn test_speech_and_credits_history() {
    let h = harness();
    let (status, body) = post(
        &h.app,
        "text-to-speech",
        Some(TOKEN),
        json!({"action": "synthesize", "text": "hello there"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mime_type"], "audio/mpeg");

    let (status, body) = post(&h.app, "credits", Some(TOKEN), json!({"action": "history"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"][0]["function_name"], "text-to-speech");

    let (_, body) = post(&h.app, "credits", Some(TOKEN), json!({"action": "balance"})).await;
    assert_eq!(body["credits"], 10);
    // Credit reads are not logged
    assert_eq!(h.backend.usage_rows().len(), 1);
}

#[tokio::test]
async fn test_credits_history_limit_default_and_cap() {
    let h = harness();
    for _ in 0..120 {
        h.backend
            .insert_usage(UsageRecord::new(h.user.id, "ai-chat", "chat"))
            .await
            .unwrap();
    }

    let (status, body) = post(&h.app, "credits", Some(TOKEN), json!({"action": "history", "limit": 500})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 100);

    let (_, body) = post(&h.app, "credits", Some(TOKEN), json!({"action": "history"})).await;
    assert_eq!(body["entries"].as_array().unwrap().len(), 20);

    let (_, body) = post(&h.app, "credits", Some(TOKEN), json!({"action": "history", "limit": 5})).await;
    assert_eq!(body["entries"].as_array().unwrap().len(), 5);

    // History reads are not logged
    assert_eq!(h.backend.usage_rows().len(), 120);
}
