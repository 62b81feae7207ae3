//! Gemini adapters against a local mock of the REST API.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use axum::{Json, Router, extract::State, routing::post};
use biochat_gemini::{Gemini, GeminiBuilder, Model};
use biochat_rag::gemini::{GeminiCompletionModel, GeminiEmbeddingProvider, MAX_BATCH_SIZE};
use biochat_rag::{CompletionModel, EmbeddingProvider, RagError};
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct MockState {
    batch_sizes: Arc<Mutex<Vec<usize>>>,
    drop_one: bool,
    blocked: bool,
    last_prompt: Arc<Mutex<Option<Value>>>,
    calls: Arc<AtomicUsize>,
}

async fn batch_embed(State(state): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    let requests = body["requests"].as_array().cloned().unwrap_or_default();
    state.batch_sizes.lock().unwrap().push(requests.len());
    let mut embeddings: Vec<Value> = requests
        .iter()
        .map(|r| {
            assert_eq!(r["taskType"], "RETRIEVAL_DOCUMENT");
            json!({"values": [1.0, 0.0, 0.0]})
        })
        .collect();
    if state.drop_one {
        embeddings.pop();
    }
    Json(json!({ "embeddings": embeddings }))
}

async fn embed(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["taskType"], "RETRIEVAL_QUERY");
    Json(json!({"embedding": {"values": [0.0, 1.0, 0.0]}}))
}

async fn generate(State(state): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    state.calls.fetch_add(1, Ordering::SeqCst);
    *state.last_prompt.lock().unwrap() = Some(body);
    if state.blocked {
        return Json(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
    }
    Json(json!({
        "candidates": [{"content": {"parts": [{"text": "ATP is the energy currency."}], "role": "model"}}]
    }))
}

async fn spawn_mock(state: MockState) -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/v1beta/models/embedding-001:batchEmbedContents", post(batch_embed))
        .route("/v1beta/models/embedding-001:embedContent", post(embed))
        .route("/v1beta/models/gemini-1.5-flash:generateContent", post(generate))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server run");
    });
    (format!("http://{addr}/v1beta/"), handle)
}

fn client(base: &str, model: Model) -> Gemini {
    GeminiBuilder::new("test-key")
        .with_model(model)
        .with_base_url(base.parse().expect("base url"))
        .with_retry_base_delay(Duration::from_millis(5))
        .build()
        .expect("client")
}

#[tokio::test]
async fn large_batches_are_split() {
    let state = MockState::default();
    let (base, handle) = spawn_mock(state.clone()).await;
    let provider = GeminiEmbeddingProvider::from_client(client(&base, Model::Embedding001)).with_dimensions(3);
    assert_eq!(provider.name(), "models/embedding-001");

    let texts: Vec<String> = (0..250).map(|i| format!("segment {i}")).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let vectors = provider.embed_batch(&refs).await.unwrap();

    assert_eq!(vectors.len(), 250);
    assert_eq!(*state.batch_sizes.lock().unwrap(), vec![MAX_BATCH_SIZE, MAX_BATCH_SIZE, 50]);
    assert_eq!(provider.embed("query").await.unwrap(), vec![0.0, 1.0, 0.0]);

    handle.abort();
}

#[tokio::test]
async fn short_batch_response_is_an_embedding_error() {
    let state = MockState { drop_one: true, ..Default::default() };
    let (base, handle) = spawn_mock(state).await;
    let provider = GeminiEmbeddingProvider::from_client(client(&base, Model::Embedding001));

    let err = provider.embed_batch(&["a", "b"]).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }));

    handle.abort();
}

#[tokio::test]
async fn completion_sends_prompt_with_temperature() {
    let state = MockState::default();
    let (base, handle) = spawn_mock(state.clone()).await;
    let model = GeminiCompletionModel::from_client(client(&base, Model::Gemini15Flash)).with_temperature(0.3);

    let text = model.complete("Question: What is ATP?\nHelpful Answer:").await.unwrap();
    assert_eq!(text, "ATP is the energy currency.");

    let body = state.last_prompt.lock().unwrap().clone().unwrap();
    assert_eq!(body["contents"][0]["parts"][0]["text"], "Question: What is ATP?\nHelpful Answer:");
    assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);

    handle.abort();
}

#[tokio::test]
async fn blocked_prompt_is_a_completion_error() {
    let state = MockState { blocked: true, ..Default::default() };
    let (base, handle) = spawn_mock(state.clone()).await;
    let model = GeminiCompletionModel::from_client(client(&base, Model::Gemini15Flash));

    let err = model.complete("anything").await.unwrap_err();
    assert!(matches!(&err, RagError::CompletionError { message, .. } if message.contains("SAFETY")));
    assert!(err.is_remote());
    assert_eq!(state.calls.load(Ordering::SeqCst), 1);

    handle.abort();
}
