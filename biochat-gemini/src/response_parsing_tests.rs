//! Parsing tests against real-world Gemini JSON payloads.

use crate::{
    BatchContentEmbeddingResponse, Content, ContentEmbeddingResponse, EmbedContentRequest,
    FinishReason, GenerateContentRequest, GenerationConfig, GenerationResponse, Role, TaskType,
};
use serde_json::json;

// ── Generation ──────────────────────────────────────────────────────

#[test]
fn parse_simple_text_response() {
    let json = json!({
        "candidates": [{
            "content": {
                "parts": [{"text": "Photosynthesis converts light "}, {"text": "into chemical energy."}],
                "role": "model"
            },
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": {
            "promptTokenCount": 120,
            "candidatesTokenCount": 9,
            "totalTokenCount": 129
        },
        "modelVersion": "gemini-1.5-flash"
    });

    let resp: GenerationResponse = serde_json::from_value(json).unwrap();
    assert_eq!(resp.text(), "Photosynthesis converts light into chemical energy.");
    assert_eq!(resp.candidates[0].finish_reason, Some(FinishReason::Stop));
    assert_eq!(resp.model_version.as_deref(), Some("gemini-1.5-flash"));
    let usage = resp.usage_metadata.as_ref().unwrap();
    assert_eq!(usage.total_token_count, Some(129));
}

#[test]
fn parse_blocked_prompt_has_no_text() {
    let json = json!({
        "promptFeedback": {"blockReason": "SAFETY"}
    });

    let resp: GenerationResponse = serde_json::from_value(json).unwrap();
    assert!(resp.candidates.is_empty());
    assert_eq!(resp.text(), "");
    assert_eq!(resp.block_reason(), Some("SAFETY"));
}

#[test]
fn parse_unknown_finish_reason_and_non_text_parts() {
    let json = json!({
        "candidates": [{
            "content": {
                "parts": [{"inlineData": {"mimeType": "image/png", "data": "AAAA"}}, {"text": "ok"}],
                "role": "model"
            },
            "finishReason": "SOMETHING_NEW"
        }]
    });

    let resp: GenerationResponse = serde_json::from_value(json).unwrap();
    assert_eq!(resp.text(), "ok");
    assert_eq!(resp.candidates[0].finish_reason, Some(FinishReason::FinishReasonUnspecified));
}

#[test]
fn generate_request_serializes_camel_case() {
    let request = GenerateContentRequest {
        contents: vec![Content::text("hi").with_role(Role::User)],
        generation_config: Some(GenerationConfig { temperature: Some(0.3) }),
    };

    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["contents"][0]["role"], "user");
    assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
    assert_eq!(value["generationConfig"]["temperature"], json!(0.3f32));
    assert!(value.get("systemInstruction").is_none());
}

// ── Embeddings ──────────────────────────────────────────────────────

#[test]
fn parse_single_embedding() {
    let json = json!({"embedding": {"values": [0.1, -0.2, 0.3]}});
    let resp: ContentEmbeddingResponse = serde_json::from_value(json).unwrap();
    assert_eq!(resp.embedding.values, vec![0.1, -0.2, 0.3]);
}

#[test]
fn parse_batch_embeddings() {
    let json = json!({"embeddings": [{"values": [1.0, 0.0]}, {"values": [0.0, 1.0]}]});
    let resp: BatchContentEmbeddingResponse = serde_json::from_value(json).unwrap();
    assert_eq!(resp.embeddings.len(), 2);
    assert_eq!(resp.embeddings[1].values, vec![0.0, 1.0]);
}

#[test]
fn embed_request_serializes_task_type() {
    let request = EmbedContentRequest {
        model: "models/embedding-001".into(),
        content: Content::text("segment"),
        task_type: Some(TaskType::RetrievalDocument),
    };

    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["taskType"], "RETRIEVAL_DOCUMENT");
    assert_eq!(value["model"], "models/embedding-001");
    assert!(value["content"].get("role").is_none());
}
