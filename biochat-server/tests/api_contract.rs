use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use biochat_rag::fixtures::{BIOLOGY_PAGES, HashEmbedder, pdf_bytes, write_pdf};
use biochat_rag::{CompletionModel, RagError, RagPipeline};
use biochat_server::{app_router, serve, server::AppState};
use reqwest::{StatusCode, multipart};
use serde_json::{Value, json};
use tokio::sync::oneshot;

struct CannedModel {
    fail: bool,
}

#[async_trait]
impl CompletionModel for CannedModel {
    async fn complete(&self, prompt: &str) -> biochat_rag::Result<String> {
        if self.fail {
            return Err(RagError::CompletionError {
                provider: "canned".into(),
                message: "503 Service Unavailable".into(),
            });
        }
        assert!(prompt.ends_with("Helpful Answer:"));
        Ok("Photosynthesis turns light into chemical energy.".to_string())
    }

    fn name(&self) -> &str {
        "test/canned"
    }
}

fn test_pipeline(root: &Path, fail: bool) -> RagPipeline {
    RagPipeline::builder()
        .embedding_provider(Arc::new(HashEmbedder::default()))
        .completion_model(Arc::new(CannedModel { fail }))
        .local_folder(root.join("docs"))
        .index_root(root)
        .build()
        .expect("pipeline")
}

async fn spawn_server(root: &Path, fail: bool) -> (String, tokio::task::JoinHandle<()>) {
    let app = app_router(AppState::new(test_pipeline(root, fail)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle)
}

async fn create_session(client: &reqwest::Client, base: &str) -> String {
    let created: Value = client
        .post(format!("{base}/api/session"))
        .send()
        .await
        .expect("session create response")
        .json()
        .await
        .expect("session json");
    created.get("session_id").and_then(Value::as_str).expect("session_id field").to_string()
}

fn biology_upload() -> multipart::Form {
    let pdf = pdf_bytes(&BIOLOGY_PAGES);
    multipart::Form::new().part("files", multipart::Part::bytes(pdf).file_name("biology.pdf"))
}

#[tokio::test]
async fn health_and_index_page_are_served() {
    let root = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(root.path(), false).await;
    let client = reqwest::Client::new();

    let health: Value = client.get(format!("{base}/health")).send().await.unwrap().json().await.unwrap();
    assert_eq!(health, json!({"status":"ok","service":"biochat"}));

    let page = client.get(format!("{base}/")).send().await.unwrap();
    assert!(page.status().is_success());
    assert!(page.text().await.unwrap().contains("BioChat"));

    handle.abort();
}

#[tokio::test]
async fn upload_then_ask_records_history() {
    let root = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(root.path(), false).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;
    let session = format!("{base}/api/session/{session_id}");

    let loaded = client.post(format!("{session}/upload")).multipart(biology_upload()).send().await.unwrap();
    assert_eq!(loaded.status(), StatusCode::OK);
    let loaded: Value = loaded.json().await.unwrap();
    assert_eq!(loaded["loaded"], json!(true));
    assert_eq!(loaded["notices"][0]["message"], json!("1 file(s) uploaded"));
    assert_eq!(loaded["stats"]["document_count"], json!(5));
    assert_eq!(loaded["stats"]["files"], json!(["biology.pdf"]));

    let answer: Value = client
        .post(format!("{session}/ask"))
        .json(&json!({"question": "What is photosynthesis?"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(answer["answered"], json!(true));
    assert_eq!(answer["entry"]["question"], json!("What is photosynthesis?"));
    assert!(!answer["entry"]["answer"].as_str().unwrap().is_empty());

    let history: Value = client.get(format!("{session}/history")).send().await.unwrap().json().await.unwrap();
    assert_eq!(history["entries"].as_array().unwrap().len(), 1);

    let cleared: Value = client.delete(format!("{session}/history")).send().await.unwrap().json().await.unwrap();
    assert_eq!(cleared["entries"], json!([]));
    let history: Value = client.get(format!("{session}/history")).send().await.unwrap().json().await.unwrap();
    assert_eq!(history["entries"], json!([]));

    let stats: Value = client.get(format!("{session}/stats")).send().await.unwrap().json().await.unwrap();
    assert_eq!(stats["stats"]["capacity_percent"], json!(50));
    assert_eq!(stats["stats"]["index_origin"], json!("built"));

    handle.abort();
}

#[tokio::test]
async fn empty_question_is_a_no_op() {
    let root = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(root.path(), false).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;

    let response = client
        .post(format!("{base}/api/session/{session_id}/ask"))
        .json(&json!({"question": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"answered": false, "entry": null}));

    handle.abort();
}

#[tokio::test]
async fn missing_local_folder_is_unprocessable() {
    let root = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(root.path(), false).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;
    let session = format!("{base}/api/session/{session_id}");

    let response = client
        .post(format!("{session}/source"))
        .json(&json!({"use_local_folder": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("does not exist"));
    assert_eq!(body["notices"][0]["level"], json!("error"));

    let ask = client.post(format!("{session}/ask")).json(&json!({"question": "Anything?"})).send().await.unwrap();
    assert_eq!(ask.status(), StatusCode::CONFLICT);

    let history: Value = client.get(format!("{session}/history")).send().await.unwrap().json().await.unwrap();
    assert_eq!(history["entries"], json!([]));

    let cleared = client
        .post(format!("{session}/source"))
        .json(&json!({"use_local_folder": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(cleared.status(), StatusCode::OK);
    let cleared: Value = cleared.json().await.unwrap();
    assert_eq!(cleared["loaded"], json!(false));

    handle.abort();
}

#[tokio::test]
async fn completion_failure_is_bad_gateway_and_not_recorded() {
    let root = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(root.path(), true).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;
    let session = format!("{base}/api/session/{session_id}");

    let loaded = client.post(format!("{session}/upload")).multipart(biology_upload()).send().await.unwrap();
    assert_eq!(loaded.status(), StatusCode::OK);

    let response = client
        .post(format!("{session}/ask"))
        .json(&json!({"question": "What is photosynthesis?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let history: Value = client.get(format!("{session}/history")).send().await.unwrap().json().await.unwrap();
    assert_eq!(history["entries"], json!([]));

    handle.abort();
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(root.path(), false).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/api/session/nope/history")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let session_id = create_session(&client, &base).await;
    let ended = client.delete(format!("{base}/api/session/{session_id}")).send().await.unwrap();
    assert_eq!(ended.status(), StatusCode::NO_CONTENT);
    let response = client.get(format!("{base}/api/session/{session_id}/stats")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    handle.abort();
}

async fn post_source(client: &reqwest::Client, session: &str, use_local_folder: bool) -> Value {
    let response = client
        .post(format!("{session}/source"))
        .json(&json!({"use_local_folder": use_local_folder}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

#[tokio::test]
async fn uploads_keep_precedence_over_the_local_folder_toggle() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("docs")).unwrap();
    write_pdf(&root.path().join("docs").join("local.pdf"), &["Ribosomes translate messenger RNA."]);
    let (base, handle) = spawn_server(root.path(), false).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;
    let session = format!("{base}/api/session/{session_id}");

    let loaded: Value =
        client.post(format!("{session}/upload")).multipart(biology_upload()).send().await.unwrap().json().await.unwrap();
    assert_eq!(loaded["stats"]["mode"], json!("uploaded"));

    let enabled = post_source(&client, &session, true).await;
    assert_eq!(enabled["loaded"], json!(true));
    assert_eq!(enabled["stats"]["mode"], json!("uploaded"));
    assert_eq!(enabled["stats"]["files"], json!(["biology.pdf"]));
    assert_eq!(enabled["notices"][0]["level"], json!("warning"));

    let disabled = post_source(&client, &session, false).await;
    assert_eq!(disabled["loaded"], json!(true));
    assert_eq!(disabled["stats"]["mode"], json!("uploaded"));

    let ask = client
        .post(format!("{session}/ask"))
        .json(&json!({"question": "What is photosynthesis?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(ask.status(), StatusCode::OK);

    // Removing the uploads lets the recorded folder choice apply.
    post_source(&client, &session, true).await;
    let cleared: Value = client.delete(format!("{session}/upload")).send().await.unwrap().json().await.unwrap();
    assert_eq!(cleared["loaded"], json!(true));
    assert_eq!(cleared["stats"]["mode"], json!("local_folder"));
    assert_eq!(cleared["stats"]["files"], json!(["local.pdf"]));

    let disabled = post_source(&client, &session, false).await;
    assert_eq!(disabled["loaded"], json!(false));
    assert_eq!(disabled["stats"], Value::Null);
    let ask = client.post(format!("{session}/ask")).json(&json!({"question": "Anything?"})).send().await.unwrap();
    assert_eq!(ask.status(), StatusCode::CONFLICT);

    handle.abort();
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(root.path(), false).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;

    let response = client
        .post(format!("{base}/api/session/{session_id}/upload"))
        .multipart(multipart::Form::new().text("note", "no file here"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    handle.abort();
}

#[tokio::test]
async fn shutdown_ends_sessions_and_removes_upload_directories() {
    let root = tempfile::tempdir().unwrap();
    let state = AppState::new(test_pipeline(root.path(), false));
    let sessions = state.sessions.clone();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let base = format!("http://{}", listener.local_addr().expect("listener addr"));

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, state, async move {
        stopped.await.ok();
    }));

    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;
    let loaded = client
        .post(format!("{base}/api/session/{session_id}/upload"))
        .multipart(biology_upload())
        .send()
        .await
        .unwrap();
    assert_eq!(loaded.status(), StatusCode::OK);

    let upload_dir = sessions
        .get(&session_id)
        .await
        .expect("session exists")
        .lock()
        .await
        .workspace()
        .expect("workspace loaded")
        .root()
        .to_path_buf();
    assert!(upload_dir.is_dir());

    drop(client);
    stop.send(()).unwrap();
    server.await.unwrap().unwrap();

    assert!(!upload_dir.exists());
    assert!(sessions.get(&session_id).await.is_none());
}
