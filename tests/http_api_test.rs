//! End-to-end tests for the HTTP API on an ephemeral port.

mod common;

use common::seeded_provider;
use db_chat_dashboard::auth::ApiAuth;
use db_chat_dashboard::db::{DatabaseSessionProvider, DbHandle};
use db_chat_dashboard::error::DbResult;
use db_chat_dashboard::oracle::{Oracle, OracleAnswer, OracleFactory, TraceEvent, TraceSink};
use db_chat_dashboard::{AppState, ChatService, SessionStore, router};
use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;

struct EchoOracle;

impl Oracle for EchoOracle {
    fn answer<'a>(
        &'a self,
        question: &'a str,
        _db: &'a DbHandle,
        sink: &'a TraceSink,
    ) -> BoxFuture<'a, DbResult<OracleAnswer>> {
        Box::pin(async move {
            let step = TraceEvent::Thought {
                text: "echoing".into(),
            };
            sink.emit(step.clone());
            Ok(OracleAnswer {
                steps: vec![step],
                answer: format!("You asked: {}", question),
            })
        })
    }
}

struct EchoFactory;

impl OracleFactory for EchoFactory {
    fn build(&self, _api_key: &str) -> DbResult<Box<dyn Oracle>> {
        Ok(Box::new(EchoOracle))
    }
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    provider: Arc<DatabaseSessionProvider>,
    _dir: TempDir,
}

impl TestServer {
    async fn start(tokens: &[&str]) -> Self {
        let (dir, provider) = seeded_provider().await;
        let chat = ChatService::new(provider.clone(), Arc::new(EchoFactory), None);
        let state = AppState::new(chat, SessionStore::new());
        let tokens: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        let app = router(state, ApiAuth::from_tokens(&tokens).unwrap());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
            provider,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn create_session(&self, body: Value) -> Value {
        let resp = self
            .client
            .post(self.url("/api/sessions"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        resp.json().await.unwrap()
    }
}

#[tokio::test]
async fn test_health_and_auth() {
    let server = TestServer::start(&["s3cret"]).await;

    let resp = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let resp = server.client.get(server.url("/api/tables")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthorized");

    let resp = server
        .client
        .get(server.url("/api/tables"))
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    server.provider.close_all().await;
}

#[tokio::test]
async fn test_session_lifecycle() {
    let server = TestServer::start(&[]).await;

    let summary = server.create_session(json!({"role": "read_only"})).await;
    assert_eq!(summary["role"], "read_only");
    assert_eq!(summary["message_count"], 1);
    assert_eq!(summary["has_api_key"], false);
    let id = summary["id"].as_str().unwrap().to_string();

    let resp = server
        .client
        .get(server.url(&format!("/api/sessions/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = server
        .client
        .delete(server.url(&format!("/api/sessions/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = server
        .client
        .get(server.url(&format!("/api/sessions/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    server.provider.close_all().await;
}

#[tokio::test]
async fn test_incomplete_remote_selection_reported() {
    let server = TestServer::start(&[]).await;
    let summary = server.create_session(json!({})).await;
    let id = summary["id"].as_str().unwrap();

    let resp = server
        .client
        .put(server.url(&format!("/api/sessions/{}/connection", id)))
        .json(&json!({"kind": "remote", "host": "db.internal"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "configuration");

    let summary: Value = server
        .client
        .get(server.url(&format!("/api/sessions/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(summary["connection_error"].as_str().unwrap().contains("missing"));
    server.provider.close_all().await;
}

#[tokio::test]
async fn test_chat_turn_streams_events() {
    let server = TestServer::start(&[]).await;
    let summary = server
        .create_session(json!({"role": "read_only", "api_key": "gsk-test"}))
        .await;
    let id = summary["id"].as_str().unwrap();
    let messages_url = server.url(&format!("/api/sessions/{}/messages", id));

    let resp = server
        .client
        .post(&messages_url)
        .json(&json!({"text": "How many students?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    let thought = body.find("event: thought").unwrap();
    let answer = body.find("event: answer").unwrap();
    assert!(thought < answer);
    assert_eq!(body.matches("event: ").count(), 2);
    assert!(body.contains("You asked: How many students?"));

    let transcript: Vec<Value> = server
        .client
        .get(&messages_url)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1]["role"], "user");

    let cleared: Vec<Value> = server
        .client
        .delete(&messages_url)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared.len(), 1);
    server.provider.close_all().await;
}

#[tokio::test]
async fn test_chat_without_key_streams_error() {
    let server = TestServer::start(&[]).await;
    let summary = server.create_session(json!({})).await;
    let id = summary["id"].as_str().unwrap();

    let body = server
        .client
        .post(server.url(&format!("/api/sessions/{}/messages", id)))
        .json(&json!({"text": "hello"}))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("event: error"));
    assert!(body.contains("Groq API key"));
    server.provider.close_all().await;
}

#[tokio::test]
async fn test_upload_then_explore() {
    let server = TestServer::start(&[]).await;
    let admin = server.create_session(json!({"role": "admin"})).await;
    let reader = server.create_session(json!({"role": "read_only"})).await;
    let upload = json!({
        "file_name": "roster.csv",
        "csv": "name,score\nAda,90\nGrace,70\nLinus,80\n",
        "table_name": "roster",
        "confirm": true
    });

    let outcome: Value = server
        .client
        .post(server.url(&format!("/api/sessions/{}/uploads", reader["id"].as_str().unwrap())))
        .json(&upload)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["status"], "skipped");
    assert_eq!(outcome["reason"], "not_admin");

    let outcome: Value = server
        .client
        .post(server.url(&format!("/api/sessions/{}/uploads", admin["id"].as_str().unwrap())))
        .json(&upload)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["status"], "created");
    assert_eq!(outcome["rows"], 3);

    let view: Value = server
        .client
        .get(server.url("/api/tables/roster?column=score"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["table"], "roster");
    assert_eq!(view["chart"]["column"], "score");
    assert_eq!(view["summary"]["kind"], "numeric");

    let resp = server
        .client
        .get(server.url("/api/tables/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    server.provider.close_all().await;
}
