//! Integration tests for chat turns and per-session connection handling.
//!
//! The oracle is replaced by a stub so the tests never reach the network.

mod common;

use common::seeded_provider;
use db_chat_dashboard::chat::{ChatService, MISSING_API_KEY};
use db_chat_dashboard::db::DbHandle;
use db_chat_dashboard::error::{DashboardError, DbResult};
use db_chat_dashboard::models::{
    ConnectionSelection, ConnectionTarget, GREETING, MessageRole, QueryOptions, Role, TargetKind,
};
use db_chat_dashboard::oracle::{Oracle, OracleAnswer, OracleFactory, TraceEvent, TraceSink};
use db_chat_dashboard::session::SessionContext;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_test::{assert_err, assert_ok};

/// Counts students when asked; fails when the question says "fail".
struct StubOracle;

impl Oracle for StubOracle {
    fn answer<'a>(
        &'a self,
        question: &'a str,
        db: &'a DbHandle,
        sink: &'a TraceSink,
    ) -> BoxFuture<'a, DbResult<OracleAnswer>> {
        Box::pin(async move {
            if question.contains("fail") {
                return Err(DashboardError::oracle("model refused"));
            }
            let step = TraceEvent::ToolCall {
                tool: "run_query".into(),
                input: serde_json::json!({"sql": "SELECT COUNT(*) FROM STUDENT"}),
            };
            sink.emit(step.clone());
            let result = db
                .run_read_query("SELECT COUNT(*) FROM STUDENT", &QueryOptions::default())
                .await?;
            Ok(OracleAnswer {
                steps: vec![step],
                answer: format!("There are {} students.", result.rows[0][0]),
            })
        })
    }
}

#[derive(Default)]
struct StubFactory {
    builds: AtomicUsize,
    last_key: std::sync::Mutex<Option<String>>,
}

impl OracleFactory for StubFactory {
    fn build(&self, api_key: &str) -> DbResult<Box<dyn Oracle>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        *self.last_key.lock().unwrap() = Some(api_key.to_string());
        Ok(Box::new(StubOracle))
    }
}

fn service(
    provider: Arc<db_chat_dashboard::db::DatabaseSessionProvider>,
    default_key: Option<&str>,
) -> (ChatService, Arc<StubFactory>) {
    let factory = Arc::new(StubFactory::default());
    let chat = ChatService::new(provider, factory.clone(), default_key.map(String::from));
    (chat, factory)
}

#[tokio::test]
async fn test_turn_appends_question_and_answer() {
    let (_dir, provider) = seeded_provider().await;
    let (chat, factory) = service(provider.clone(), None);
    let mut session = SessionContext::new(
        Role::ReadOnly,
        provider.embedded_target(),
        Some("gsk-session".into()),
    );

    let (sink, mut rx) = TraceSink::channel();
    let reply = assert_ok!(chat.ask(&mut session, "How many students?", &sink).await);
    let reply = reply.unwrap();
    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.content, "There are 5 students.");

    let messages = session.transcript.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, GREETING);
    assert_eq!(messages[1].role, MessageRole::User);
    assert_eq!(messages[1].content, "How many students?");

    drop(sink);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name(), "tool_call");
    assert_eq!(events[1].name(), "answer");

    assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    assert_eq!(factory.last_key.lock().unwrap().as_deref(), Some("gsk-session"));
    provider.close_all().await;
}

#[tokio::test]
async fn test_blank_message_is_ignored() {
    let (_dir, provider) = seeded_provider().await;
    let (chat, factory) = service(provider.clone(), Some("server-key"));
    let mut session = SessionContext::new(Role::ReadOnly, provider.embedded_target(), None);

    let reply = assert_ok!(chat.ask(&mut session, "   ", &TraceSink::discard()).await);
    assert!(reply.is_none());
    assert_eq!(session.transcript.len(), 1);
    assert_eq!(factory.builds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_api_key_leaves_transcript_untouched() {
    let (_dir, provider) = seeded_provider().await;
    let (chat, factory) = service(provider.clone(), None);
    let mut session = SessionContext::new(Role::Admin, provider.embedded_target(), None);

    let err = assert_err!(chat.ask(&mut session, "How many students?", &TraceSink::discard()).await);
    assert!(matches!(err, DashboardError::Configuration { .. }));
    assert!(err.to_string().contains(MISSING_API_KEY));
    assert_eq!(session.transcript.len(), 1);
    assert_eq!(factory.builds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_server_key_used_when_session_has_none() {
    let (_dir, provider) = seeded_provider().await;
    let (chat, factory) = service(provider.clone(), Some("server-key"));
    let mut session = SessionContext::new(Role::ReadOnly, provider.embedded_target(), None);

    assert_ok!(chat.ask(&mut session, "How many students?", &TraceSink::discard()).await);
    assert_eq!(factory.last_key.lock().unwrap().as_deref(), Some("server-key"));
    provider.close_all().await;
}

#[tokio::test]
async fn test_oracle_failure_becomes_reply() {
    let (_dir, provider) = seeded_provider().await;
    let (chat, _factory) = service(provider.clone(), Some("server-key"));
    let mut session = SessionContext::new(Role::ReadOnly, provider.embedded_target(), None);

    let (sink, mut rx) = TraceSink::channel();
    let reply = assert_ok!(chat.ask(&mut session, "please fail", &sink).await).unwrap();
    assert!(reply.content.starts_with("Error: "));
    assert!(reply.content.contains("model refused"));
    assert_eq!(session.transcript.len(), 3);

    drop(sink);
    let event = rx.recv().await.unwrap();
    assert_eq!(event.name(), "error");
    assert!(rx.recv().await.is_none());
    provider.close_all().await;
}

#[tokio::test]
async fn test_unreachable_database_keeps_question() {
    let (dir, provider) = seeded_provider().await;
    let (chat, factory) = service(provider.clone(), Some("server-key"));
    let missing = ConnectionTarget::Embedded(dir.path().join("missing.db"));
    let mut session = SessionContext::new(Role::ReadOnly, missing, None);

    let (sink, mut rx) = TraceSink::channel();
    let reply = assert_ok!(chat.ask(&mut session, "How many students?", &sink).await).unwrap();
    assert_eq!(reply.role, MessageRole::Assistant);
    assert!(reply.content.starts_with("Error: "));
    assert!(reply.content.contains("missing.db"));

    let messages = session.transcript.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, MessageRole::User);
    assert_eq!(messages[1].content, "How many students?");
    assert_eq!(factory.builds.load(Ordering::SeqCst), 0);

    drop(sink);
    assert_eq!(rx.recv().await.unwrap().name(), "error");
    assert!(rx.recv().await.is_none());
    provider.close_all().await;
}

#[tokio::test]
async fn test_clear_restores_greeting() {
    let (_dir, provider) = seeded_provider().await;
    let (chat, _factory) = service(provider.clone(), Some("server-key"));
    let mut session = SessionContext::new(Role::ReadOnly, provider.embedded_target(), None);

    chat.ask(&mut session, "How many students?", &TraceSink::discard())
        .await
        .unwrap();
    assert_eq!(session.transcript.len(), 3);

    chat.clear(&mut session);
    assert_eq!(session.transcript.len(), 1);
    assert_eq!(session.transcript.messages()[0].content, GREETING);
    provider.close_all().await;
}

#[tokio::test]
async fn test_missing_remote_credentials_fail_without_connecting() {
    let (_dir, provider) = seeded_provider().await;
    let (chat, factory) = service(provider.clone(), Some("server-key"));
    let mut session = SessionContext::new(Role::ReadOnly, provider.embedded_target(), None);

    let selection = ConnectionSelection {
        kind: Some(TargetKind::Remote),
        host: Some("db.internal".into()),
        user: Some("root".into()),
        ..Default::default()
    };
    let err = assert_err!(chat.configure_connection(&mut session, selection).await);
    assert!(matches!(err, DashboardError::Configuration { .. }));
    assert!(err.to_string().contains("password"));
    assert!(err.to_string().contains("database"));
    assert_eq!(provider.cached_count().await, 0);

    // Every later turn reports the same problem and leaves the transcript alone
    for _ in 0..2 {
        let again = assert_err!(
            chat.ask(&mut session, "How many students?", &TraceSink::discard())
                .await
        );
        assert_eq!(again.to_string(), err.to_string());
    }
    assert_eq!(session.transcript.len(), 1);
    assert_eq!(factory.builds.load(Ordering::SeqCst), 0);
    assert!(session.summary().connection_error.is_some());

    // A valid selection recovers the session
    let info = assert_ok!(
        chat.configure_connection(&mut session, ConnectionSelection::embedded())
            .await
    );
    assert_eq!(info.kind, TargetKind::Embedded);
    assert_ok!(chat.ask(&mut session, "How many students?", &TraceSink::discard()).await);
    provider.close_all().await;
}
