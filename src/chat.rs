//! Natural-language query façade.
//!
//! One call to [`ChatService::ask`] is one turn: the user's text is appended
//! to the transcript, the oracle runs against the session's database, and its
//! answer (or the error the turn failed with) is appended as the assistant reply.
//! Oracle failures are never retried.

use crate::db::DatabaseSessionProvider;
use crate::error::{DashboardError, DbResult};
use crate::models::{ChatMessage, ConnectionInfo, ConnectionSelection, ConnectionTarget};
use crate::oracle::{OracleAnswer, OracleFactory, TraceEvent, TraceSink};
use crate::session::SessionContext;
use std::sync::Arc;
use tracing::{info, warn};

pub const MISSING_API_KEY: &str = "Please provide the Groq API key.";

#[derive(Clone)]
pub struct ChatService {
    provider: Arc<DatabaseSessionProvider>,
    oracles: Arc<dyn OracleFactory>,
    default_api_key: Option<String>,
}

impl ChatService {
    pub fn new(
        provider: Arc<DatabaseSessionProvider>,
        oracles: Arc<dyn OracleFactory>,
        default_api_key: Option<String>,
    ) -> Self {
        Self {
            provider,
            oracles,
            default_api_key: default_api_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
        }
    }

    pub fn provider(&self) -> &Arc<DatabaseSessionProvider> {
        &self.provider
    }

    /// Point the session at a new database and connect to it.
    ///
    /// An incomplete selection leaves the session unconfigured: this call and
    /// every later database operation fail with the same diagnostic until a
    /// valid selection arrives.
    pub async fn configure_connection(
        &self,
        session: &mut SessionContext,
        selection: ConnectionSelection,
    ) -> DbResult<ConnectionInfo> {
        session.touch();
        let target = match self.provider.resolve(selection) {
            Ok(target) => target,
            Err(e) => {
                if let DashboardError::Configuration { message } = &e {
                    session.mark_unconfigured(message.clone());
                }
                return Err(e);
            }
        };

        session.set_target(target.clone());
        let handle = self.provider.get(&target).await?;
        info!(
            session_id = %session.id(),
            db_target = %target.describe(),
            "Session connection configured"
        );
        Ok(handle.info())
    }

    /// Run one chat turn.
    ///
    /// Returns `Ok(None)` without touching the transcript when `text` is blank.
    /// A missing API key or an unconfigured session fail before the transcript
    /// changes. Once the question is recorded, anything else that goes wrong
    /// (an unreachable database included) becomes the assistant's reply.
    pub async fn ask(
        &self,
        session: &mut SessionContext,
        text: &str,
        sink: &TraceSink,
    ) -> DbResult<Option<ChatMessage>> {
        let question = text.trim();
        if question.is_empty() {
            return Ok(None);
        }
        session.touch();

        let api_key = session
            .api_key()
            .or(self.default_api_key.as_deref())
            .ok_or_else(|| DashboardError::configuration(MISSING_API_KEY))?
            .to_string();
        let target = session.target()?.clone();

        session.transcript.push(ChatMessage::user(text));

        let reply = match self.answer(&api_key, &target, question, sink).await {
            Ok(answer) => {
                info!(
                    session_id = %session.id(),
                    steps = answer.steps.len(),
                    "Chat turn answered"
                );
                sink.emit(TraceEvent::Answer {
                    text: answer.answer.clone(),
                });
                answer.answer
            }
            Err(e) => {
                warn!(session_id = %session.id(), error = %e, "Chat turn failed");
                let message = format!("Error: {}", e);
                sink.emit(TraceEvent::Failed {
                    message: message.clone(),
                });
                message
            }
        };

        let reply = ChatMessage::assistant(reply);
        session.transcript.push(reply.clone());
        Ok(Some(reply))
    }

    async fn answer(
        &self,
        api_key: &str,
        target: &ConnectionTarget,
        question: &str,
        sink: &TraceSink,
    ) -> DbResult<OracleAnswer> {
        let db = self.provider.get(target).await?;
        let oracle = self.oracles.build(api_key)?;
        oracle.answer(question, &db, sink).await
    }

    /// Reset the transcript to the greeting.
    pub fn clear(&self, session: &mut SessionContext) {
        session.touch();
        session.transcript.clear();
    }
}
