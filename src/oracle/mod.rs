//! Natural-language-to-SQL oracle.
//!
//! The chat façade only sees the [`Oracle`] trait: a question and a database
//! handle go in, the recorded steps and a final answer come out. The shipped
//! implementation is a tool-calling [`SqlAgent`] driven by a hosted
//! chat-completion API.

pub mod agent;
pub mod client;
pub mod format;
pub mod tools;
pub mod trace;

pub use agent::{STEP_LIMIT_ANSWER, SqlAgent};
pub use client::{CompletionModel, Message, OpenAiCompatClient, ToolCall, ToolSpec};
pub use trace::{TraceEvent, TraceSink};

use crate::config::LlmSettings;
use crate::db::DbHandle;
use crate::error::DbResult;
use futures_util::future::BoxFuture;
use serde::Serialize;

/// Result of one oracle call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleAnswer {
    /// Intermediate steps in the order they happened.
    pub steps: Vec<TraceEvent>,
    pub answer: String,
}

pub trait Oracle: Send + Sync {
    /// Answer `question` against `db`, forwarding steps to `sink` as they occur.
    fn answer<'a>(
        &'a self,
        question: &'a str,
        db: &'a DbHandle,
        sink: &'a TraceSink,
    ) -> BoxFuture<'a, DbResult<OracleAnswer>>;
}

/// Builds an oracle bound to one API key.
pub trait OracleFactory: Send + Sync {
    fn build(&self, api_key: &str) -> DbResult<Box<dyn Oracle>>;
}

/// Factory for [`SqlAgent`]s over the hosted chat-completion API.
#[derive(Debug, Clone)]
pub struct HostedAgentFactory {
    settings: LlmSettings,
}

impl HostedAgentFactory {
    pub fn new(settings: LlmSettings) -> Self {
        Self { settings }
    }
}

impl OracleFactory for HostedAgentFactory {
    fn build(&self, api_key: &str) -> DbResult<Box<dyn Oracle>> {
        let client = OpenAiCompatClient::new(&self.settings, api_key)?;
        Ok(Box::new(SqlAgent::new(client, self.settings.max_steps)))
    }
}
