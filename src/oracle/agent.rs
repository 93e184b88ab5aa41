//! Tool-calling SQL agent.
//!
//! The agent alternates between asking the model for its next move and
//! running the tools it requests, until the model answers in plain text or
//! the step budget runs out. Each thought, tool call and observation is
//! recorded and forwarded to the trace sink as it happens.

use crate::db::DbHandle;
use crate::error::DbResult;
use crate::models::DatabaseType;
use crate::oracle::client::{CompletionModel, Message, ToolSpec};
use crate::oracle::tools::{SqlToolbox, tool_specs};
use crate::oracle::trace::{TraceEvent, TraceSink};
use crate::oracle::{Oracle, OracleAnswer};
use futures_util::future::BoxFuture;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

/// Answer returned when the step budget is exhausted.
pub const STEP_LIMIT_ANSWER: &str = "Agent stopped due to iteration limit or time limit.";

/// Suggested row cap written into the system prompt.
pub const TOP_K: u32 = 10;

fn system_prompt(dialect: DatabaseType) -> String {
    format!(
        "You are an agent that answers questions about a {dialect} database.\n\
         Work out a syntactically correct {dialect} query for the question, run it, \
         look at the result and answer from it.\n\
         Unless the user asks for a specific number of rows, limit queries to at most \
         {TOP_K} results. Order by a relevant column to surface the most interesting rows.\n\
         Only select the columns the question needs.\n\
         Always call list_tables first, then describe_tables for the relevant tables \
         before writing a query.\n\
         If a query fails, read the error, rewrite the query and try again.\n\
         Never issue INSERT, UPDATE, DELETE, DROP or any other write statement.\n\
         If the question is unrelated to the database, answer \"I don't know\"."
    )
}

/// ReAct-style agent over any [`CompletionModel`].
pub struct SqlAgent<M> {
    model: M,
    max_steps: u32,
    tools: Vec<ToolSpec>,
}

impl<M: CompletionModel> SqlAgent<M> {
    pub fn new(model: M, max_steps: u32) -> Self {
        Self {
            model,
            max_steps: max_steps.max(1),
            tools: tool_specs(),
        }
    }

    pub async fn run(
        &self,
        question: &str,
        db: &DbHandle,
        sink: &TraceSink,
    ) -> DbResult<OracleAnswer> {
        let toolbox = SqlToolbox::new(db);
        let mut steps = Vec::new();
        let mut record = |event: TraceEvent| {
            sink.emit(event.clone());
            steps.push(event);
        };

        let mut messages = vec![
            Message::system(system_prompt(db.db_type())),
            Message::user(question),
        ];

        for step in 1..=self.max_steps {
            let reply = self.model.complete(&messages, &self.tools).await?;
            debug!(
                step,
                tool_calls = reply.tool_calls.len(),
                "Agent step"
            );

            if reply.tool_calls.is_empty() {
                let answer = reply.text().unwrap_or_default().to_string();
                info!(steps = step, "Agent finished");
                return Ok(OracleAnswer { steps, answer });
            }

            if let Some(thought) = reply.text() {
                record(TraceEvent::Thought {
                    text: thought.to_string(),
                });
            }

            let calls = reply.tool_calls.clone();
            messages.push(Message::assistant_with_calls(reply.content, reply.tool_calls));

            for call in calls {
                let input = serde_json::from_str::<JsonValue>(&call.function.arguments)
                    .unwrap_or_else(|_| JsonValue::String(call.function.arguments.clone()));
                record(TraceEvent::ToolCall {
                    tool: call.function.name.clone(),
                    input,
                });

                let output = toolbox
                    .invoke(&call.function.name, &call.function.arguments)
                    .await;
                record(TraceEvent::Observation {
                    tool: call.function.name.clone(),
                    output: output.clone(),
                });
                messages.push(Message::tool(call.id, output));
            }
        }

        warn!(max_steps = self.max_steps, "Agent hit its step limit");
        Ok(OracleAnswer {
            steps,
            answer: STEP_LIMIT_ANSWER.to_string(),
        })
    }
}

impl<M: CompletionModel> Oracle for SqlAgent<M> {
    fn answer<'a>(
        &'a self,
        question: &'a str,
        db: &'a DbHandle,
        sink: &'a TraceSink,
    ) -> BoxFuture<'a, DbResult<OracleAnswer>> {
        Box::pin(self.run(question, db, sink))
    }
}
