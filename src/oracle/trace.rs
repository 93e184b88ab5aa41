//! Intermediate agent steps, streamed to the caller as they happen.

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

/// One observable step of a chat turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Reasoning text the model produced alongside a tool call.
    Thought { text: String },
    ToolCall { tool: String, input: JsonValue },
    Observation { tool: String, output: String },
    /// Final assistant message; always the last event of a turn.
    Answer { text: String },
    /// The turn failed. Always the last event of a turn.
    Failed { message: String },
}

impl TraceEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            TraceEvent::Thought { .. } => "thought",
            TraceEvent::ToolCall { .. } => "tool_call",
            TraceEvent::Observation { .. } => "observation",
            TraceEvent::Answer { .. } => "answer",
            TraceEvent::Failed { .. } => "error",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, TraceEvent::Answer { .. } | TraceEvent::Failed { .. })
    }
}

/// Where trace events go. A sink without a receiver simply drops them.
#[derive(Debug, Clone, Default)]
pub struct TraceSink {
    tx: Option<mpsc::UnboundedSender<TraceEvent>>,
}

impl TraceSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TraceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn discard() -> Self {
        Self::default()
    }

    /// Forward `event`. A disconnected receiver is not an error.
    pub fn emit(&self, event: TraceEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (sink, mut rx) = TraceSink::channel();
        sink.emit(TraceEvent::Thought { text: "look".into() });
        sink.emit(TraceEvent::Answer { text: "done".into() });
        drop(sink);

        assert_eq!(rx.recv().await.unwrap().name(), "thought");
        let last = rx.recv().await.unwrap();
        assert!(last.is_final());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_discard_and_closed_receiver_are_silent() {
        TraceSink::discard().emit(TraceEvent::Failed { message: "x".into() });
        let (sink, rx) = TraceSink::channel();
        drop(rx);
        sink.emit(TraceEvent::Answer { text: "y".into() });
    }

    #[test]
    fn test_serialized_shape() {
        let event = TraceEvent::ToolCall {
            tool: "run_query".into(),
            input: serde_json::json!({"sql": "SELECT 1"}),
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "tool_call");
        assert_eq!(v["input"]["sql"], "SELECT 1");
    }
}
