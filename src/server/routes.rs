//! Request handlers.
//!
//! Handlers that touch a session lock it for the whole operation, so turns of
//! one session are serialised while other sessions run concurrently.

use super::AppState;
use crate::error::DbResult;
use crate::explorer::TableView;
use crate::ingest::{UploadOutcome, UploadRequest};
use crate::models::{ChatMessage, ConnectionInfo, ConnectionSelection, Role, TableInfo};
use crate::oracle::{TraceEvent, TraceSink};
use crate::session::{SessionContext, SessionSummary};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSession {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Defaults to the embedded database.
    #[serde(default)]
    pub connection: Option<ConnectionSelection>,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSession>,
) -> DbResult<(StatusCode, Json<SessionSummary>)> {
    let mut context = SessionContext::new(
        body.role,
        state.provider.embedded_target(),
        body.api_key,
    );
    if let Some(selection) = body.connection {
        state.chat.configure_connection(&mut context, selection).await?;
    }
    let summary = state.sessions.insert(context).await;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> DbResult<Json<SessionSummary>> {
    let session = state.sessions.get(id).await?;
    let summary = session.lock().await.summary();
    Ok(Json(summary))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> DbResult<StatusCode> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn configure_connection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(selection): Json<ConnectionSelection>,
) -> DbResult<Json<ConnectionInfo>> {
    let session = state.sessions.get(id).await?;
    let mut context = session.lock().await;
    let info = state.chat.configure_connection(&mut context, selection).await?;
    Ok(Json(info))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> DbResult<Json<Vec<ChatMessage>>> {
    let session = state.sessions.get(id).await?;
    let messages = session.lock().await.transcript.messages().to_vec();
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub text: String,
}

/// Run one chat turn and stream its steps as server-sent events.
///
/// Events are named after [`TraceEvent::name`]; the stream ends after the
/// `answer` or `error` event. A blank message yields an empty stream.
pub async fn ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AskBody>,
) -> DbResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let session = state.sessions.get(id).await?;
    let (sink, rx) = TraceSink::channel();
    let chat = state.chat.clone();

    tokio::spawn(async move {
        let mut context = session.lock().await;
        if let Err(e) = chat.ask(&mut context, &body.text, &sink).await {
            warn!(session_id = %id, error = %e, "Chat turn rejected");
            sink.emit(TraceEvent::Failed {
                message: e.to_string(),
            });
        }
        // Dropping the sink closes the stream
    });

    // The stream closes after the final event even if the turn task lingers
    let events = stream::unfold((rx, false), |(mut rx, done)| async move {
        if done {
            return None;
        }
        let event = rx.recv().await?;
        debug!(event = event.name(), "Streaming trace event");
        let sse = Event::default()
            .event(event.name())
            .json_data(&event)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        Some((Ok::<_, Infallible>(sse), (rx, event.is_final())))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn clear_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> DbResult<Json<Vec<ChatMessage>>> {
    let session = state.sessions.get(id).await?;
    let mut context = session.lock().await;
    state.chat.clear(&mut context);
    Ok(Json(context.transcript.messages().to_vec()))
}

pub async fn upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UploadRequest>,
) -> DbResult<Json<UploadOutcome>> {
    let session = state.sessions.get(id).await?;
    let role = {
        let mut context = session.lock().await;
        context.touch();
        context.role()
    };
    let outcome = state.uploader.create_table(role, request).await?;
    Ok(Json(outcome))
}

pub async fn list_tables(State(state): State<AppState>) -> DbResult<Json<Vec<TableInfo>>> {
    Ok(Json(state.explorer.list_tables().await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
    pub column: Option<String>,
}

pub async fn view_table(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ViewParams>,
) -> DbResult<Json<TableView>> {
    let view = state
        .explorer
        .view(&name, params.column.as_deref())
        .await?;
    Ok(Json(view))
}
