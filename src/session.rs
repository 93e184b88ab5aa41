//! Per-session context and the registry that owns it.
//!
//! Each session carries its own role, connection target, API key and
//! transcript. Sessions never share state; a per-session mutex serialises the
//! turns of one session while different sessions proceed independently.

use crate::error::{DashboardError, DbResult};
use crate::models::{ConnectionTarget, Role, Transcript};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// How often idle sessions are swept.
const CLEANUP_INTERVAL_SECS: u64 = 60;

/// The session's database selection.
#[derive(Debug, Clone)]
enum ConnectionState {
    Ready(ConnectionTarget),
    /// Last selection was rejected; every database operation reports this.
    Invalid(String),
}

/// Everything one user session owns.
#[derive(Debug)]
pub struct SessionContext {
    id: Uuid,
    role: Role,
    connection: ConnectionState,
    api_key: Option<String>,
    pub transcript: Transcript,
    created_at: DateTime<Utc>,
    last_active: Instant,
}

impl SessionContext {
    pub fn new(role: Role, target: ConnectionTarget, api_key: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            connection: ConnectionState::Ready(target),
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            transcript: Transcript::new(),
            created_at: Utc::now(),
            last_active: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Fixed at creation.
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// The active target, or the configuration error that left the session
    /// unconfigured.
    pub fn target(&self) -> DbResult<&ConnectionTarget> {
        match &self.connection {
            ConnectionState::Ready(target) => Ok(target),
            ConnectionState::Invalid(message) => Err(DashboardError::configuration(message)),
        }
    }

    pub fn set_target(&mut self, target: ConnectionTarget) {
        self.connection = ConnectionState::Ready(target);
    }

    /// Record a rejected selection. The session stays unusable until a valid
    /// target is set.
    pub fn mark_unconfigured(&mut self, message: impl Into<String>) {
        self.connection = ConnectionState::Invalid(message.into());
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    pub fn summary(&self) -> SessionSummary {
        let (connection, connection_error) = match &self.connection {
            ConnectionState::Ready(target) => (Some(target.describe()), None),
            ConnectionState::Invalid(message) => (None, Some(message.clone())),
        };
        SessionSummary {
            id: self.id,
            role: self.role,
            connection,
            connection_error,
            has_api_key: self.api_key.is_some(),
            message_count: self.transcript.len(),
            created_at: self.created_at,
        }
    }
}

/// Display-safe view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_error: Option<String>,
    pub has_api_key: bool,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
}

pub type SharedSession = Arc<Mutex<SessionContext>>;

/// Registry of live sessions.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, context: SessionContext) -> SessionSummary {
        let summary = context.summary();
        let mut sessions = self.sessions.write().await;
        sessions.insert(context.id(), Arc::new(Mutex::new(context)));
        info!(session_id = %summary.id, role = %summary.role, "Session created");
        summary
    }

    pub async fn get(&self, id: Uuid) -> DbResult<SharedSession> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| DashboardError::session_not_found(id.to_string()))
    }

    pub async fn remove(&self, id: Uuid) -> DbResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(&id).is_none() {
            return Err(DashboardError::session_not_found(id.to_string()));
        }
        info!(session_id = %id, "Session removed");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle for longer than `idle_ttl`. Sessions mid-turn are
    /// skipped. Returns how many were removed.
    pub async fn cleanup_idle(&self, idle_ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(ctx) => ctx.idle_for() <= idle_ttl,
            Err(_) => true,
        });
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "Removed idle sessions");
        }
        removed
    }

    /// Sweep idle sessions periodically for the life of the process.
    pub fn start_cleanup_task(self, idle_ttl: Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                self.cleanup_idle(idle_ttl).await;
            }
        });
    }
}
