//! Connection-related data models.
//!
//! A session talks to exactly one [`ConnectionTarget`]: the embedded SQLite file
//! or a remote MySQL server reached with explicit credentials.

use crate::error::{DashboardError, DbResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default MySQL port when the host does not carry one.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Which kind of target the user picked in the connection selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Embedded,
    Remote,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Embedded => write!(f, "embedded"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Credentials for a remote MySQL server. Only constructible with all four fields set.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RemoteCredentials {
    host: String,
    user: String,
    /// Contains sensitive data - never log
    password: String,
    database: String,
}

impl RemoteCredentials {
    /// Build credentials, failing with a configuration error that names every
    /// missing field. No connection is attempted here.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> DbResult<Self> {
        let host = host.into().trim().to_string();
        let user = user.into().trim().to_string();
        let password = password.into();
        let database = database.into().trim().to_string();

        let missing: Vec<&str> = [
            ("host", host.is_empty()),
            ("user", user.is_empty()),
            ("password", password.is_empty()),
            ("database", database.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if !missing.is_empty() {
            return Err(DashboardError::configuration(format!(
                "Provide full MySQL details (missing: {})",
                missing.join(", ")
            )));
        }

        Ok(Self {
            host,
            user,
            password,
            database,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Split `host[:port]` into its parts.
    pub fn host_and_port(&self) -> DbResult<(&str, u16)> {
        match self.host.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port.parse::<u16>().map_err(|_| {
                    DashboardError::configuration(format!("Invalid MySQL port '{}'", port))
                })?;
                Ok((host, port))
            }
            _ => Ok((self.host.as_str(), DEFAULT_MYSQL_PORT)),
        }
    }

    /// Display-safe DSN with the password masked.
    pub fn masked_connection_string(&self) -> String {
        let fallback = format!("mysql://{}:****@{}/{}", self.user, self.host, self.database);
        let Ok(mut url) = url::Url::parse(&format!("mysql://{}/{}", self.host, self.database))
        else {
            return fallback;
        };
        if url.set_username(&self.user).is_err() || url.set_password(Some("****")).is_err() {
            return fallback;
        }
        url.to_string()
    }
}

impl std::fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"****")
            .field("database", &self.database)
            .finish()
    }
}

/// The database a session talks to. Exactly one is active per session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionTarget {
    /// Local SQLite file, opened read-write.
    Embedded(PathBuf),
    /// MySQL server reached over the network.
    Remote(RemoteCredentials),
}

impl ConnectionTarget {
    pub fn embedded(path: impl AsRef<Path>) -> Self {
        Self::Embedded(path.as_ref().to_path_buf())
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Embedded(_) => TargetKind::Embedded,
            Self::Remote(_) => TargetKind::Remote,
        }
    }

    pub fn db_type(&self) -> DatabaseType {
        match self {
            Self::Embedded(_) => DatabaseType::SQLite,
            Self::Remote(_) => DatabaseType::MySQL,
        }
    }

    /// Human-readable description with secrets masked.
    pub fn describe(&self) -> String {
        match self {
            Self::Embedded(path) => format!("sqlite://{}", path.display()),
            Self::Remote(creds) => creds.masked_connection_string(),
        }
    }
}

/// Connection selection as submitted by the UI.
///
/// Remote fields are optional here so that a partially-filled form can be
/// reported back with every missing field named.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionSelection {
    pub kind: Option<TargetKind>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

impl ConnectionSelection {
    pub fn embedded() -> Self {
        Self {
            kind: Some(TargetKind::Embedded),
            ..Self::default()
        }
    }

    pub fn remote(host: &str, user: &str, password: &str, database: &str) -> Self {
        Self {
            kind: Some(TargetKind::Remote),
            host: Some(host.to_string()),
            user: Some(user.to_string()),
            password: Some(password.to_string()),
            database: Some(database.to_string()),
        }
    }

    /// Turn the selection into a target. The embedded choice always maps to
    /// `embedded_path`; the client cannot point it at another file.
    pub fn resolve(self, embedded_path: &Path) -> DbResult<ConnectionTarget> {
        match self.kind.unwrap_or(TargetKind::Embedded) {
            TargetKind::Embedded => Ok(ConnectionTarget::embedded(embedded_path)),
            TargetKind::Remote => RemoteCredentials::new(
                self.host.unwrap_or_default(),
                self.user.unwrap_or_default(),
                self.password.unwrap_or_default(),
                self.database.unwrap_or_default(),
            )
            .map(ConnectionTarget::Remote),
        }
    }
}

/// Information about a ready handle, returned after a successful connect.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub kind: TargetKind,
    pub database_type: DatabaseType,
    pub target: String,
    pub server_version: Option<String>,
}
