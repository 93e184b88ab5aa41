//! DB Chat Dashboard library.
//!
//! Natural-language questions over a SQLite or MySQL database, answered by a
//! tool-calling LLM agent, plus table exploration and role-gated CSV uploads
//! into the embedded database. The HTTP front end lives in [`server`].

pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod explorer;
pub mod ingest;
pub mod models;
pub mod oracle;
pub mod server;
pub mod session;

pub use chat::ChatService;
pub use config::Config;
pub use error::{DashboardError, DbResult};
pub use server::{AppState, HttpServer, router};
pub use session::{SessionContext, SessionStore};
