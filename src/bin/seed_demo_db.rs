//! Populate the embedded database with the demo school schema.
//!
//! Destructive: existing CLASS, STUDENT, TEACHER, SUBJECT and MARKS tables are
//! dropped and recreated.

use clap::Parser;
use db_chat_dashboard::config::{DEFAULT_SQLITE_FILE, resolve_embedded_path};
use db_chat_dashboard::db::seed_file;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "seed-demo-db", about = "Create the demo school database", version)]
struct Args {
    /// SQLite file to (re)create. Relative paths resolve against the executable's directory.
    #[arg(
        long = "sqlite-file",
        value_name = "PATH",
        default_value = DEFAULT_SQLITE_FILE,
        env = "DASHBOARD_SQLITE_FILE"
    )]
    sqlite_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DASHBOARD_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = resolve_embedded_path(&args.sqlite_file)?;
    info!(path = %path.display(), "Seeding demo database");

    match seed_file(&path).await {
        Ok(report) => {
            print!("{}", report);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Seeding failed");
            Err(e.into())
        }
    }
}
