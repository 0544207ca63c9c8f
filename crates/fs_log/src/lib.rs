//! fskit Logging & Observability Module
//!
//! Provides structured logging, panic handling, and crash reports.

mod logging;
mod panic_hook;

pub use logging::{cleanup_old_logs, init_logging};
pub use panic_hook::init_panic_hook;

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application log directory
pub fn log_dir() -> PathBuf {
    ProjectDirs::from("dev", "fskit", "fskit")
        .map(|dirs| dirs.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

/// Initialize all observability features
pub fn init() -> anyhow::Result<()> {
    init_logging()?;
    init_panic_hook();
    Ok(())
}
