//! StudyHub Common Library
//!
//! Shared code for the StudyHub services including:
//! - Note request review workflow and publication projector
//! - Database models and repository patterns
//! - Uploaded file intake
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod files;
pub mod metrics;
pub mod workflow;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use workflow::ReviewWorkflow;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
