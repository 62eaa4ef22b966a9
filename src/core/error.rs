use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocPulseError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Structural integrity error: {0}")]
    Structural(String),
    #[error("Cyclic dependency: {0}")]
    CyclicDependency(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
    #[error("Fix '{fix_id}' failed: {message}")]
    FixerApply { fix_id: String, message: String },
}
