use std::path::PathBuf;
use thiserror::Error;

/// Every way a sweep can stop. Nothing here is retried.
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Build command `{command}` failed: {reason}")]
    Build { command: String, reason: String },

    #[error("Affinity resolution failed for {threads} threads: {reason}")]
    Affinity { threads: usize, reason: String },

    #[error("Trial of '{variant}' with {threads} threads failed: {reason}")]
    Execution {
        variant: String,
        threads: usize,
        reason: String,
    },

    #[error("Trial of '{variant}' with {threads} threads printed '{output}', which is not a number")]
    Parse {
        variant: String,
        threads: usize,
        output: String,
    },

    #[error("Cannot derive a measurement: {0}")]
    DegenerateSamples(String),

    #[error("Record for {threads} threads appended to '{variant}' after {last} threads")]
    OutOfOrder {
        variant: String,
        threads: usize,
        last: usize,
    },

    #[error("Malformed dataset line {line}: {content}")]
    MalformedDataset { line: usize, content: String },

    #[error("Rendering {script} failed: {reason}")]
    Render { script: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SweepError>;
