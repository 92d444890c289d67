//! Error types for the digit classifier.
//!
//! This module defines the errors that can occur while loading a model,
//! scheduling work on the classifier's worker and running inference. All
//! failures, including the ones raised on the background worker, are reported
//! through `ClassifierError`.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Represents all possible errors that can occur in the digit classifier.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Indicates a failure in file system operations when accessing the model.
    ///
    /// This error occurs when the model resource is missing, is a directory,
    /// or cannot be read or memory-mapped.
    #[error("Failed to access model file: {0}")]
    Io(#[from] std::io::Error),

    /// Indicates that the model resource was readable but is not a usable graph.
    ///
    /// This error occurs when:
    /// - The file is empty or truncated
    /// - The runtime cannot parse the graph
    /// - The declared input is not a single-channel image
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// `classify` was called before initialization completed.
    #[error("Classifier is not initialized yet")]
    NotInitialized,

    /// The classifier has been shut down and accepts no further work.
    #[error("Classifier has been closed")]
    Closed,

    /// The supplied image cannot be classified (for example it has no pixels).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Indicates that an invalid operation was attempted.
    ///
    /// This error occurs when operations are called in the wrong order, for
    /// example a second `initialize` while the first one is still running.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The model produced an output tensor of unexpected shape.
    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    /// Indicates a failure inside the runtime during a forward pass.
    #[error("Failed to execute model: {0}")]
    ExecutionError(String),

    /// An internal invariant was broken while running a background job.
    ///
    /// This is a programming error, not something callers should retry.
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// The background worker is no longer running.
    #[error("Classifier worker terminated")]
    WorkerTerminated,

    /// Indicates that the configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Indicates a failure decoding a JSON configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClassifierError {
    /// Returns `true` for failures caused by the model resource itself.
    ///
    /// These are fatal to the initialization attempt but not to the process.
    pub fn is_io_failure(&self) -> bool {
        matches!(self, Self::Io(_) | Self::InvalidModel(_))
    }

    /// Create an invalid model error.
    pub fn invalid_model(msg: impl Into<String>) -> Self {
        Self::InvalidModel(msg.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::ExecutionError(msg.into())
    }
}
