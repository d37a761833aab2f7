//! Pipeline error types.
//!
//! Completion-service failures and deadlines are fatal to the run and
//! propagate to the caller; tool failures and memory-recall failures never
//! surface here — they are degraded in place (encoded as message content,
//! or treated as an empty recall result).

use std::time::Duration;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that abort an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The completion service failed. Fatal; no retry policy.
    #[error("completion service failed during {stage}: {message}")]
    Completion { stage: String, message: String },

    /// The completion service exceeded its per-call deadline.
    #[error("completion service timed out after {timeout_secs}s during {stage}")]
    Timeout { stage: String, timeout_secs: u64 },

    /// An analyst's tool sub-loop hit its iteration cap without a final answer.
    #[error("tool loop exceeded {cap} iterations during {stage}")]
    ToolLoopExceeded { stage: String, cap: u32 },

    /// The run configuration is invalid.
    #[error("invalid run configuration: {message}")]
    Config { message: String },
}

impl PipelineError {
    pub fn completion(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Completion {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn timeout(stage: impl Into<String>, deadline: Duration) -> Self {
        Self::Timeout {
            stage: stage.into(),
            timeout_secs: deadline.as_secs(),
        }
    }

    pub fn tool_loop_exceeded(stage: impl Into<String>, cap: u32) -> Self {
        Self::ToolLoopExceeded {
            stage: stage.into(),
            cap,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The stage the error occurred in, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Completion { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::ToolLoopExceeded { stage, .. } => Some(stage),
            Self::Config { .. } => None,
        }
    }
}
