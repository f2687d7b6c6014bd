//! Error types for relnode.
//!
//! Every layer has its own strongly typed error (thiserror), and
//! [`RelnodeError`] folds them together for callers that do not care which
//! layer failed. Failures are always scoped to a single message or a single
//! cache lookup; nothing here is fatal to the pipeline.

use thiserror::Error;

use crate::entity::{Direction, EntityKind};
use crate::pipeline::Stage;

/// Failure reported by a backing entity service.
///
/// `Clone` so one failed load can be handed to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The service answered with an error.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// The service could not be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// An entity with the same name already exists for the tenant.
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// The service does not support the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Failure while resolving a descriptor to an identity.
///
/// "Not found" is not an error at this layer; it is an absent handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Failed to resolve {kind} '{name}': {source}")]
    Storage {
        kind: EntityKind,
        name: String,
        source: StorageError,
    },

    #[error("Resolution of {kind} '{name}' was abandoned before completing")]
    Abandoned {
        kind: EntityKind,
        name: String,
    },
}

/// Failure raised by an action hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Action failed: {message}")]
    Failed {
        message: String,
    },

    #[error("Action storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ActionError {
    /// Creates a generic action failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Failure submitting work to an executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Executor '{executor}' queue is full (capacity {capacity})")]
    QueueFull {
        executor: String,
        capacity: usize,
    },

    #[error("Executor '{executor}' is shut down")]
    Disconnected {
        executor: String,
    },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Field '{field}' cannot be empty")]
    EmptyField {
        field: String,
    },

    #[error("Unknown entity kind '{value}'")]
    UnknownKind {
        value: String,
    },

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a message was routed to failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureCause {
    #[error("No entity found with kind '{kind}' and name '{name}'")]
    NotFound {
        kind: EntityKind,
        name: String,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Dispatch(#[from] ExecutionError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("Action panicked: {message}")]
    ActionPanicked {
        message: String,
    },
}

/// A message-scoped failure, carrying enough context to diagnose it without
/// replaying the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed for {kind} '{name}' (direction {direction}): {cause}")]
pub struct PipelineError {
    /// Step at which processing stopped.
    pub stage: Stage,
    /// Configured entity kind.
    pub kind: EntityKind,
    /// Substituted entity name.
    pub name: String,
    /// Configured direction.
    pub direction: Direction,
    /// Underlying cause.
    #[source]
    pub cause: FailureCause,
}

impl PipelineError {
    /// Returns true if the entity could not be found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.cause, FailureCause::NotFound { .. })
    }

    /// Returns true if the action hook raised (or panicked).
    #[must_use]
    pub const fn is_action(&self) -> bool {
        matches!(
            self.cause,
            FailureCause::Action(_) | FailureCause::ActionPanicked { .. }
        )
    }
}

/// Top-level error type for relnode.
#[derive(Debug, Error)]
pub enum RelnodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl RelnodeError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a resolution error.
    #[must_use]
    pub const fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this error may go away when the message is delivered again.
    ///
    /// relnode never retries on its own; this only informs an outer policy.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Internal { .. } => false,
            Self::Resolution(_) => true,
            Self::Execution(e) => matches!(e, ExecutionError::QueueFull { .. }),
            Self::Pipeline(e) => matches!(
                e.cause,
                FailureCause::Resolution(_)
                    | FailureCause::Dispatch(ExecutionError::QueueFull { .. })
            ),
        }
    }
}

/// Result type alias for relnode operations.
pub type RelnodeResult<T> = Result<T, RelnodeError>;
