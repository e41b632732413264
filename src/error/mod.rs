//! Error types for the commit pipeline

use std::fmt;

pub type Result<T> = std::result::Result<T, CommitError>;

#[derive(Debug, Clone)]
pub enum CommitError {
    /// Referenced container, layer or image does not exist
    NotFound(String),
    /// Container state forbids the operation (running/restarting)
    Conflict(String),
    /// File or stream IO errors
    Io(String),
    /// Serialization / deserialization errors
    Parse(String),
    /// Invalid user input (references, change instructions, digests)
    Validation(String),
    /// Cache persistence errors
    Cache {
        message: String,
        path: Option<std::path::PathBuf>,
    },
    /// A parent layer referenced by the chain cannot be resolved
    ChainInconsistency(String),
    /// Internal invariant violations
    Internal(String),
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitError::NotFound(msg) => write!(f, "Not found: {}", msg),
            CommitError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            CommitError::Io(msg) => write!(f, "IO error: {}", msg),
            CommitError::Parse(msg) => write!(f, "Parse error: {}", msg),
            CommitError::Validation(msg) => write!(f, "Validation error: {}", msg),
            CommitError::Cache { message, path } => {
                if let Some(path) = path {
                    write!(f, "Cache error at {}: {}", path.display(), message)
                } else {
                    write!(f, "Cache error: {}", message)
                }
            }
            CommitError::ChainInconsistency(msg) => {
                write!(f, "Layer chain inconsistency: {}", msg)
            }
            CommitError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for CommitError {}

impl CommitError {
    /// True when the failure is a user-facing not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, CommitError::NotFound(_))
    }

    /// True when the failure is a state conflict (container still running)
    pub fn is_conflict(&self) -> bool {
        matches!(self, CommitError::Conflict(_))
    }
}

impl From<std::io::Error> for CommitError {
    fn from(err: std::io::Error) -> Self {
        CommitError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CommitError {
    fn from(err: serde_json::Error) -> Self {
        CommitError::Parse(err.to_string())
    }
}

impl From<tempfile::PersistError> for CommitError {
    fn from(err: tempfile::PersistError) -> Self {
        CommitError::Io(format!("Failed to persist temporary file: {}", err.error))
    }
}

impl From<std::string::FromUtf8Error> for CommitError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        CommitError::Parse(format!("UTF-8 conversion error: {}", err))
    }
}

impl From<crate::config::changes::ChangeError> for CommitError {
    fn from(err: crate::config::changes::ChangeError) -> Self {
        CommitError::Validation(format!("Invalid change instruction: {}", err))
    }
}
