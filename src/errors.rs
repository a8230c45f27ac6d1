use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", content = "data")]
pub enum LeitError {
    SessionNotFound {
        session_id: String,
    },
    SessionAlreadyExists {
        session_id: String,
    },
    InvalidInput {
        field: String,
        message: String,
    },
    GitOperationFailed {
        operation: String,
        message: String,
    },
    WorktreeProvisionFailed {
        path: String,
        message: String,
    },
    TerminalNotFound {
        terminal_id: String,
    },
    TerminalOperationFailed {
        terminal_id: String,
        operation: String,
        message: String,
    },
    CommandTimedOut {
        command: String,
    },
    StoreError {
        key: String,
        message: String,
    },
}

impl LeitError {
    pub fn git(operation: &str, error: impl ToString) -> Self {
        LeitError::GitOperationFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }

    pub fn invalid_input(field: &str, message: impl ToString) -> Self {
        LeitError::InvalidInput {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn store(key: &str, error: impl ToString) -> Self {
        LeitError::StoreError {
            key: key.to_string(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for LeitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SessionNotFound { session_id } => {
                write!(f, "Session '{session_id}' not found")
            }
            Self::SessionAlreadyExists { session_id } => {
                write!(f, "Session '{session_id}' already exists")
            }
            Self::InvalidInput { field, message } => {
                write!(f, "Invalid input for field '{field}': {message}")
            }
            Self::GitOperationFailed { operation, message } => {
                write!(f, "Git operation '{operation}' failed: {message}")
            }
            Self::WorktreeProvisionFailed { path, message } => {
                write!(f, "Failed to provision worktree at '{path}': {message}")
            }
            Self::TerminalNotFound { terminal_id } => {
                write!(f, "Terminal '{terminal_id}' not found")
            }
            Self::TerminalOperationFailed {
                terminal_id,
                operation,
                message,
            } => {
                write!(
                    f,
                    "Terminal operation '{operation}' failed for terminal '{terminal_id}': {message}"
                )
            }
            Self::CommandTimedOut { command } => {
                write!(f, "Command timed out: {command}")
            }
            Self::StoreError { key, message } => {
                write!(f, "Store error for key '{key}': {message}")
            }
        }
    }
}

impl std::error::Error for LeitError {}

impl From<LeitError> for String {
    fn from(error: LeitError) -> Self {
        error.to_string()
    }
}
