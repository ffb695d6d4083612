//! Error types for the Session Manager, Task Manager, store contract and
//! executor contract.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionManagerError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum TaskManagerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("task not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor failed: {0}")]
    Failed(String),
    #[error("execution cancelled")]
    Cancelled,
}
