//! Shared error types for the studio

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Unknown provider: {input}")]
    UnknownProvider { input: String },

    #[error("Illegal task transition: {from} -> {to}")]
    IllegalTransition {
        from: crate::types::TaskStatus,
        to: crate::types::TaskStatus,
    },

    #[error("Task invariant violated: {message}")]
    InvariantViolation { message: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
