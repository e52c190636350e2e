//! Parse errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),
}
