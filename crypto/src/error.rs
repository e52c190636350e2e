use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("event id does not match its content")]
    IdMismatch,

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid event: {0}")]
    InvalidEvent(String),
}
