use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] prism_store::StoreError),

    #[error("backend error: {0}")]
    Backend(#[from] prism_backend::BackendError),

    #[error("lnurl error: {0}")]
    Lnurl(#[from] prism_lnurl::LnurlError),

    #[error("split error: {0}")]
    Split(#[from] prism_splits::SplitError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node already started")]
    AlreadyStarted,

    #[error("shutdown timeout")]
    ShutdownTimeout,

    #[error("{0}")]
    Other(String),
}
