use thiserror::Error;

use prism_types::MilliSats;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LnurlError {
    #[error("invalid LNURL input: {0}")]
    InvalidInput(String),

    #[error("unreachable LNURL endpoint {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("invalid LNURL response: {0}")]
    InvalidResponse(String),

    #[error("amount {amount} outside sendable range {min}..={max}")]
    AmountOutOfRange {
        amount: MilliSats,
        min: MilliSats,
        max: MilliSats,
    },

    #[error("comment of {len} chars exceeds limit of {max}")]
    CommentTooLong { len: usize, max: u32 },

    /// The callback answered `{"status":"ERROR","reason":...}`.
    #[error("LNURL callback error: {0}")]
    Callback(String),
}
