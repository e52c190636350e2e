use thiserror::Error;

use prism_backend::BackendError;
use prism_types::{IncomingId, IncomingStatus, MilliSats, TargetId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SplitError {
    /// A destination is malformed or unreachable; the change is not applied.
    #[error("invalid target: {0}")]
    Validation(String),

    /// A backend or destination rejected a payout.
    #[error("payment failed: {0}")]
    Payment(String),

    /// The batch is not worth paying yet. Not a failure: the target waits
    /// for more value instead of backing off.
    #[error("payout of {available} deferred until more value arrives (needs {needed})")]
    RetryOnNextPayment {
        needed: MilliSats,
        available: MilliSats,
    },

    /// A paid notification for an incoming payment that already left
    /// `Pending`. Handling it would split the same value twice.
    #[error("incoming payment {id} is already {status}")]
    AlreadySettled {
        id: IncomingId,
        status: IncomingStatus,
    },

    #[error("unknown incoming payment {0}")]
    UnknownIncoming(IncomingId),

    #[error("unknown target {0}")]
    UnknownTarget(TargetId),

    #[error("unknown split {0}")]
    UnknownSplit(String),

    #[error("{0}")]
    Conflict(String),

    /// A collaborator (relay network, LNURL endpoint) could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SplitError {
    /// Whether the error comes from the caller's input rather than from the
    /// engine or its collaborators.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Conflict(_)
                | Self::UnknownIncoming(_)
                | Self::UnknownTarget(_)
                | Self::UnknownSplit(_)
        )
    }
}
