//! Payment backends.
//!
//! The settlement engine talks to a Lightning node only through
//! [`PaymentBackend`]: create an invoice, pay an invoice, check an invoice.
//! Two implementations exist, selected from configuration by
//! [`build_backend`]:
//!
//! - [`LnbitsBackend`]: long-lived admin API key (`X-Api-Key`).
//! - [`IbexBackend`]: short-lived access token obtained by login or from a
//!   refresh token, renewed proactively before expiry and reactively on 401.

pub mod backend;
pub mod config;
pub mod error;
mod http;
pub mod ibex;
pub mod lnbits;

pub use backend::{
    InvoiceDetails, InvoiceStatus, OutgoingPaymentStatus, PaymentBackend, PaymentDetails,
    RefreshToken,
};
pub use config::{build_backend, BackendConfig, BackendKind};
pub use error::BackendError;
pub use ibex::{IbexAuth, IbexBackend};
pub use lnbits::LnbitsBackend;
