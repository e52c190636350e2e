//! HTTP entry points for Prism.
//!
//! Provides endpoints for:
//! - LNURL-pay requests of every split (`/lnurlp/:name`, `/.well-known/lnurlp/:name`)
//! - The LNURL-pay callback that issues invoices, with optional zap requests
//! - Payment webhooks called by the Lightning backend
//! - Prometheus metrics

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::{router, RpcServer, RpcState};
