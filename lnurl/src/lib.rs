//! LNURL-pay (LUD-06, LUD-12, LUD-16, LUD-17).
//!
//! Targets are paid by asking their LNURL-pay endpoint for an invoice. This
//! crate normalizes the inputs users type (Lightning addresses, `lnurlp://`
//! URLs, bech32 `lnurl1...` strings), fetches pay-request metadata through the
//! [`LnurlClient`] seam, and applies the invoice-request rules in
//! [`fetch_invoice`]. It also builds the pay-request document a split serves
//! for itself.

pub mod address;
pub mod client;
pub mod error;
pub mod pay;

pub use address::{address_to_url, is_lightning_address, normalize_lnurlp};
pub use client::{HttpLnurlClient, LnurlClient};
pub use error::LnurlError;
pub use pay::{fetch_invoice, split_metadata, InvoiceParams, PayRequest};
