//! The Prism settlement engine.
//!
//! A [`Split`] receives Lightning payments at its own address and divides
//! each one among its [`Target`]s by weight, with fixed-percentage targets
//! served first. Each target's share becomes an obligation that is paid out
//! in batches over LNURL-pay, with backoff on failure and deferral while
//! the routing fee would eat too much of the batch.
//!
//! Collaborators (Lightning backend, LNURL client, Nostr relays, clock) are
//! passed in through [`Services`], so the engine runs unchanged against the
//! in-memory doubles in `prism-nullables`.

pub mod allocation;
pub mod batcher;
pub mod book;
pub mod error;
pub mod payout;
pub mod publish;
pub mod recovery;
pub mod registry;
pub mod report;
pub mod services;
pub mod split;
pub mod target;

pub use allocation::{allocate, percentages, Share};
pub use batcher::{plan_batch, Batch, BatchLimits};
pub use book::PaymentBook;
pub use error::SplitError;
pub use payout::{
    abandon_payout, complete_payout, prepare_payout, send_payout, worth_paying,
    PayoutContext, PendingPayout,
};
pub use recovery::recover_in_flight;
pub use registry::{SharedSplit, SplitRegistry};
pub use report::{PayoutOutcome, RecoveryReport, SweepReport, TickReport};
pub use services::{Services, ServicesBuilder};
pub use split::{validate_name, CreateInvoice, Split, TargetFee, WebhookOutcome};
pub use target::{InvoiceRequest, Target, TargetSettings};
