//! Fundamental types for Prism.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! millisatoshi amounts, entity ids, timestamps and the clock seam, the incoming
//! and outgoing payment records with their state enums, and settlement parameters.

pub mod amount;
pub mod error;
pub mod id;
pub mod params;
pub mod payment;
pub mod schedule;
pub mod target;
pub mod time;

pub use amount::MilliSats;
pub use error::TypeError;
pub use id::{IncomingId, OutgoingId, SplitId, TargetId};
pub use params::SettlementParams;
pub use payment::{IncomingPayment, IncomingStatus, OutgoingPayment, OutgoingStatus};
pub use schedule::PayoutSchedule;
pub use target::TargetKind;
pub use time::{Clock, SystemClock, Timestamp};
