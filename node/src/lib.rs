//! Prism node: runs the settlement engine.
//!
//! The node is the central coordinator that:
//! - Loads and periodically saves the state snapshot
//! - Resolves payouts interrupted by a previous run
//! - Pays targets on a short interval
//! - Sweeps pending invoices on a longer interval
//! - Exposes logging, metrics and graceful shutdown

pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;
pub mod tracing_spans;

pub use config::{NodeConfig, SplitConfig, TargetConfig};
pub use driver::{restored_token, Collaborators, Driver};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::PrismMetrics;
pub use node::PrismNode;
pub use shutdown::{ShutdownController, ShutdownSignal};
