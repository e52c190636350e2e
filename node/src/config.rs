//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use prism_backend::BackendConfig;
use prism_splits::TargetSettings;
use prism_types::SettlementParams;

use crate::NodeError;

/// Configuration for a Prism node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the snapshot file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Snapshot file name inside `data_dir`.
    #[serde(default = "default_db_file")]
    pub db_file: String,

    /// Port of the HTTP server (LNURL-pay, webhooks, metrics).
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Domain the splits are reachable at; webhooks and Lightning addresses
    /// are built from it.
    #[serde(default = "default_public_domain")]
    pub public_domain: String,

    /// Nostr relays for profiles, zap receipts and target resolution.
    #[serde(default = "default_relays")]
    pub relays: Vec<String>,

    /// Interval between payout ticks.
    #[serde(default = "default_payout_interval_ms")]
    pub payout_interval_ms: u64,

    /// Interval between invoice-status sweeps.
    #[serde(default = "default_invoice_check_interval_secs")]
    pub invoice_check_interval_secs: u64,

    /// Interval between snapshot saves.
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,

    /// How long an uneconomical batch waits for new value.
    #[serde(default = "default_deferral_secs")]
    pub deferral_secs: u64,

    /// Linear backoff step after a failed payout.
    #[serde(default = "default_backoff_step_secs")]
    pub backoff_step_secs: u64,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to serve the Prometheus metrics endpoint.
    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub backend: BackendConfig,

    /// Splits that must exist on start. Missing ones are created in
    /// `public_domain` together with their targets; existing ones are left
    /// untouched.
    #[serde(default)]
    pub splits: Vec<SplitConfig>,
}

/// A split declared in the configuration file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enable_zaps: bool,
    #[serde(default = "default_true")]
    pub publish_profile: bool,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Lightning address, LNURL or Nostr identity.
    pub input: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default = "default_true")]
    pub forward_comment: bool,
    #[serde(default)]
    pub payout_threshold: f64,
}

impl TargetConfig {
    pub fn settings(&self) -> TargetSettings {
        TargetSettings {
            weight: self.weight,
            fixed: self.fixed,
            forward_comment: self.forward_comment,
            payout_threshold: self.payout_threshold,
        }
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./prism_data")
}

fn default_db_file() -> String {
    "prism.json".to_string()
}

fn default_listen_port() -> u16 {
    3000
}

fn default_public_domain() -> String {
    "localhost".to_string()
}

fn default_relays() -> Vec<String> {
    vec![
        "wss://relay.damus.io".to_string(),
        "wss://nos.lol".to_string(),
    ]
}

fn default_payout_interval_ms() -> u64 {
    2_000
}

fn default_invoice_check_interval_secs() -> u64 {
    30
}

fn default_save_interval_secs() -> u64 {
    10
}

fn default_deferral_secs() -> u64 {
    24 * 3600
}

fn default_backoff_step_secs() -> u64 {
    60
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    /// Full path of the snapshot file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    /// Engine parameters derived from this configuration.
    pub fn settlement_params(&self) -> SettlementParams {
        SettlementParams {
            deferral_secs: self.deferral_secs,
            backoff_step_secs: self.backoff_step_secs,
            ..SettlementParams::default()
        }
    }

    /// Reject values the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.payout_interval_ms == 0 {
            return Err(NodeError::Config("payout_interval_ms must be positive".into()));
        }
        if self.invoice_check_interval_secs == 0 || self.save_interval_secs == 0 {
            return Err(NodeError::Config("intervals must be positive".into()));
        }
        if self.public_domain.trim().is_empty() {
            return Err(NodeError::Config("public_domain must not be empty".into()));
        }
        if self.db_file.trim().is_empty() {
            return Err(NodeError::Config("db_file must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: default_db_file(),
            listen_port: default_listen_port(),
            public_domain: default_public_domain(),
            relays: default_relays(),
            payout_interval_ms: default_payout_interval_ms(),
            invoice_check_interval_secs: default_invoice_check_interval_secs(),
            save_interval_secs: default_save_interval_secs(),
            deferral_secs: default_deferral_secs(),
            backoff_step_secs: default_backoff_step_secs(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            backend: BackendConfig::default(),
            splits: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_backend::BackendKind;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.listen_port, config.listen_port);
        assert_eq!(parsed.relays, config.relays);
        assert_eq!(parsed.db_file, config.db_file);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.listen_port, 3000);
        assert_eq!(config.db_file, "prism.json");
        assert_eq!(config.payout_interval_ms, 2_000);
        assert_eq!(config.invoice_check_interval_secs, 30);
        assert_eq!(config.save_interval_secs, 10);
        assert_eq!(config.relays.len(), 2);
        assert_eq!(config.log_format, "human");
        assert!(config.backend.kind.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            listen_port = 8080
            public_domain = "prism.example.com"
            deferral_secs = 600

            [backend]
            url = "https://lnbits.example.com"
            admin_key = "secret"

            [[splits]]
            name = "podcast"
            publish_profile = false

            [[splits.targets]]
            input = "alice@example.com"
            weight = 30
            fixed = true

            [[splits.targets]]
            input = "bob@example.com"
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.backend.resolve_kind().unwrap(), BackendKind::Lnbits);
        assert_eq!(config.settlement_params().deferral_secs, 600);
        assert_eq!(config.settlement_params().backoff_step_secs, 60);

        let split = &config.splits[0];
        assert!(split.enable_zaps);
        assert!(!split.publish_profile);
        assert_eq!(split.targets.len(), 2);
        assert!(split.targets[0].settings().fixed);
        assert_eq!(split.targets[1].settings().weight, 1);
        assert!(split.targets[1].forward_comment);
    }

    #[test]
    fn db_path_joins_data_dir() {
        let config = NodeConfig {
            data_dir: PathBuf::from("/var/lib/prism"),
            ..NodeConfig::default()
        };
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/prism/prism.json"));
    }

    #[test]
    fn zero_interval_rejected() {
        let config = NodeConfig {
            payout_interval_ms: 0,
            ..NodeConfig::default()
        };
        assert!(matches!(config.validate(), Err(NodeError::Config(_))));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/prism.toml");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
