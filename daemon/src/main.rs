//! Prism daemon: entry point for running a Prism node.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use prism_backend::BackendKind;
use prism_node::{init_logging, LogFormat, NodeConfig, PrismNode};
use prism_rpc::{RpcServer, RpcState};

#[derive(Parser)]
#[command(name = "prism-daemon", about = "Lightning payment split server")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "PRISM_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Args, Default)]
struct Overrides {
    /// Directory for the snapshot file.
    #[arg(long, env = "PRISM_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Snapshot file name inside the data directory.
    #[arg(long, env = "PRISM_DB_FILE")]
    db_file: Option<String>,

    /// HTTP port.
    #[arg(long, env = "PRISM_PORT")]
    port: Option<u16>,

    /// Public domain the splits are reachable at.
    #[arg(long, env = "PRISM_DOMAIN")]
    domain: Option<String>,

    /// Nostr relays (comma-separated).
    #[arg(long, env = "PRISM_NOSTR_RELAYS", value_delimiter = ',')]
    relays: Vec<String>,

    /// Force a backend: "lnbits" or "ibex".
    #[arg(long, env = "PRISM_BACKEND", value_parser = parse_backend)]
    backend: Option<BackendKind>,

    #[arg(long, env = "PRISM_LNBITS_URL")]
    lnbits_url: Option<String>,

    #[arg(long, env = "PRISM_LNBITS_ADMIN_KEY", hide_env_values = true)]
    lnbits_admin_key: Option<String>,

    #[arg(long, env = "PRISM_IBEX_URL")]
    ibex_url: Option<String>,

    #[arg(long, env = "PRISM_IBEX_ACCOUNT_ID")]
    ibex_account_id: Option<String>,

    #[arg(long, env = "PRISM_IBEX_EMAIL")]
    ibex_email: Option<String>,

    #[arg(long, env = "PRISM_IBEX_PASSWORD", hide_env_values = true)]
    ibex_password: Option<String>,

    /// IBEX developer (refresh) token.
    #[arg(long, env = "PRISM_IBEX_REFRESH_TOKEN", hide_env_values = true)]
    ibex_refresh_token: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "PRISM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "PRISM_LOG_FORMAT")]
    log_format: Option<String>,

    /// Serve Prometheus metrics on /metrics.
    #[arg(long, env = "PRISM_ENABLE_METRICS")]
    metrics: bool,
}

#[derive(clap::Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    /// Run the node and the HTTP server (the default).
    Run,
    /// Print the effective configuration as TOML and exit.
    Config,
}

fn parse_backend(s: &str) -> Result<BackendKind, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "lnbits" => Ok(BackendKind::Lnbits),
        "ibex" => Ok(BackendKind::Ibex),
        other => Err(format!("unknown backend {other:?}, expected lnbits or ibex")),
    }
}

impl Overrides {
    fn apply(self, mut config: NodeConfig) -> NodeConfig {
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(file) = self.db_file {
            config.db_file = file;
        }
        if let Some(port) = self.port {
            config.listen_port = port;
        }
        if let Some(domain) = self.domain {
            config.public_domain = domain;
        }
        if !self.relays.is_empty() {
            config.relays = self.relays;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        config.enable_metrics |= self.metrics;

        let backend = &mut config.backend;
        if self.backend.is_some() {
            backend.kind = self.backend;
        }
        if self.lnbits_url.is_some() {
            backend.url = self.lnbits_url;
        }
        if self.lnbits_admin_key.is_some() {
            backend.admin_key = self.lnbits_admin_key;
        }
        if self.ibex_account_id.is_some() {
            backend.account_id = self.ibex_account_id;
        }
        if self.ibex_email.is_some() {
            backend.email = self.ibex_email;
        }
        if self.ibex_password.is_some() {
            backend.password = self.ibex_password;
        }
        if self.ibex_refresh_token.is_some() {
            backend.refresh_token = self.ibex_refresh_token;
        }
        // One url field serves both backends; the IBEX one only counts when
        // IBEX is the backend in use.
        if self.ibex_url.is_some() && matches!(backend.resolve_kind(), Ok(BackendKind::Ibex)) {
            backend.url = self.ibex_url;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(&path.to_string_lossy())?,
        None => NodeConfig::default(),
    };
    let config = cli.overrides.apply(base);

    match cli.command.unwrap_or(Command::Run) {
        Command::Config => {
            print!("{}", config.to_toml_string());
            Ok(())
        }
        Command::Run => run(config).await,
    }
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    init_logging(format, &config.log_level)?;
    config.validate()?;

    tracing::info!(
        domain = %config.public_domain,
        port = config.listen_port,
        db = %config.db_path().display(),
        relays = config.relays.len(),
        metrics = config.enable_metrics,
        "starting Prism daemon"
    );

    let mut node = PrismNode::new(config).await?;
    let server = RpcServer::with_state(
        node.config.listen_port,
        Arc::new(RpcState::from_node(&node)),
    );
    let server_shutdown = node.shutdown.subscribe();

    node.start().await?;
    let mut server_handle = tokio::spawn(async move { server.start(server_shutdown).await });

    let shutdown = Arc::clone(&node.shutdown);
    let server_exited = tokio::select! {
        _ = shutdown.wait_for_signal() => false,
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => tracing::warn!("HTTP server exited"),
                Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
                Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
            }
            true
        }
    };

    tracing::info!("stopping node");
    node.stop().await?;
    if !server_exited {
        if let Ok(Err(e)) = server_handle.await {
            tracing::warn!(error = %e, "HTTP server stopped with error");
        }
    }

    tracing::info!("Prism daemon exited cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(args: &[&str]) -> Overrides {
        let mut argv = vec!["prism-daemon"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().overrides
    }

    #[test]
    fn flags_override_file_config() {
        let base = NodeConfig::from_toml_str(
            r#"
                listen_port = 4000
                public_domain = "file.example.com"
                [backend]
                url = "https://lnbits.file.example.com"
                admin_key = "file-key"
            "#,
        )
        .unwrap();
        let config = overrides(&[
            "--port",
            "5000",
            "--relays",
            "wss://a.example.com,wss://b.example.com",
            "--lnbits-admin-key",
            "cli-key",
            "--metrics",
        ])
        .apply(base);

        assert_eq!(config.listen_port, 5000);
        assert_eq!(config.public_domain, "file.example.com");
        assert_eq!(config.relays.len(), 2);
        assert_eq!(config.backend.admin_key.as_deref(), Some("cli-key"));
        assert_eq!(
            config.backend.url.as_deref(),
            Some("https://lnbits.file.example.com")
        );
        assert!(config.enable_metrics);
    }

    #[test]
    fn ibex_url_applies_only_to_ibex() {
        let config = overrides(&[
            "--ibex-account-id",
            "acct",
            "--ibex-refresh-token",
            "dev",
            "--ibex-url",
            "https://ibex.example.com",
        ])
        .apply(NodeConfig::default());
        assert_eq!(config.backend.resolve_kind().unwrap(), BackendKind::Ibex);
        assert_eq!(config.backend.url.as_deref(), Some("https://ibex.example.com"));

        let config = overrides(&[
            "--lnbits-url",
            "https://lnbits.example.com",
            "--lnbits-admin-key",
            "key",
            "--ibex-url",
            "https://ibex.example.com",
        ])
        .apply(NodeConfig::default());
        assert_eq!(config.backend.url.as_deref(), Some("https://lnbits.example.com"));
    }

    #[test]
    fn subcommand_defaults_to_run() {
        let cli = Cli::try_parse_from(["prism-daemon"]).unwrap();
        assert_eq!(cli.command, None);
        let cli = Cli::try_parse_from(["prism-daemon", "config"]).unwrap();
        assert_eq!(cli.command, Some(Command::Config));
        assert!(Cli::try_parse_from(["prism-daemon", "--backend", "btcpay"]).is_err());
    }
}
