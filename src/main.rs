use std::fs::File;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use lan_inventory_rs::config::{parse_env_flag, AppConfig, Backend, ProbeSettings, ServerSettings};
use lan_inventory_rs::inventory::Inventory;
use lan_inventory_rs::orchestrator::{Orchestrator, DEFAULT_HOST_CONCURRENCY};
use lan_inventory_rs::ports::{PortSpec, DEFAULT_PORT_SPEC};
use lan_inventory_rs::prober::nmap::NmapProber;
use lan_inventory_rs::server::{self, AppState};
use lan_inventory_rs::types::{parse_subnets, InventorySnapshot, SubnetTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// lan-inventory-rs: discovers devices on the local network and keeps a merged
/// inventory available over HTTP.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "lan-inventory-rs",
    version,
    about = "Discovers devices on the local network and keeps a merged inventory available over HTTP.",
    long_about = None
)]
struct Cli {
    /// Default subnets: `auto`, CIDRs or addresses, comma-separated.
    #[arg(long, env = "SUBNET", default_value = "auto", value_delimiter = ',')]
    subnet: Vec<String>,

    /// Default ports to probe, e.g. `22,80,8000-8010`. Empty disables port probing.
    #[arg(long, env = "PORTS_TO_SCAN", default_value = DEFAULT_PORT_SPEC)]
    ports: String,

    /// Seconds between scans, reported by /api/status (no scans are scheduled).
    #[arg(long = "scan-interval", env = "SCAN_INTERVAL", default_value_t = 300)]
    scan_interval: u64,

    /// Look up hardware vendors from MAC addresses (`true` enables).
    #[arg(long = "enable-mac-vendor", env = "ENABLE_MAC_VENDOR", default_value = "true",
          value_parser = parse_env_flag, action = ArgAction::Set)]
    enable_mac_vendor: bool,

    /// Reverse-resolve hostnames (`true` enables).
    #[arg(long = "enable-hostname-lookup", env = "ENABLE_HOSTNAME_LOOKUP", default_value = "true",
          value_parser = parse_env_flag, action = ArgAction::Set)]
    enable_hostname: bool,

    /// HTTP listen port.
    #[arg(long = "web-port", env = "WEB_PORT", default_value_t = 8099)]
    web_port: u16,

    /// HTTP listen address.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Directory with the static web UI.
    #[arg(long = "web-root", env = "WEB_ROOT", default_value = "web")]
    web_root: PathBuf,

    /// Probe backend.
    #[arg(long, env = "SCAN_BACKEND", value_enum, default_value_t = Backend::Nmap)]
    backend: Backend,

    /// Path to the nmap binary.
    #[arg(long = "nmap-path", env = "NMAP_PATH", default_value = "nmap")]
    nmap_path: String,

    /// Upper bound for probing one host, in seconds.
    #[arg(long = "host-timeout-secs", env = "HOST_TIMEOUT_SECS", default_value_t = 30)]
    host_timeout_secs: u64,

    /// Upper bound for sweeping one subnet, in seconds.
    #[arg(long = "sweep-timeout-secs", env = "SWEEP_TIMEOUT_SECS", default_value_t = 300)]
    sweep_timeout_secs: u64,

    /// Socket connect timeout in milliseconds (connect backend).
    #[arg(long = "timeout-ms", env = "CONNECT_TIMEOUT_MS", default_value_t = 400)]
    timeout_ms: u64,

    /// Max concurrent TCP connect attempts (connect backend).
    #[arg(long, env = "CONNECT_CONCURRENCY", default_value_t = 1000)]
    concurrency: usize,

    /// Hosts of one subnet scanned at the same time.
    #[arg(long = "host-concurrency", env = "HOST_CONCURRENCY", default_value_t = DEFAULT_HOST_CONCURRENCY)]
    host_concurrency: usize,

    /// Log output format.
    #[arg(long = "log-format", env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Run one scan with the configured defaults, print the inventory as JSON, and exit.
    #[arg(long, default_value_t = false)]
    once: bool,

    /// With --once, write the JSON to this path instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn app_config(&self) -> Result<AppConfig> {
        let mut default_subnets =
            parse_subnets(&self.subnet).context("invalid default subnet (SUBNET)")?;
        if default_subnets.is_empty() {
            default_subnets.push(SubnetTarget::Auto);
        }
        let ports = PortSpec::parse(&self.ports).context("invalid port list (PORTS_TO_SCAN)")?;
        Ok(AppConfig {
            default_subnets,
            ports,
            ports_text: self.ports.clone(),
            scan_interval_secs: self.scan_interval,
            enable_mac_vendor: self.enable_mac_vendor,
            enable_hostname: self.enable_hostname,
        })
    }

    fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            backend: self.backend,
            nmap_path: self.nmap_path.clone(),
            host_timeout: Duration::from_secs(self.host_timeout_secs),
            sweep_timeout: Duration::from_secs(self.sweep_timeout_secs),
            connect_timeout: Duration::from_millis(self.timeout_ms),
            connect_concurrency: self.concurrency,
        }
    }

    fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            bind: self.bind,
            port: self.web_port,
            web_root: self.web_root.clone(),
        }
    }
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => fmt().with_env_filter(filter).init(),
        LogFormat::Json => fmt().with_env_filter(filter).json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = cli.app_config()?;
    let probe = cli.probe_settings();
    let web = cli.server_settings();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        web_port = web.port,
        subnets = ?config.default_subnets.iter().map(ToString::to_string).collect::<Vec<_>>(),
        ports = %config.ports,
        mac_vendor = config.enable_mac_vendor,
        hostname_lookup = config.enable_hostname,
        backend = ?probe.backend,
        "lan-inventory-rs configuration"
    );

    if probe.backend == Backend::Nmap {
        let nmap = NmapProber::new(&probe.nmap_path, probe.host_timeout, probe.sweep_timeout);
        match nmap.verify_installation().await {
            Ok(version) => tracing::info!(nmap_version = %version.trim(), "nmap verified"),
            Err(e) => tracing::warn!(error = %e, "nmap unavailable; sweeps will find no hosts"),
        }
    }

    let orchestrator = Arc::new(
        Orchestrator::new(Inventory::new(), probe.adapters(config.enable_mac_vendor))
            .with_host_concurrency(cli.host_concurrency),
    );
    let cancel = orchestrator.cancellation_token();

    if cli.once {
        let ctrl_c_cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            ctrl_c_cancel.cancel();
        });

        orchestrator.run_scan(config.scan_request(None, None)).await?;
        let snapshot = orchestrator.snapshot();
        match cli.output.as_deref() {
            Some(path) => {
                write_snapshot_json(path, &snapshot)
                    .with_context(|| format!("failed to write JSON to {}", path.display()))?;
                tracing::info!(path = %path.display(), devices = snapshot.total_devices, "wrote inventory");
            }
            None => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        }
        return Ok(());
    }

    let state = AppState {
        orchestrator: orchestrator.clone(),
        config: Arc::new(config),
    };
    let app = server::router(state, &web.web_root);
    let addr = SocketAddr::new(web.bind, web.port);

    server::serve(addr, app, async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutting down");
        cancel.cancel();
    })
    .await
}

fn write_snapshot_json(path: &std::path::Path, snapshot: &InventorySnapshot) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}
