//! Runtime configuration, resolved once at startup.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

use crate::hostname::SystemHostnameResolver;
use crate::neighbors::ArpNeighborTable;
use crate::netdetect::DefaultRouteResolver;
use crate::orchestrator::Adapters;
use crate::ports::PortSpec;
use crate::prober::connect::ConnectProber;
use crate::prober::nmap::NmapProber;
use crate::prober::{HostDiscovery, PortProber};
use crate::types::{ScanRequest, SubnetTarget};
use crate::vendor::vendor_resolver;

/// Scan defaults applied to every request that does not override them.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub default_subnets: Vec<SubnetTarget>,
    pub ports: PortSpec,
    /// `ports` as configured, reported verbatim by `/api/status`.
    pub ports_text: String,
    /// Reported by `/api/status`; nothing schedules scans from it.
    pub scan_interval_secs: u64,
    pub enable_mac_vendor: bool,
    pub enable_hostname: bool,
}

impl AppConfig {
    /// Build a request, falling back to the configured subnets and ports.
    pub fn scan_request(
        &self,
        subnets: Option<Vec<SubnetTarget>>,
        ports: Option<PortSpec>,
    ) -> ScanRequest {
        let subnets = match subnets {
            Some(s) if !s.is_empty() => s,
            _ => self.default_subnets.clone(),
        };
        ScanRequest {
            subnets,
            ports: ports.unwrap_or_else(|| self.ports.clone()),
            resolve_hostname: self.enable_hostname,
            resolve_vendor: self.enable_mac_vendor,
        }
    }

    pub fn status_view(&self) -> ConfigView {
        ConfigView {
            scan_interval: self.scan_interval_secs,
            ports: self.ports_text.clone(),
            enable_mac_vendor: self.enable_mac_vendor,
            enable_hostname: self.enable_hostname,
        }
    }
}

/// The `config` object of `/api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub scan_interval: u64,
    pub ports: String,
    pub enable_mac_vendor: bool,
    pub enable_hostname: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Drive the nmap binary.
    Nmap,
    /// TCP connects from this process.
    Connect,
}

/// How hosts and ports are probed.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub backend: Backend,
    pub nmap_path: String,
    pub host_timeout: Duration,
    pub sweep_timeout: Duration,
    pub connect_timeout: Duration,
    pub connect_concurrency: usize,
}

impl ProbeSettings {
    /// System-backed capabilities for a real deployment.
    pub fn adapters(&self, enable_mac_vendor: bool) -> Adapters {
        let (hosts, ports) = match self.backend {
            Backend::Nmap => {
                let nmap = Arc::new(NmapProber::new(
                    &self.nmap_path,
                    self.host_timeout,
                    self.sweep_timeout,
                ));
                (nmap.clone() as Arc<dyn HostDiscovery>, nmap as Arc<dyn PortProber>)
            }
            Backend::Connect => {
                let connect = Arc::new(ConnectProber::new(
                    self.connect_timeout,
                    self.connect_concurrency,
                ));
                (connect.clone() as Arc<dyn HostDiscovery>, connect as Arc<dyn PortProber>)
            }
        };

        Adapters {
            subnets: Arc::new(DefaultRouteResolver),
            hosts,
            ports,
            neighbors: Arc::new(ArpNeighborTable::default()),
            hostnames: Arc::new(SystemHostnameResolver::default()),
            vendors: vendor_resolver(enable_mac_vendor),
        }
    }
}

/// Where the HTTP API listens and what it serves.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: IpAddr,
    pub port: u16,
    pub web_root: PathBuf,
}

/// Boolean environment flag: true only for `true` in any letter case.
pub fn parse_env_flag(s: &str) -> Result<bool, String> {
    Ok(s.trim().eq_ignore_ascii_case("true"))
}
