//! Nmap process wrapper.
//!
//! Runs nmap as a child process via `tokio::process::Command` with `-oX -`
//! and parses the XML written to stdout.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ipnet::Ipv4Net;

use super::nmap_xml::parse_nmap_xml;
use super::{HostDiscovery, PortProber};
use crate::command::run_command;
use crate::error::Result;
use crate::ports::PortSpec;
use crate::types::OpenPort;

/// Slack on top of nmap's own `--host-timeout` before the process is killed.
const PROCESS_GRACE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct NmapProber {
    nmap_path: String,
    /// Passed to nmap as `--host-timeout`.
    host_timeout: Duration,
    /// Hard bound on one subnet sweep.
    sweep_timeout: Duration,
}

impl NmapProber {
    pub fn new(nmap_path: &str, host_timeout: Duration, sweep_timeout: Duration) -> Self {
        Self {
            nmap_path: nmap_path.to_string(),
            host_timeout,
            sweep_timeout,
        }
    }

    /// Verify nmap is installed and return its version banner.
    pub async fn verify_installation(&self) -> Result<String> {
        let stdout = run_command(&self.nmap_path, &["--version"], Duration::from_secs(10)).await?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }

    fn host_timeout_arg(&self) -> String {
        format!("{}s", self.host_timeout.as_secs().max(1))
    }
}

#[async_trait]
impl HostDiscovery for NmapProber {
    async fn discover(&self, subnet: Ipv4Net) -> Result<Vec<Ipv4Addr>> {
        let start = Instant::now();
        let target = subnet.to_string();
        let host_timeout = self.host_timeout_arg();
        let args = [
            "-sn",
            "-T4",
            "--host-timeout",
            host_timeout.as_str(),
            "-oX",
            "-",
            "--noninteractive",
            target.as_str(),
        ];

        tracing::debug!(subnet = %subnet, "starting nmap host sweep");
        let stdout = run_command(&self.nmap_path, &args, self.sweep_timeout).await?;
        let run = parse_nmap_xml(&stdout)?;

        let hosts: Vec<Ipv4Addr> = run
            .hosts
            .iter()
            .filter(|h| h.is_up())
            .filter_map(|h| h.ipv4()?.parse().ok())
            .collect();

        tracing::debug!(
            subnet = %subnet,
            hosts_up = hosts.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "nmap host sweep complete"
        );
        Ok(hosts)
    }
}

#[async_trait]
impl PortProber for NmapProber {
    async fn probe(&self, ip: Ipv4Addr, ports: &PortSpec) -> Result<Vec<OpenPort>> {
        let target = ip.to_string();
        let port_arg = ports.to_string();
        let host_timeout = self.host_timeout_arg();
        let args = [
            "-T4",
            "-p",
            port_arg.as_str(),
            "--host-timeout",
            host_timeout.as_str(),
            "-oX",
            "-",
            "--noninteractive",
            target.as_str(),
        ];

        let stdout = run_command(&self.nmap_path, &args, self.host_timeout + PROCESS_GRACE).await?;
        let run = parse_nmap_xml(&stdout)?;

        let open = run
            .hosts
            .iter()
            .filter(|h| h.ipv4() == Some(target.as_str()))
            .flat_map(|h| h.open_tcp_ports())
            .map(|(port, service)| OpenPort::new(port, service))
            .collect();
        Ok(open)
    }
}
