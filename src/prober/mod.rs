//! Host sweep and port probe capabilities.
//!
//! Two backends implement both traits: [`nmap::NmapProber`] drives the nmap
//! binary, [`connect::ConnectProber`] uses plain TCP connects from this process.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use ipnet::Ipv4Net;

use crate::error::Result;
use crate::ports::PortSpec;
use crate::types::OpenPort;

pub mod connect;
pub mod nmap;
pub mod nmap_xml;

/// Finds the hosts of a subnet that respond.
#[async_trait]
pub trait HostDiscovery: Send + Sync {
    /// Addresses reported up, in the order the backend reports them.
    async fn discover(&self, subnet: Ipv4Net) -> Result<Vec<Ipv4Addr>>;
}

/// Probes a single host for open TCP ports.
#[async_trait]
pub trait PortProber: Send + Sync {
    /// Only ports observed open are returned.
    async fn probe(&self, ip: Ipv4Addr, ports: &PortSpec) -> Result<Vec<OpenPort>>;
}
