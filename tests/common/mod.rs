//! In-memory capabilities for driving the orchestrator without touching the network.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use tokio::sync::Notify;

use lan_inventory_rs::error::{Result, ScanError};
use lan_inventory_rs::hostname::HostnameResolver;
use lan_inventory_rs::neighbors::NeighborTable;
use lan_inventory_rs::netdetect::SubnetResolver;
use lan_inventory_rs::orchestrator::Adapters;
use lan_inventory_rs::ports::PortSpec;
use lan_inventory_rs::prober::{HostDiscovery, PortProber};
use lan_inventory_rs::types::{parse_subnets, OpenPort, ScanRequest};
use lan_inventory_rs::vendor::{DisabledVendorResolver, VendorResolver};

/// Pauses host discovery until released, so tests can observe a scan in flight.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// A pretend LAN. Every capability answers from these tables.
pub struct FakeNetwork {
    pub auto_subnet: Ipv4Net,
    pub hosts: HashMap<Ipv4Net, Vec<Ipv4Addr>>,
    pub open_ports: HashMap<Ipv4Addr, Vec<OpenPort>>,
    pub macs: HashMap<Ipv4Addr, String>,
    pub names: HashMap<Ipv4Addr, String>,
    pub vendors: HashMap<String, String>,
    pub fail_discovery: HashSet<Ipv4Net>,
    pub fail_neighbors: bool,
    pub fail_hostnames: HashSet<Ipv4Addr>,
    pub fail_ports: HashSet<Ipv4Addr>,
    pub fail_vendors: bool,
    /// Number of neighbor table reads.
    pub neighbor_calls: Arc<AtomicUsize>,
    pub panic_on_probe: bool,
    pub gate: Option<Arc<Gate>>,
}

impl Default for FakeNetwork {
    fn default() -> Self {
        Self {
            auto_subnet: net("192.168.1.0/24"),
            hosts: HashMap::new(),
            open_ports: HashMap::new(),
            macs: HashMap::new(),
            names: HashMap::new(),
            vendors: HashMap::new(),
            fail_discovery: HashSet::new(),
            fail_neighbors: false,
            fail_hostnames: HashSet::new(),
            fail_ports: HashSet::new(),
            fail_vendors: false,
            neighbor_calls: Arc::new(AtomicUsize::new(0)),
            panic_on_probe: false,
            gate: None,
        }
    }
}

impl FakeNetwork {
    pub fn with_hosts(mut self, subnet: &str, hosts: &[&str]) -> Self {
        self.hosts
            .insert(net(subnet), hosts.iter().map(|h| ip(h)).collect());
        self
    }

    pub fn adapters(self) -> Adapters {
        let fake = Arc::new(self);
        Adapters {
            subnets: fake.clone() as Arc<dyn SubnetResolver>,
            hosts: fake.clone() as Arc<dyn HostDiscovery>,
            ports: fake.clone() as Arc<dyn PortProber>,
            neighbors: fake.clone() as Arc<dyn NeighborTable>,
            hostnames: fake.clone() as Arc<dyn HostnameResolver>,
            vendors: fake as Arc<dyn VendorResolver>,
        }
    }

    /// Same network, but with the vendor database unavailable.
    pub fn adapters_without_vendor_db(self) -> Adapters {
        Adapters {
            vendors: Arc::new(DisabledVendorResolver),
            ..self.adapters()
        }
    }
}

fn failure(what: &str) -> ScanError {
    ScanError::CommandFailed {
        program: what.to_string(),
        code: 1,
        stderr: "simulated failure".to_string(),
    }
}

#[async_trait]
impl SubnetResolver for FakeNetwork {
    async fn default_subnet(&self) -> Ipv4Net {
        self.auto_subnet
    }
}

#[async_trait]
impl HostDiscovery for FakeNetwork {
    async fn discover(&self, subnet: Ipv4Net) -> Result<Vec<Ipv4Addr>> {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.fail_discovery.contains(&subnet) {
            return Err(failure("sweep"));
        }
        Ok(self.hosts.get(&subnet).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PortProber for FakeNetwork {
    async fn probe(&self, ip: Ipv4Addr, ports: &PortSpec) -> Result<Vec<OpenPort>> {
        if self.panic_on_probe {
            panic!("probe exploded for {ip}");
        }
        if self.fail_ports.contains(&ip) {
            return Err(failure("probe"));
        }
        let wanted = ports.ports();
        Ok(self
            .open_ports
            .get(&ip)
            .map(|open| {
                open.iter()
                    .filter(|p| wanted.contains(&p.port))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl NeighborTable for FakeNetwork {
    async fn entries(&self) -> Result<HashMap<Ipv4Addr, String>> {
        self.neighbor_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_neighbors {
            return Err(failure("arp"));
        }
        Ok(self.macs.clone())
    }
}

#[async_trait]
impl HostnameResolver for FakeNetwork {
    async fn resolve(&self, ip: Ipv4Addr) -> Result<Option<String>> {
        if self.fail_hostnames.contains(&ip) {
            return Err(failure("host"));
        }
        Ok(self.names.get(&ip).cloned())
    }
}

impl VendorResolver for FakeNetwork {
    fn lookup(&self, mac: &str) -> Result<Option<String>> {
        if self.fail_vendors {
            return Err(ScanError::VendorUnavailable);
        }
        Ok(self.vendors.get(mac).cloned())
    }
}

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

pub fn net(s: &str) -> Ipv4Net {
    s.parse().unwrap()
}

pub fn request(subnets: &[&str], ports: &str, resolve_hostname: bool, resolve_vendor: bool) -> ScanRequest {
    ScanRequest {
        subnets: parse_subnets(subnets).unwrap(),
        ports: PortSpec::parse(ports).unwrap(),
        resolve_hostname,
        resolve_vendor,
    }
}
