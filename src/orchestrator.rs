//! Scan orchestration: drives the discovery capabilities through one scan pass
//! and merges each host into the shared [`Inventory`].

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use ipnet::Ipv4Net;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ScanError};
use crate::hostname::HostnameResolver;
use crate::inventory::{Inventory, MergeOutcome, ScanGuard};
use crate::neighbors::NeighborTable;
use crate::netdetect::SubnetResolver;
use crate::prober::{HostDiscovery, PortProber};
use crate::types::{Device, InventorySnapshot, ScanRequest, SubnetTarget};
use crate::vendor::{VendorResolver, UNKNOWN_VENDOR};

/// Default number of hosts of one subnet worked on at the same time.
pub const DEFAULT_HOST_CONCURRENCY: usize = 8;

/// The discovery capabilities a scan pass is built from.
#[derive(Clone)]
pub struct Adapters {
    pub subnets: Arc<dyn SubnetResolver>,
    pub hosts: Arc<dyn HostDiscovery>,
    pub ports: Arc<dyn PortProber>,
    pub neighbors: Arc<dyn NeighborTable>,
    pub hostnames: Arc<dyn HostnameResolver>,
    pub vendors: Arc<dyn VendorResolver>,
}

/// What one scan pass did.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Subnets actually swept, with `auto` resolved.
    pub subnets: Vec<Ipv4Net>,
    pub hosts_found: usize,
    pub devices_added: usize,
    pub devices_updated: usize,
    /// Inventory size when the pass ended.
    pub total_devices: usize,
    pub duration: Duration,
    pub cancelled: bool,
}

pub struct Orchestrator {
    inventory: Inventory,
    adapters: Adapters,
    host_concurrency: usize,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(inventory: Inventory, adapters: Adapters) -> Self {
        Self {
            inventory,
            adapters,
            host_concurrency: DEFAULT_HOST_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }

    /// Hosts of one subnet processed concurrently; 1 means strictly sequential.
    pub fn with_host_concurrency(mut self, n: usize) -> Self {
        self.host_concurrency = n.max(1);
        self
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn is_scan_running(&self) -> bool {
        self.inventory.is_scan_running()
    }

    pub fn snapshot(&self) -> InventorySnapshot {
        self.inventory.snapshot()
    }

    /// Token observed between subnets and hosts. Cancelling it ends the running
    /// scan early and makes every later scan return immediately.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Claim the scan slot and run the scan as a background task.
    ///
    /// Fails with [`ScanError::AlreadyRunning`] without spawning anything when a
    /// scan is in flight. The returned handle completes when the scan ends.
    pub fn start_scan(self: &Arc<Self>, request: ScanRequest) -> Result<JoinHandle<()>> {
        let guard = self
            .inventory
            .try_begin_scan()
            .ok_or(ScanError::AlreadyRunning)?;

        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.scan(request, guard).await });

        Ok(tokio::spawn(async move {
            match task.await {
                Ok(_) => {}
                Err(e) if e.is_panic() => {
                    tracing::error!(error = ?e, "scan task panicked; inventory left as merged so far");
                }
                Err(e) => tracing::warn!(error = %e, "scan task aborted"),
            }
        }))
    }

    /// Claim the scan slot and run the scan on the current task.
    pub async fn run_scan(&self, request: ScanRequest) -> Result<ScanSummary> {
        let guard = self
            .inventory
            .try_begin_scan()
            .ok_or(ScanError::AlreadyRunning)?;
        Ok(self.scan(request, guard).await)
    }

    /// One full scan pass. Subnets are processed strictly in request order.
    ///
    /// Holding `guard` is what keeps the inventory flagged as scanning; it is
    /// released when this future completes or is dropped.
    async fn scan(&self, request: ScanRequest, guard: ScanGuard) -> ScanSummary {
        let _guard = guard;
        let start = Instant::now();
        let mut summary = ScanSummary::default();

        tracing::info!(
            subnets = ?request.subnets.iter().map(ToString::to_string).collect::<Vec<_>>(),
            ports = %request.ports,
            hostnames = request.resolve_hostname,
            vendors = request.resolve_vendor,
            "starting network scan"
        );

        for target in &request.subnets {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            self.scan_subnet(*target, &request, &mut summary).await;
        }

        summary.total_devices = self.inventory.len();
        summary.duration = start.elapsed();
        tracing::info!(
            hosts_found = summary.hosts_found,
            added = summary.devices_added,
            updated = summary.devices_updated,
            total_devices = summary.total_devices,
            cancelled = summary.cancelled,
            duration_ms = summary.duration.as_millis() as u64,
            "scan complete"
        );
        summary
    }

    async fn scan_subnet(&self, target: SubnetTarget, request: &ScanRequest, summary: &mut ScanSummary) {
        let subnet = match target {
            SubnetTarget::Auto => self.adapters.subnets.default_subnet().await,
            SubnetTarget::Net(net) => net,
        };
        summary.subnets.push(subnet);

        let hosts = match self.adapters.hosts.discover(subnet).await {
            Ok(hosts) => hosts,
            Err(e) => {
                tracing::warn!(subnet = %subnet, error = %e, "host discovery failed; no hosts this pass");
                Vec::new()
            }
        };
        tracing::info!(subnet = %subnet, live_hosts = hosts.len(), "host discovery complete");
        summary.hosts_found += hosts.len();

        // One system-wide table per subnet pass.
        let neighbors = match self.adapters.neighbors.entries().await {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(error = %e, "neighbor table unavailable; MAC addresses left empty");
                HashMap::new()
            }
        };

        let total = hosts.len();
        let mut devices = stream::iter(hosts)
            .map(|ip| self.scan_host(ip, &neighbors, request))
            .buffered(self.host_concurrency);

        let mut done = 0usize;
        while let Some(device) = devices.next().await {
            done += 1;
            tracing::debug!(ip = %device.ip, progress = %format!("{done}/{total}"), "host scanned");
            match self.inventory.merge(device) {
                MergeOutcome::Inserted => summary.devices_added += 1,
                MergeOutcome::Updated => summary.devices_updated += 1,
            }
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
        }
    }

    /// Build the device record for one live host. Every capability failure is
    /// degraded here and never escapes.
    async fn scan_host(
        &self,
        ip: Ipv4Addr,
        neighbors: &HashMap<Ipv4Addr, String>,
        request: &ScanRequest,
    ) -> Device {
        let mut device = Device::online(ip);

        if request.resolve_hostname {
            device.hostname = match self.adapters.hostnames.resolve(ip).await {
                Ok(name) => name.unwrap_or_default(),
                Err(e) => {
                    tracing::debug!(ip = %ip, error = %e, "hostname lookup failed");
                    String::new()
                }
            };
        }

        if let Some(mac) = neighbors.get(&ip) {
            device.mac = mac.clone();
            if request.resolve_vendor && !device.mac.is_empty() {
                device.vendor = match self.adapters.vendors.lookup(&device.mac) {
                    Ok(Some(vendor)) => vendor,
                    Ok(None) => UNKNOWN_VENDOR.to_string(),
                    Err(e) => {
                        tracing::debug!(mac = %device.mac, error = %e, "vendor lookup failed");
                        UNKNOWN_VENDOR.to_string()
                    }
                };
            }
        }

        if !request.ports.is_empty() {
            device.ports = match self.adapters.ports.probe(ip, &request.ports).await {
                Ok(ports) => ports,
                Err(e) => {
                    tracing::warn!(ip = %ip, error = %e, "port probe failed");
                    Vec::new()
                }
            };
        }

        device
    }
}
