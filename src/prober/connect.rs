use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;

use super::{HostDiscovery, PortProber};
use crate::error::{Result, ScanError};
use crate::netdetect::expand_ipv4net_hosts;
use crate::ports::{service_name, PortSpec};
use crate::types::OpenPort;

/// Ports tried, in order, when deciding whether a host is up.
pub const SWEEP_PORTS: &[u16] = &[80, 443, 22, 445, 139, 8080, 62078];

/// Widest network the connect sweep accepts (65 534 hosts).
pub const MIN_SWEEP_PREFIX: u8 = 16;

/// TCP-connect backend that needs no external binary or raw sockets.
///
/// - Limits concurrent socket attempts using a `Semaphore`.
/// - Uses `tokio::time::timeout` to bound connect time per socket.
/// - A host counts as up when any sweep port accepts or actively refuses.
#[derive(Debug, Clone)]
pub struct ConnectProber {
    timeout: Duration,
    concurrency: usize,
}

impl ConnectProber {
    pub fn new(timeout: Duration, concurrency: usize) -> Self {
        Self {
            timeout,
            concurrency: concurrency.clamp(1, 5_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    Open,
    Refused,
    Silent,
}

async fn connect(ip: Ipv4Addr, port: u16, timeout: Duration) -> Reach {
    let addr = SocketAddr::from((ip, port));
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Reach::Open,
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Reach::Refused,
        // Unreachable, filtered, or timed out.
        _ => Reach::Silent,
    }
}

#[async_trait]
impl HostDiscovery for ConnectProber {
    async fn discover(&self, subnet: Ipv4Net) -> Result<Vec<Ipv4Addr>> {
        if subnet.prefix_len() < MIN_SWEEP_PREFIX {
            return Err(ScanError::InvalidSubnet(format!(
                "{subnet} is wider than /{MIN_SWEEP_PREFIX} for the connect backend"
            )));
        }

        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();
        let mut up = Vec::new();

        for ip in expand_ipv4net_hosts(subnet) {
            let permit = sem
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            let timeout = self.timeout;
            set.spawn(async move {
                let _permit = permit;
                for &port in SWEEP_PORTS {
                    if connect(ip, port, timeout).await != Reach::Silent {
                        return Some(ip);
                    }
                }
                None
            });
            while let Some(res) = set.try_join_next() {
                if let Ok(Some(ip)) = res {
                    up.push(ip);
                }
            }
        }

        while let Some(res) = set.join_next().await {
            if let Ok(Some(ip)) = res {
                up.push(ip);
            }
        }
        up.sort();
        Ok(up)
    }
}

#[async_trait]
impl PortProber for ConnectProber {
    async fn probe(&self, ip: Ipv4Addr, ports: &PortSpec) -> Result<Vec<OpenPort>> {
        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for port in ports.ports() {
            let permit = sem
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            let timeout = self.timeout;
            set.spawn(async move {
                let _permit = permit;
                (connect(ip, port, timeout).await == Reach::Open).then_some(port)
            });
        }

        let mut open = Vec::new();
        while let Some(res) = set.join_next().await {
            if let Ok(Some(port)) = res {
                open.push(OpenPort::new(port, service_name(port).unwrap_or_default()));
            }
        }
        open.sort_by_key(|p| p.port);
        Ok(open)
    }
}
