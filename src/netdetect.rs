use async_trait::async_trait;
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

use crate::error::{Result, ScanError};

/// Subnet scanned when the host's default network cannot be determined.
pub fn fallback_subnet() -> Ipv4Net {
    Ipv4Net::new(Ipv4Addr::new(192, 168, 1, 0), 24).expect("/24 is always valid")
}

/// Capability that yields the network a scan of `auto` should cover.
#[async_trait]
pub trait SubnetResolver: Send + Sync {
    /// Never fails; implementations fall back to [`fallback_subnet`].
    async fn default_subnet(&self) -> Ipv4Net;
}

/// Resolves the network of the interface carrying the default IPv4 route.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRouteResolver;

#[async_trait]
impl SubnetResolver for DefaultRouteResolver {
    async fn default_subnet(&self) -> Ipv4Net {
        match try_default_subnet().await {
            Ok(net) => net,
            Err(e) => {
                let fallback = fallback_subnet();
                tracing::warn!(error = %e, %fallback, "default subnet lookup failed");
                fallback
            }
        }
    }
}

/// Find the default-route interface and compute its network from address and netmask.
///
/// Fails when there is no default route or the route's interface has no IPv4
/// address, so callers fall back to [`fallback_subnet`].
pub async fn try_default_subnet() -> Result<Ipv4Net> {
    let iface = default_route_interface().await;
    let networks = local_ipv4_networks()?;
    choose_default_subnet(iface.as_deref(), &networks)
}

/// Network of the interface named by the default route, if it is among `networks`.
pub fn choose_default_subnet(
    route_iface: Option<&str>,
    networks: &[(String, Ipv4Net)],
) -> Result<Ipv4Net> {
    let name = route_iface
        .ok_or_else(|| ScanError::InvalidSubnet("no default IPv4 route".to_string()))?;
    networks
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, net)| *net)
        .ok_or_else(|| {
            ScanError::InvalidSubnet(format!("default route interface {name} has no IPv4 address"))
        })
}

/// Non-loopback IPv4 interfaces with the network they sit on, in OS order.
pub fn local_ipv4_networks() -> Result<Vec<(String, Ipv4Net)>> {
    let mut out = Vec::new();
    for iface in get_if_addrs()? {
        if let IfAddr::V4(v4) = &iface.addr {
            if v4.ip.is_loopback() {
                continue;
            }
            out.push((iface.name.clone(), subnet_from_netmask(v4.ip, v4.netmask)));
        }
    }
    Ok(out)
}

/// Network address (address AND mask) with prefix length = number of set mask bits.
///
/// For example `192.168.1.42` with `255.255.255.0` becomes `192.168.1.0/24`.
pub fn subnet_from_netmask(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Net {
    let ip_o = ip.octets();
    let mask_o = netmask.octets();
    let network = Ipv4Addr::new(
        ip_o[0] & mask_o[0],
        ip_o[1] & mask_o[1],
        ip_o[2] & mask_o[2],
        ip_o[3] & mask_o[3],
    );
    let prefix = mask_o.iter().map(|o| o.count_ones()).sum::<u32>() as u8;
    Ipv4Net::new(network, prefix).expect("mask has at most 32 bits")
}

async fn default_route_interface() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let table = tokio::fs::read_to_string("/proc/net/route").await.ok()?;
        parse_proc_net_route(&table)
    }

    #[cfg(target_os = "macos")]
    {
        let output = tokio::process::Command::new("route")
            .args(["-n", "get", "default"])
            .output()
            .await
            .ok()?;
        parse_route_get_default(&String::from_utf8_lossy(&output.stdout))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

/// Interface of the `00000000` destination row in `/proc/net/route`.
pub fn parse_proc_net_route(table: &str) -> Option<String> {
    table.lines().skip(1).find_map(|line| {
        let mut cols = line.split_whitespace();
        let iface = cols.next()?;
        let destination = cols.next()?;
        (destination == "00000000").then(|| iface.to_string())
    })
}

/// Interface named in `route -n get default` output.
pub fn parse_route_get_default(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("interface:"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Host addresses a sweep should probe, produced lazily.
///
/// Excludes the network and broadcast addresses unless the network is a /31
/// or /32, where every address is a host.
pub fn expand_ipv4net_hosts(net: Ipv4Net) -> impl Iterator<Item = Ipv4Addr> {
    let start = u32::from(net.network());
    let end = u32::from(net.broadcast());
    let (first, last) = if net.prefix_len() >= 31 {
        (start, end)
    } else {
        (start + 1, end - 1)
    };
    (first..=last).map(Ipv4Addr::from)
}
