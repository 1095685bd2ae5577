use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{Result, ScanError};
use crate::ports::PortSpec;

/// Port state. Only open ports are ever recorded on a device.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    Open,
}

/// One open TCP port on a device.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OpenPort {
    pub port: u16,
    pub state: PortState,
    pub service: String,
}

impl OpenPort {
    pub fn new(port: u16, service: impl Into<String>) -> Self {
        Self {
            port,
            state: PortState::Open,
            service: service.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    #[default]
    Online,
}

/// One discovered network endpoint, keyed by `ip` in the inventory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub ip: Ipv4Addr,
    pub hostname: String,
    /// Uppercase, colon-separated; empty when unknown.
    pub mac: String,
    pub vendor: String,
    pub ports: Vec<OpenPort>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub status: DeviceStatus,
}

impl Device {
    /// Fresh record for a host that just answered the sweep.
    pub fn online(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            hostname: String::new(),
            mac: String::new(),
            vendor: String::new(),
            ports: Vec::new(),
            last_seen: OffsetDateTime::now_utc(),
            status: DeviceStatus::Online,
        }
    }
}

/// Point-in-time copy of the inventory handed to readers.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InventorySnapshot {
    pub devices: Vec<Device>,
    pub total_devices: usize,
    pub is_scanning: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_update: OffsetDateTime,
}

/// A subnet entry of a scan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetTarget {
    /// Resolve the default network of this host at scan time.
    Auto,
    Net(Ipv4Net),
}

impl FromStr for SubnetTarget {
    type Err = ScanError;

    /// Accepts `auto`, an IPv4 CIDR, or a bare IPv4 address (scanned as `/32`).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        if s.contains('/') {
            let net = s
                .parse::<Ipv4Net>()
                .map_err(|e| ScanError::InvalidSubnet(format!("{s}: {e}")))?;
            return Ok(Self::Net(net.trunc()));
        }
        let ip = s
            .parse::<Ipv4Addr>()
            .map_err(|e| ScanError::InvalidSubnet(format!("{s}: {e}")))?;
        let net = Ipv4Net::new(ip, 32).map_err(|e| ScanError::InvalidSubnet(e.to_string()))?;
        Ok(Self::Net(net))
    }
}

impl fmt::Display for SubnetTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Net(net) => write!(f, "{net}"),
        }
    }
}

/// Parse a list of subnet strings, skipping blank entries.
pub fn parse_subnets<S: AsRef<str>>(raw: &[S]) -> Result<Vec<SubnetTarget>> {
    raw.iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Parameters of one scan pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub subnets: Vec<SubnetTarget>,
    /// Empty means the port probe step is skipped.
    pub ports: PortSpec,
    pub resolve_hostname: bool,
    pub resolve_vendor: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subnet_target_forms() {
        assert_eq!("auto".parse::<SubnetTarget>().unwrap(), SubnetTarget::Auto);
        assert_eq!(" AUTO ".parse::<SubnetTarget>().unwrap(), SubnetTarget::Auto);
        assert_eq!(
            "10.0.0.7/24".parse::<SubnetTarget>().unwrap().to_string(),
            "10.0.0.0/24"
        );
        assert_eq!(
            "10.0.0.7".parse::<SubnetTarget>().unwrap().to_string(),
            "10.0.0.7/32"
        );
        assert!("fe80::/64".parse::<SubnetTarget>().is_err());
        assert!("not-a-net".parse::<SubnetTarget>().is_err());
    }

    #[test]
    fn parse_subnets_skips_blank() {
        let subnets = parse_subnets(&["auto", "  ", "", "192.168.2.0/24"]).unwrap();
        assert_eq!(subnets.len(), 2);
    }

    #[test]
    fn device_json_shape() {
        let mut d = Device::online(Ipv4Addr::new(192, 168, 1, 5));
        d.ports.push(OpenPort::new(22, "ssh"));
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["ip"], "192.168.1.5");
        assert_eq!(v["status"], "online");
        assert_eq!(v["ports"][0]["state"], "open");
        assert!(v["last_seen"].as_str().unwrap().contains('T'));
    }
}
