use std::fmt;
use std::str::FromStr;

use crate::error::{Result, ScanError};

/// Port list used when neither the request nor the environment supplies one.
pub const DEFAULT_PORT_SPEC: &str = "22,80,443,8123";

/// One entry of a port specification: a single port or an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortItem {
    Single(u16),
    Range(u16, u16),
}

/// A parsed TCP port specification such as `22,80,8000-8010`.
///
/// Supported syntax:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - entries separated by commas or newlines
/// - comments: everything after `#` on a line is ignored
///
/// An empty specification is valid and means "do not probe ports".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortSpec {
    items: Vec<PortItem>,
}

impl PortSpec {
    pub fn parse(s: &str) -> Result<Self> {
        let mut items = Vec::new();

        for raw_line in s.lines() {
            let line = raw_line.split('#').next().unwrap_or("");
            for token in line.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                if let Some((a, b)) = token.split_once('-') {
                    let start = parse_port_str(a.trim())?;
                    let end = parse_port_str(b.trim())?;
                    if start > end {
                        return Err(ScanError::InvalidPortSpec(format!(
                            "invalid range {start}-{end} (start > end)"
                        )));
                    }
                    let item = if start == end {
                        PortItem::Single(start)
                    } else {
                        PortItem::Range(start, end)
                    };
                    if !items.contains(&item) {
                        items.push(item);
                    }
                    continue;
                }

                let item = PortItem::Single(parse_port_str(token)?);
                if !items.contains(&item) {
                    items.push(item);
                }
            }
        }

        Ok(Self { items })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Expand into individual ports, deduplicated, in order of first appearance.
    pub fn ports(&self) -> Vec<u16> {
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for item in &self.items {
            let (start, end) = match *item {
                PortItem::Single(p) => (p, p),
                PortItem::Range(a, b) => (a, b),
            };
            for p in start..=end {
                if seen.insert(p) {
                    out.push(p);
                }
            }
        }
        out
    }
}

impl FromStr for PortSpec {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Renders the nmap `-p` form, e.g. `22,80,8000-8010`.
impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match item {
                PortItem::Single(p) => write!(f, "{p}")?,
                PortItem::Range(a, b) => write!(f, "{a}-{b}")?,
            }
        }
        Ok(())
    }
}

/// Well-known TCP service name for a port, using nmap's naming.
pub fn service_name(port: u16) -> Option<&'static str> {
    let name = match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "domain",
        80 => "http",
        110 => "pop3",
        111 => "rpcbind",
        135 => "msrpc",
        139 => "netbios-ssn",
        143 => "imap",
        443 => "https",
        445 => "microsoft-ds",
        548 => "afp",
        554 => "rtsp",
        631 => "ipp",
        993 => "imaps",
        995 => "pop3s",
        1883 => "mqtt",
        3306 => "mysql",
        3389 => "ms-wbt-server",
        5000 => "upnp",
        5432 => "postgresql",
        5900 => "vnc",
        6379 => "redis",
        8080 => "http-proxy",
        8123 => "polipo",
        8443 => "https-alt",
        9100 => "jetdirect",
        _ => return None,
    };
    Some(name)
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s
        .parse::<u32>()
        .map_err(|e| ScanError::InvalidPortSpec(format!("{s:?}: {e}")))?;
    if val == 0 || val > 65535 {
        return Err(ScanError::InvalidPortSpec(format!("port out of range: {val}")));
    }
    Ok(val as u16)
}
