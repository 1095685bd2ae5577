//! IP to hardware address mapping from the operating system's neighbor (ARP) table.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

use crate::command::run_command;
use crate::error::Result;

/// Capability returning the current system-wide IP -> MAC table.
///
/// MAC values are uppercase and colon-separated.
#[async_trait]
pub trait NeighborTable: Send + Sync {
    async fn entries(&self) -> Result<HashMap<Ipv4Addr, String>>;
}

/// Reads the table through `arp -a`, falling back to `/proc/net/arp` on Linux
/// when the `arp` binary is not installed.
#[derive(Debug, Clone)]
pub struct ArpNeighborTable {
    timeout: Duration,
}

impl ArpNeighborTable {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ArpNeighborTable {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl NeighborTable for ArpNeighborTable {
    async fn entries(&self) -> Result<HashMap<Ipv4Addr, String>> {
        match run_command("arp", &["-a"], self.timeout).await {
            Ok(stdout) => Ok(parse_arp_output(&String::from_utf8_lossy(&stdout))),
            #[cfg(target_os = "linux")]
            Err(crate::error::ScanError::CommandSpawn { .. }) => {
                tracing::debug!("arp not available, reading /proc/net/arp");
                let table = tokio::fs::read_to_string("/proc/net/arp").await?;
                Ok(parse_proc_net_arp(&table))
            }
            Err(e) => Err(e),
        }
    }
}

/// Parse `arp -a` output in either known layout.
///
/// - BSD/Linux: `? (192.168.1.5) at aa:bb:cc:dd:ee:ff [ether] on eth0`
/// - Windows: `  192.168.1.5          aa-bb-cc-dd-ee-ff     dynamic`
///
/// Lines that match neither layout, and incomplete entries, are skipped.
pub fn parse_arp_output(output: &str) -> HashMap<Ipv4Addr, String> {
    let mut table = HashMap::new();
    for line in output.lines() {
        if let Some((ip, mac)) = parse_posix_line(line).or_else(|| parse_windows_line(line)) {
            table.insert(ip, mac);
        }
    }
    table
}

fn parse_posix_line(line: &str) -> Option<(Ipv4Addr, String)> {
    let open = line.find('(')?;
    let close = open + line[open..].find(')')?;
    let ip: Ipv4Addr = line[open + 1..close].parse().ok()?;
    let rest = line[close + 1..].trim_start().strip_prefix("at ")?;
    let mac = normalize_mac(rest.split_whitespace().next()?)?;
    Some((ip, mac))
}

fn parse_windows_line(line: &str) -> Option<(Ipv4Addr, String)> {
    let mut parts = line.split_whitespace();
    let ip: Ipv4Addr = parts.next()?.parse().ok()?;
    let mac = parts.next()?;
    if !mac.contains('-') {
        return None;
    }
    Some((ip, normalize_mac(mac)?))
}

/// Parse the Linux kernel table at `/proc/net/arp`.
///
/// Entries with flags `0x0` are incomplete and skipped.
pub fn parse_proc_net_arp(table: &str) -> HashMap<Ipv4Addr, String> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 || cols[2] == "0x0" {
                return None;
            }
            let ip: Ipv4Addr = cols[0].parse().ok()?;
            let mac = normalize_mac(cols[3])?;
            (mac != "00:00:00:00:00:00").then_some((ip, mac))
        })
        .collect()
}

/// Normalize a hardware address to `XX:XX:XX:XX:XX:XX`.
///
/// Accepts `:` or `-` separators and single-digit octets (`a:b:c:d:e:f`).
pub fn normalize_mac(mac: &str) -> Option<String> {
    let groups: Vec<&str> = mac.split([':', '-']).collect();
    if groups.len() != 6 {
        return None;
    }
    let mut octets = Vec::with_capacity(6);
    for g in groups {
        if g.is_empty() || g.len() > 2 || !g.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        octets.push(format!("{:0>2}", g.to_ascii_uppercase()));
    }
    Some(octets.join(":"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_line() {
        let table = parse_arp_output("? (192.168.1.5) at aa:bb:cc:dd:ee:ff [ether] on eth0\n");
        assert_eq!(
            table.get(&Ipv4Addr::new(192, 168, 1, 5)).map(String::as_str),
            Some("AA:BB:CC:DD:EE:FF")
        );
    }

    #[test]
    fn macos_short_octets_and_incomplete() {
        let output = "\
router.lan (192.168.1.1) at 0:1e:2a:b:c:d on en0 ifscope [ethernet]
? (192.168.1.9) at (incomplete) on en0 ifscope [ethernet]
";
        let table = parse_arp_output(output);
        assert_eq!(table.len(), 1);
        assert_eq!(table[&Ipv4Addr::new(192, 168, 1, 1)], "00:1E:2A:0B:0C:0D");
    }

    #[test]
    fn windows_layout() {
        let output = "
Interface: 192.168.1.20 --- 0xb
  Internet Address      Physical Address      Type
  192.168.1.1           00-11-22-33-44-55     dynamic
  192.168.1.255         ff-ff-ff-ff-ff-ff     static
";
        let table = parse_arp_output(output);
        assert_eq!(table.len(), 2);
        assert_eq!(table[&Ipv4Addr::new(192, 168, 1, 1)], "00:11:22:33:44:55");
    }

    #[test]
    fn garbage_lines_skipped() {
        let table = parse_arp_output("no entries\n(bad) at zz:zz\n\n");
        assert!(table.is_empty());
    }

    #[test]
    fn proc_net_arp() {
        let table = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.1.1      0x1         0x2         a0:b1:c2:d3:e4:f5     *        wlan0
192.168.1.77     0x1         0x0         00:00:00:00:00:00     *        wlan0
";
        let parsed = parse_proc_net_arp(table);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[&Ipv4Addr::new(192, 168, 1, 1)], "A0:B1:C2:D3:E4:F5");
    }

    #[test]
    fn normalize_rejects_bad_input() {
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee"), None);
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:fg"), None);
        assert_eq!(normalize_mac("aaa:bb:cc:dd:ee:ff"), None);
        assert_eq!(normalize_mac("aa-bb-cc-dd-ee-ff").as_deref(), Some("AA:BB:CC:DD:EE:FF"));
    }
}
