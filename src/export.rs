use time::format_description::well_known::Rfc3339;

use crate::types::Device;

pub const CSV_HEADER: &str = "IP Address,Hostname,MAC Address,Vendor,Open Ports,Last Seen";

/// Render devices as CSV, one line per device, lines joined by `\n`.
///
/// Fields containing a comma or a double quote are quoted with inner quotes
/// doubled. `Open Ports` lists port numbers separated by commas.
pub fn devices_to_csv(devices: &[Device]) -> String {
    let mut lines = Vec::with_capacity(devices.len() + 1);
    lines.push(CSV_HEADER.to_string());

    for d in devices {
        let ports = d
            .ports
            .iter()
            .map(|p| p.port.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let last_seen = d.last_seen.format(&Rfc3339).unwrap_or_default();

        let fields = [
            d.ip.to_string(),
            d.hostname.clone(),
            d.mac.clone(),
            d.vendor.clone(),
            ports,
            last_seen,
        ];
        let line = fields
            .iter()
            .map(|f| csv_field(f))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }

    lines.join("\n")
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OpenPort;
    use std::net::Ipv4Addr;

    #[test]
    fn header_only_when_empty() {
        assert_eq!(devices_to_csv(&[]), CSV_HEADER);
    }

    #[test]
    fn comma_in_hostname_is_quoted_and_no_ports_is_empty() {
        let mut d = Device::online(Ipv4Addr::new(192, 168, 1, 8));
        d.hostname = "my,host".into();
        let csv = devices_to_csv(&[d]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("192.168.1.8,\"my,host\",,,,"));
    }

    #[test]
    fn ports_and_vendor_quoting() {
        let mut d = Device::online(Ipv4Addr::new(10, 0, 0, 2));
        d.mac = "00:11:22:33:44:55".into();
        d.vendor = "Acme, Inc. \"Labs\"".into();
        d.ports = vec![OpenPort::new(22, "ssh"), OpenPort::new(80, "http")];
        let csv = devices_to_csv(&[d]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with(
            "10.0.0.2,,00:11:22:33:44:55,\"Acme, Inc. \"\"Labs\"\"\",\"22,80\","
        ));
    }
}
