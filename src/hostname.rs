//! Reverse DNS hostname resolution.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

use crate::command::run_command;
use crate::error::{Result, ScanError};

/// Capability resolving an address to a host name. `Ok(None)` means no name is known.
#[async_trait]
pub trait HostnameResolver: Send + Sync {
    async fn resolve(&self, ip: Ipv4Addr) -> Result<Option<String>>;
}

/// Resolves through the system resolver: `getent hosts` first, then a PTR query with `host`.
#[derive(Debug, Clone)]
pub struct SystemHostnameResolver {
    timeout: Duration,
}

impl SystemHostnameResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemHostnameResolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl HostnameResolver for SystemHostnameResolver {
    async fn resolve(&self, ip: Ipv4Addr) -> Result<Option<String>> {
        let ip_s = ip.to_string();

        let getent = run_command("getent", &["hosts", &ip_s], self.timeout).await;
        match getent {
            Ok(stdout) => {
                if let Some(name) = parse_getent_hosts(&String::from_utf8_lossy(&stdout)) {
                    return Ok(Some(name));
                }
            }
            // exit code 2: no entry
            Err(e) => tracing::trace!(ip = %ip, error = %e, "getent lookup failed"),
        }

        match run_command("host", &[&ip_s], self.timeout).await {
            Ok(stdout) => Ok(parse_host_ptr(&String::from_utf8_lossy(&stdout))),
            // NXDOMAIN
            Err(ScanError::CommandFailed { code: 1, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// `192.168.1.10    nas.lan nas` -> `nas.lan`
pub fn parse_getent_hosts(output: &str) -> Option<String> {
    output
        .lines()
        .next()?
        .split_whitespace()
        .nth(1)
        .map(str::to_string)
}

/// `10.1.168.192.in-addr.arpa domain name pointer nas.lan.` -> `nas.lan`
pub fn parse_host_ptr(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let name = line.split("pointer").nth(1)?.trim().trim_end_matches('.');
        (!name.is_empty()).then(|| name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getent_first_name() {
        assert_eq!(
            parse_getent_hosts("192.168.1.10    nas.lan nas\n").as_deref(),
            Some("nas.lan")
        );
        assert_eq!(parse_getent_hosts(""), None);
        assert_eq!(parse_getent_hosts("192.168.1.10\n"), None);
    }

    #[test]
    fn host_pointer_record() {
        let out = "10.1.168.192.in-addr.arpa domain name pointer nas.lan.\n";
        assert_eq!(parse_host_ptr(out).as_deref(), Some("nas.lan"));
        assert_eq!(
            parse_host_ptr("Host 10.1.168.192.in-addr.arpa. not found: 3(NXDOMAIN)\n"),
            None
        );
    }
}
