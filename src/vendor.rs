//! MAC OUI (Organizationally Unique Identifier) vendor lookup.

use std::sync::Arc;

use crate::error::{Result, ScanError};
use crate::neighbors::normalize_mac;

/// Vendor string recorded when the lookup is unavailable or finds nothing.
pub const UNKNOWN_VENDOR: &str = "Unknown";

/// Capability mapping a hardware address to its manufacturer.
///
/// `Ok(None)` means the address prefix is not registered.
pub trait VendorResolver: Send + Sync {
    fn lookup(&self, mac: &str) -> Result<Option<String>>;
}

/// Lookups against the IEEE OUI registry compiled into the binary.
#[derive(Debug, Clone, Copy)]
pub struct OuiVendorResolver {
    _private: (),
}

/// Prefix registered to Cisco since the first registry edition.
const PROBE_MAC: &str = "00:00:0C:00:00:00";

impl OuiVendorResolver {
    /// Verify the registry answers a known prefix before handing out a resolver.
    pub fn load() -> Result<Self> {
        match oui_data::lookup(PROBE_MAC) {
            Some(_) => Ok(Self { _private: () }),
            None => Err(ScanError::VendorUnavailable),
        }
    }
}

impl VendorResolver for OuiVendorResolver {
    fn lookup(&self, mac: &str) -> Result<Option<String>> {
        let Some(normalized) = normalize_mac(mac) else {
            return Ok(None);
        };
        let vendor = oui_data::lookup(&normalized).map(|record| record.organization().to_string());
        tracing::debug!(mac = %normalized, vendor = ?vendor, "OUI lookup");
        Ok(vendor)
    }
}

/// Degraded mode: every lookup reports the database as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledVendorResolver;

impl VendorResolver for DisabledVendorResolver {
    fn lookup(&self, _mac: &str) -> Result<Option<String>> {
        Err(ScanError::VendorUnavailable)
    }
}

/// Build the vendor capability for this process.
///
/// Falls back to [`DisabledVendorResolver`] when lookups are switched off or the
/// registry fails its start-up check; scans keep running and report `Unknown`.
pub fn vendor_resolver(enabled: bool) -> Arc<dyn VendorResolver> {
    if !enabled {
        tracing::info!("MAC vendor lookup disabled by configuration");
        return Arc::new(DisabledVendorResolver);
    }
    match OuiVendorResolver::load() {
        Ok(resolver) => {
            tracing::info!("MAC vendor lookup initialized");
            Arc::new(resolver)
        }
        Err(e) => {
            tracing::warn!(error = %e, "MAC vendor lookup disabled");
            Arc::new(DisabledVendorResolver)
        }
    }
}
