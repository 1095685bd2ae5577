//! Shared device inventory: every device ever discovered, keyed by IP, plus the
//! scan-in-progress flag.
//!
//! One mutex guards both. It is only held to flip the flag, to merge a single
//! device, or to copy a snapshot; never across network I/O.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use time::OffsetDateTime;

use crate::types::{Device, InventorySnapshot};

#[derive(Debug, Default)]
struct InventoryState {
    /// Insertion order is kept for stable exports.
    devices: Vec<Device>,
    /// Position of each IP in `devices`.
    index: HashMap<Ipv4Addr, usize>,
    scanning: bool,
}

/// Cheap-to-clone handle to the shared inventory.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    inner: Arc<Mutex<InventoryState>>,
}

/// Whether a merge added a device or overwrote a known one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InventoryState> {
        // Critical sections leave the state consistent, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically claim the single scan slot.
    ///
    /// Returns `None` when a scan is already running. The flag is cleared when
    /// the returned guard is dropped, including during a panic unwind.
    pub fn try_begin_scan(&self) -> Option<ScanGuard> {
        let mut state = self.lock();
        if state.scanning {
            return None;
        }
        state.scanning = true;
        Some(ScanGuard {
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn is_scan_running(&self) -> bool {
        self.lock().scanning
    }

    /// Insert or fully overwrite the device with the same IP.
    ///
    /// An existing entry keeps its position. `last_seen` is stamped with the
    /// time of this merge.
    pub fn merge(&self, mut device: Device) -> MergeOutcome {
        let mut state = self.lock();
        device.last_seen = OffsetDateTime::now_utc();

        if let Some(&pos) = state.index.get(&device.ip) {
            state.devices[pos] = device;
            return MergeOutcome::Updated;
        }

        let pos = state.devices.len();
        state.index.insert(device.ip, pos);
        state.devices.push(device);
        MergeOutcome::Inserted
    }

    /// Independent copy of the current devices and flag.
    pub fn snapshot(&self) -> InventorySnapshot {
        let state = self.lock();
        InventorySnapshot {
            devices: state.devices.clone(),
            total_devices: state.devices.len(),
            is_scanning: state.scanning,
            last_update: OffsetDateTime::now_utc(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Proof of holding the scan slot. Dropping it marks the inventory idle.
#[derive(Debug)]
pub struct ScanGuard {
    inner: Arc<Mutex<InventoryState>>,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.scanning = false;
    }
}
