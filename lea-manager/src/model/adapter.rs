//! Local adapter entity and discovery bookkeeping

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use lea_bus::{AdapterPath, DevicePath, PowerState};

use crate::model::{ConnectionState, Device, Transport};

/// Discovery state machine positions. Transitions are strictly sequential:
/// stopped → starting → {started | stopped}, started → stopping → stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryState {
    #[default]
    Stopped,
    Starting,
    Started,
    Stopping,
}

impl DiscoveryState {
    pub fn name(&self) -> &'static str {
        match self {
            DiscoveryState::Stopped => "stopped",
            DiscoveryState::Starting => "starting",
            DiscoveryState::Started => "started",
            DiscoveryState::Stopping => "stopping",
        }
    }
}

/// Local discovery filter. The rssi floor, pattern, and allowlist are also
/// pushed to the daemon; the device cap and timeout are enforced here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoveryFilter {
    pub rssi_floor: i16,
    pub service_uuids: Vec<String>,
    /// Name or address prefix a result must carry.
    pub pattern: Option<String>,
    /// Stop after this many accepted results; 0 disables the cap.
    pub max_devices: u32,
    /// Stop after this long in `Started`; zero disables the timer.
    pub timeout: Duration,
}

/// One local controller, mirrored from `org.bluez.Adapter1`, owning its
/// devices and at most one broadcast-source transport.
#[derive(Debug, Clone)]
pub struct Adapter {
    pub path: AdapterPath,
    pub address: Option<String>,
    pub alias: Option<String>,
    pub powered: bool,
    pub discoverable: bool,
    pub connectable: bool,
    pub discovering: bool,
    pub advertising: bool,
    /// Path of the advertisement registered by `start_advertising`.
    pub advertisement_path: Option<String>,
    pub power_state: PowerState,
    pub discovery_state: DiscoveryState,
    pub discovery_filter: Option<DiscoveryFilter>,
    /// Armed only while `discovery_state == Started`.
    pub discovery_deadline: Option<Instant>,
    /// Accepted results since discovery started.
    pub discovery_devices_found: u32,
    pub devices: BTreeMap<DevicePath, Device>,
    /// The adapter-scoped local broadcast source, keyed by the broadcast
    /// announcement UUID.
    pub broadcast_source: Option<Transport>,
}

impl Adapter {
    pub fn new(path: AdapterPath) -> Self {
        tracing::debug!("create adapter '{}'", path);
        Self {
            path,
            address: None,
            alias: None,
            powered: false,
            discoverable: false,
            connectable: false,
            discovering: false,
            advertising: false,
            advertisement_path: None,
            power_state: PowerState::Off,
            discovery_state: DiscoveryState::Stopped,
            discovery_filter: None,
            discovery_deadline: None,
            discovery_devices_found: 0,
            devices: BTreeMap::new(),
            broadcast_source: None,
        }
    }

    /// Connected devices, excluding the special broadcast pseudo-device.
    pub fn connected_devices(&self) -> Vec<&Device> {
        self.devices
            .values()
            .filter(|d| d.connection_state == ConnectionState::Connected && !d.is_special())
            .collect()
    }

    /// Whether `device` passes the active discovery filter.
    pub fn matches_discovery_filter(&self, device: &Device) -> bool {
        let Some(filter) = &self.discovery_filter else {
            return true;
        };

        if device.rssi < filter.rssi_floor {
            tracing::debug!(
                "device '{}' rejected (rssi {} below floor {})",
                device.path,
                device.rssi,
                filter.rssi_floor
            );
            return false;
        }

        if let Some(pattern) = &filter.pattern {
            let name_matches = device
                .name
                .as_deref()
                .is_some_and(|name| name.starts_with(pattern.as_str()));
            let address_matches = device
                .address
                .as_deref()
                .is_some_and(|address| address.starts_with(pattern.as_str()));
            if !name_matches && !address_matches {
                tracing::debug!(
                    "device '{}' rejected (name/address does not match pattern '{}')",
                    device.path,
                    pattern
                );
                return false;
            }
        }

        if !filter.service_uuids.is_empty()
            && !filter
                .service_uuids
                .iter()
                .any(|uuid| device.has_service(uuid))
        {
            tracing::debug!("device '{}' rejected (no allowlisted service)", device.path);
            return false;
        }

        true
    }
}
