//! Remote device entity

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Instant;

use lea_bus::{
    uuids, Address, AdapterPath, AudioLocation, Bearer, DevicePath, PlayerPath, PlayerProfile,
    TransportPath, TransportProfile,
};

use crate::model::{Player, Transport};

/// Discrete connection state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    Connecting,
    Disconnecting,
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }
}

/// Bonding progression, following the `Paired` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BondingState {
    #[default]
    None,
    Bonding,
    Bonded,
}

/// Set of bearers a dual-mode device may hold simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BearerSet(u8);

impl BearerSet {
    const LE: u8 = 1 << 0;
    const BREDR: u8 = 1 << 1;

    fn bit(bearer: Bearer) -> u8 {
        match bearer {
            Bearer::Le => Self::LE,
            Bearer::BrEdr => Self::BREDR,
        }
    }

    /// Add a bearer bit; `true` if it was newly set.
    pub fn insert(&mut self, bearer: Bearer) -> bool {
        let bit = Self::bit(bearer);
        let changed = self.0 & bit == 0;
        self.0 |= bit;
        changed
    }

    /// Clear a bearer bit; `true` if it was set.
    pub fn remove(&mut self, bearer: Bearer) -> bool {
        let bit = Self::bit(bearer);
        let changed = self.0 & bit != 0;
        self.0 &= !bit;
        changed
    }

    pub fn contains(&self, bearer: Bearer) -> bool {
        self.0 & Self::bit(bearer) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// One remote peer, mirrored from `org.bluez.Device1`, owning its media
/// transports and players.
#[derive(Debug, Clone)]
pub struct Device {
    pub path: DevicePath,
    pub adapter: AdapterPath,
    pub address: Option<String>,
    pub address_type: Option<String>,
    pub name: Option<String>,
    pub alias: Option<String>,
    pub paired: bool,
    pub trusted: bool,
    pub rssi: i16,
    pub tx_power: i16,
    pub uuids: Vec<String>,
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    pub service_data: HashMap<String, Vec<u8>>,
    pub connection_state: ConnectionState,
    pub bonding_state: BondingState,
    pub bearers: BearerSet,
    pub transports: BTreeMap<TransportPath, Transport>,
    pub players: BTreeMap<PlayerPath, Player>,
    /// Key into `transports`; cleared or reassigned whenever the referenced
    /// entity is removed.
    pub active_transport: Option<TransportPath>,
    /// Key into `players`, same discipline.
    pub active_player: Option<PlayerPath>,
    /// Debounce deadline while related broadcast transports settle.
    pub bcast_debounce_deadline: Option<Instant>,
    /// One-shot latch for the broadcast sync-up event.
    pub bcast_sync_notified: bool,
    /// Rendering location requested by the last broadcast-sync start.
    pub bcast_audio_location: Option<AudioLocation>,
}

impl Device {
    pub fn new(adapter: AdapterPath, path: DevicePath) -> Self {
        let address = path.address().map(|a| a.to_string());
        tracing::debug!("create device '{}'", path);
        Self {
            path,
            adapter,
            address,
            address_type: None,
            name: None,
            alias: None,
            paired: false,
            trusted: false,
            rssi: -255,
            tx_power: -255,
            uuids: Vec::new(),
            manufacturer_data: HashMap::new(),
            service_data: HashMap::new(),
            connection_state: ConnectionState::Disconnected,
            bonding_state: BondingState::None,
            bearers: BearerSet::default(),
            transports: BTreeMap::new(),
            players: BTreeMap::new(),
            active_transport: None,
            active_player: None,
            bcast_debounce_deadline: None,
            bcast_sync_notified: false,
            bcast_audio_location: None,
        }
    }

    pub fn with_address(adapter: AdapterPath, address: Address) -> Self {
        let path = DevicePath::for_address(&adapter, &address);
        Self::new(adapter, path)
    }

    pub fn has_service(&self, service_uuid: &str) -> bool {
        self.uuids.iter().any(|uuid| uuid == service_uuid)
    }

    /// A pseudo-device representing the local broadcast source; excluded
    /// from connected-device accounting and connect/disconnect events.
    pub fn is_special(&self) -> bool {
        self.has_service(uuids::BROADCAST_AUDIO_ANNOUNCEMENT_UUID)
    }

    /// Transports of one profile, in path order.
    pub fn transports_with_profile(&self, profile: TransportProfile) -> Vec<&Transport> {
        self.transports
            .values()
            .filter(|t| t.profile == profile)
            .collect()
    }

    /// First transport of one profile, in path order.
    pub fn find_transport(&self, profile: TransportProfile) -> Option<&Transport> {
        self.transports.values().find(|t| t.profile == profile)
    }

    /// First player of one profile, in path order.
    pub fn find_player(&self, profile: PlayerProfile) -> Option<&Player> {
        self.players.values().find(|p| p.profile == profile)
    }

    pub fn active_transport(&self) -> Option<&Transport> {
        self.active_transport
            .as_ref()
            .and_then(|path| self.transports.get(path))
    }

    pub fn active_player(&self) -> Option<&Player> {
        self.active_player
            .as_ref()
            .and_then(|path| self.players.get(path))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "device{{name='{}', address='{}', rssi={}, uuids={:?}, paired={}, path='{}'}}",
            self.name.as_deref().unwrap_or(""),
            self.address.as_deref().unwrap_or(""),
            self.rssi,
            self.uuids,
            self.paired,
            self.path
        )
    }
}
