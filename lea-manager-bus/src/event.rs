//! Decoded bus events
//!
//! Everything the worker loop consumes is one of these values: object
//! lifecycle signals, property deltas, the vendor connect/disconnect
//! signals, and completions of asynchronous calls. Properties are carried
//! as exhaustive per-interface enums rather than name/variant pairs, so the
//! engine matches on types instead of strings.

use std::collections::HashMap;

use crate::error::BusError;
use crate::ids::{AdapterPath, DevicePath, PlayerPath, TransportPath};
use crate::types::{PlayerStatus, PowerState, Track, TransportQos, TransportState};

/// The BlueZ interfaces this client mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Adapter,
    Device,
    MediaTransport,
    MediaPlayer,
}

impl InterfaceKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            crate::proxy::INTERFACE_ADAPTER => Some(InterfaceKind::Adapter),
            crate::proxy::INTERFACE_DEVICE => Some(InterfaceKind::Device),
            crate::proxy::INTERFACE_MEDIA_TRANSPORT => Some(InterfaceKind::MediaTransport),
            crate::proxy::INTERFACE_MEDIA_PLAYER => Some(InterfaceKind::MediaPlayer),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InterfaceKind::Adapter => crate::proxy::INTERFACE_ADAPTER,
            InterfaceKind::Device => crate::proxy::INTERFACE_DEVICE,
            InterfaceKind::MediaTransport => crate::proxy::INTERFACE_MEDIA_TRANSPORT,
            InterfaceKind::MediaPlayer => crate::proxy::INTERFACE_MEDIA_PLAYER,
        }
    }
}

/// One decoded `org.bluez.Adapter1` property.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterProperty {
    Address(String),
    Alias(String),
    Powered(bool),
    PowerState(PowerState),
    Discoverable(bool),
    Connectable(bool),
    Discovering(bool),
}

/// One decoded `org.bluez.Device1` property.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceProperty {
    Address(String),
    AddressType(String),
    Name(String),
    Alias(String),
    Paired(bool),
    Trusted(bool),
    Connected(bool),
    Rssi(i16),
    TxPower(i16),
    Uuids(Vec<String>),
    ManufacturerData(HashMap<u16, Vec<u8>>),
    ServiceData(HashMap<String, Vec<u8>>),
}

/// One decoded `org.bluez.MediaTransport1` property.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportProperty {
    Device(String),
    Uuid(String),
    Codec(u8),
    Configuration(Vec<u8>),
    State(TransportState),
    Delay(u16),
    Volume(u16),
    Endpoint(String),
    Location(u32),
    Metadata(Vec<u8>),
    Qos(TransportQos),
    Links(Vec<String>),
}

/// One decoded `org.bluez.MediaPlayer1` property.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerProperty {
    Device(String),
    Name(String),
    Type(String),
    Status(PlayerStatus),
    Position(u32),
    Track(Track),
}

/// The decoded property set of one interface on one object.
#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceProps {
    Adapter(Vec<AdapterProperty>),
    Device(Vec<DeviceProperty>),
    Transport(Vec<TransportProperty>),
    Player(Vec<PlayerProperty>),
}

/// One object from a `GetManagedObjects` snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedObject {
    pub path: String,
    pub interfaces: Vec<InterfaceProps>,
}

/// Media player transport controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
}

impl PlayerCommand {
    pub fn method_name(&self) -> &'static str {
        match self {
            PlayerCommand::Play => "Play",
            PlayerCommand::Pause => "Pause",
            PlayerCommand::Stop => "Stop",
            PlayerCommand::Next => "Next",
            PlayerCommand::Previous => "Previous",
        }
    }
}

/// Identity of an in-flight asynchronous bus call.
///
/// Carried back with the completion so the engine can reconcile the state
/// machine the call belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCall {
    StartDiscovery(AdapterPath),
    StopDiscovery(AdapterPath),
    SetDiscoveryFilter(AdapterPath),
    SetPowered { adapter: AdapterPath, powered: bool },
    Connect(DevicePath),
    Disconnect(DevicePath),
    RemoveDevice { adapter: AdapterPath, device: DevicePath },
    RegisterAdvertisement(AdapterPath),
    UnregisterAdvertisement(AdapterPath),
    SelectTransport(TransportPath),
    UnselectTransport(TransportPath),
    Player { player: PlayerPath, command: PlayerCommand },
}

/// A decoded message delivered into the worker queue.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// ObjectManager `InterfacesAdded`.
    InterfacesAdded {
        path: String,
        interfaces: Vec<InterfaceProps>,
    },
    /// ObjectManager `InterfacesRemoved`. Only known interfaces survive decode.
    InterfacesRemoved {
        path: String,
        interfaces: Vec<InterfaceKind>,
    },
    /// Properties `PropertiesChanged` for one known interface.
    PropertiesChanged { path: String, props: InterfaceProps },
    /// Vendor `org.bluez.Device1.Connected` signal. The bearer tag is kept
    /// raw; an unknown tag is the receiver's problem to report.
    DeviceConnected {
        path: String,
        bearer: Option<String>,
    },
    /// Vendor `org.bluez.Device1.Disconnected` signal.
    DeviceDisconnected {
        path: String,
        bearer: Option<String>,
        reason: Option<String>,
    },
    /// Reply to an asynchronous `GetAll` issued for a lazily created device.
    DevicePropertiesLoaded {
        path: String,
        props: Vec<DeviceProperty>,
    },
    /// Completion of an asynchronous call, in call order per object.
    CallCompleted {
        call: PendingCall,
        result: Result<(), BusError>,
    },
}
