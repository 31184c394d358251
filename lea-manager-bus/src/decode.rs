//! Wire-value decoding
//!
//! All property dictionaries coming off the bus are decoded here, exactly
//! once, into the typed enums of [`crate::event`]. Two rules apply
//! throughout:
//!
//! - An *unknown* property name is ignored. New daemon versions may add
//!   properties at any time.
//! - A *known* property whose value has the wrong shape panics. That is a
//!   protocol violation between client and daemon, not a recoverable error.

use std::collections::HashMap;

use zbus::zvariant::OwnedValue;

use crate::event::{
    AdapterProperty, DeviceProperty, InterfaceKind, InterfaceProps, ManagedObject, PlayerProperty,
    TransportProperty,
};
use crate::types::{PlayerStatus, PowerState, Track, TransportQos, TransportState};

/// Raw interface → property-dict map, as delivered by `InterfacesAdded` and
/// `GetManagedObjects`.
pub type RawInterfaces = HashMap<String, HashMap<String, OwnedValue>>;

fn cast<T>(value: OwnedValue, property: &str) -> T
where
    T: TryFrom<OwnedValue>,
{
    match T::try_from(value) {
        Ok(v) => v,
        Err(_) => panic!("protocol violation: unexpected value shape for property '{property}'"),
    }
}

fn cast_bytes_map<K>(value: OwnedValue, property: &str) -> HashMap<K, Vec<u8>>
where
    K: std::hash::Hash + Eq,
    HashMap<K, OwnedValue>: TryFrom<OwnedValue>,
{
    let raw: HashMap<K, OwnedValue> = cast(value, property);
    raw.into_iter()
        .map(|(k, v)| (k, cast::<Vec<u8>>(v, property)))
        .collect()
}

/// Decode every known interface carried by an object.
pub fn decode_interfaces(raw: RawInterfaces) -> Vec<InterfaceProps> {
    raw.into_iter()
        .filter_map(|(name, props)| decode_interface(&name, props))
        .collect()
}

/// Decode the property dict of one interface; `None` for unknown interfaces.
pub fn decode_interface(
    name: &str,
    props: HashMap<String, OwnedValue>,
) -> Option<InterfaceProps> {
    Some(match InterfaceKind::from_name(name)? {
        InterfaceKind::Adapter => InterfaceProps::Adapter(decode_adapter_properties(props)),
        InterfaceKind::Device => InterfaceProps::Device(decode_device_properties(props)),
        InterfaceKind::MediaTransport => {
            InterfaceProps::Transport(decode_transport_properties(props))
        }
        InterfaceKind::MediaPlayer => InterfaceProps::Player(decode_player_properties(props)),
    })
}

pub fn decode_adapter_properties(props: HashMap<String, OwnedValue>) -> Vec<AdapterProperty> {
    props
        .into_iter()
        .filter_map(|(name, value)| decode_adapter_property(&name, value))
        .collect()
}

pub fn decode_adapter_property(name: &str, value: OwnedValue) -> Option<AdapterProperty> {
    Some(match name {
        "Address" => AdapterProperty::Address(cast(value, name)),
        "Alias" => AdapterProperty::Alias(cast(value, name)),
        "Powered" => AdapterProperty::Powered(cast(value, name)),
        "PowerState" => {
            AdapterProperty::PowerState(PowerState::from_wire(&cast::<String>(value, name)))
        }
        "Discoverable" => AdapterProperty::Discoverable(cast(value, name)),
        "Connectable" => AdapterProperty::Connectable(cast(value, name)),
        "Discovering" => AdapterProperty::Discovering(cast(value, name)),
        _ => return None,
    })
}

pub fn decode_device_properties(props: HashMap<String, OwnedValue>) -> Vec<DeviceProperty> {
    props
        .into_iter()
        .filter_map(|(name, value)| decode_device_property(&name, value))
        .collect()
}

pub fn decode_device_property(name: &str, value: OwnedValue) -> Option<DeviceProperty> {
    Some(match name {
        "Address" => DeviceProperty::Address(cast(value, name)),
        "AddressType" => DeviceProperty::AddressType(cast(value, name)),
        "Name" => DeviceProperty::Name(cast(value, name)),
        "Alias" => DeviceProperty::Alias(cast(value, name)),
        "Paired" => DeviceProperty::Paired(cast(value, name)),
        "Trusted" => DeviceProperty::Trusted(cast(value, name)),
        "Connected" => DeviceProperty::Connected(cast(value, name)),
        "RSSI" => DeviceProperty::Rssi(cast(value, name)),
        "TxPower" => DeviceProperty::TxPower(cast(value, name)),
        "UUIDs" => DeviceProperty::Uuids(cast(value, name)),
        "ManufacturerData" => DeviceProperty::ManufacturerData(cast_bytes_map(value, name)),
        "ServiceData" => DeviceProperty::ServiceData(cast_bytes_map(value, name)),
        _ => return None,
    })
}

pub fn decode_transport_properties(props: HashMap<String, OwnedValue>) -> Vec<TransportProperty> {
    props
        .into_iter()
        .filter_map(|(name, value)| decode_transport_property(&name, value))
        .collect()
}

pub fn decode_transport_property(name: &str, value: OwnedValue) -> Option<TransportProperty> {
    Some(match name {
        "Device" => TransportProperty::Device(
            cast::<zbus::zvariant::OwnedObjectPath>(value, name).to_string(),
        ),
        "UUID" => TransportProperty::Uuid(cast(value, name)),
        "Codec" => TransportProperty::Codec(cast(value, name)),
        "Configuration" => TransportProperty::Configuration(cast(value, name)),
        "State" => {
            TransportProperty::State(TransportState::from_wire(&cast::<String>(value, name)))
        }
        "Delay" => TransportProperty::Delay(cast(value, name)),
        "Volume" => TransportProperty::Volume(cast(value, name)),
        "Endpoint" => TransportProperty::Endpoint(
            cast::<zbus::zvariant::OwnedObjectPath>(value, name).to_string(),
        ),
        "Location" => TransportProperty::Location(cast(value, name)),
        "Metadata" => TransportProperty::Metadata(cast(value, name)),
        "QoS" => TransportProperty::Qos(decode_qos(cast(value, name))),
        "Links" => TransportProperty::Links(
            cast::<Vec<zbus::zvariant::OwnedObjectPath>>(value, name)
                .into_iter()
                .map(|p| p.to_string())
                .collect(),
        ),
        _ => return None,
    })
}

fn decode_qos(dict: HashMap<String, OwnedValue>) -> TransportQos {
    let mut qos = TransportQos::default();
    for (key, value) in dict {
        match key.as_str() {
            "BIG" => qos.big = cast(value, "QoS.BIG"),
            "BIS" => qos.bis = cast(value, "QoS.BIS"),
            "SyncFactor" => qos.sync_factor = cast(value, "QoS.SyncFactor"),
            "Packing" => qos.packing = cast(value, "QoS.Packing"),
            "Framing" => qos.framing = cast(value, "QoS.Framing"),
            "Encryption" => qos.encryption = cast(value, "QoS.Encryption"),
            "BCode" => qos.bcode = cast(value, "QoS.BCode"),
            "Options" => qos.options = cast(value, "QoS.Options"),
            "Skip" => qos.skip = cast(value, "QoS.Skip"),
            "SyncTimeout" => qos.sync_timeout = cast(value, "QoS.SyncTimeout"),
            "SyncCteType" => qos.sync_cte_type = cast(value, "QoS.SyncCteType"),
            "MSE" => qos.mse = cast(value, "QoS.MSE"),
            "Timeout" => qos.timeout = cast(value, "QoS.Timeout"),
            "PASync" => qos.pa_sync = cast(value, "QoS.PASync"),
            "Interval" => qos.interval = cast(value, "QoS.Interval"),
            "Latency" => qos.latency = cast(value, "QoS.Latency"),
            "SDU" => qos.sdu = cast(value, "QoS.SDU"),
            "PHY" => qos.phy = cast(value, "QoS.PHY"),
            "Retransmissions" => qos.rtn = cast(value, "QoS.Retransmissions"),
            "PresentationDelay" => qos.presentation_delay = cast(value, "QoS.PresentationDelay"),
            _ => {}
        }
    }
    qos
}

pub fn decode_player_properties(props: HashMap<String, OwnedValue>) -> Vec<PlayerProperty> {
    props
        .into_iter()
        .filter_map(|(name, value)| decode_player_property(&name, value))
        .collect()
}

pub fn decode_player_property(name: &str, value: OwnedValue) -> Option<PlayerProperty> {
    Some(match name {
        "Device" => PlayerProperty::Device(
            cast::<zbus::zvariant::OwnedObjectPath>(value, name).to_string(),
        ),
        "Name" => PlayerProperty::Name(cast(value, name)),
        "Type" => PlayerProperty::Type(cast(value, name)),
        "Status" => {
            PlayerProperty::Status(PlayerStatus::from_wire(&cast::<String>(value, name)))
        }
        "Position" => PlayerProperty::Position(cast(value, name)),
        "Track" => PlayerProperty::Track(decode_track(cast(value, name))),
        _ => return None,
    })
}

fn decode_track(dict: HashMap<String, OwnedValue>) -> Track {
    let mut track = Track::default();
    for (key, value) in dict {
        match key.as_str() {
            "Title" => track.title = Some(cast(value, "Track.Title")),
            "Artist" => track.artist = Some(cast(value, "Track.Artist")),
            "Album" => track.album = Some(cast(value, "Track.Album")),
            "Genre" => track.genre = Some(cast(value, "Track.Genre")),
            "NumberOfTracks" => track.number_of_tracks = Some(cast(value, "Track.NumberOfTracks")),
            "TrackNumber" => track.track_number = Some(cast(value, "Track.TrackNumber")),
            "Duration" => track.duration = Some(cast(value, "Track.Duration")),
            "ImgHandle" => track.image_handle = Some(cast(value, "Track.ImgHandle")),
            _ => {}
        }
    }
    track
}

/// Decode a full `GetManagedObjects` reply into per-object interface sets.
pub fn decode_managed_objects(
    raw: HashMap<zbus::zvariant::OwnedObjectPath, RawInterfaces>,
) -> Vec<ManagedObject> {
    let mut objects: Vec<ManagedObject> = raw
        .into_iter()
        .map(|(path, interfaces)| ManagedObject {
            path: path.to_string(),
            interfaces: decode_interfaces(interfaces),
        })
        .collect();
    // Parents before children, adapters before their devices.
    objects.sort_by(|a, b| a.path.cmp(&b.path));
    objects
}
