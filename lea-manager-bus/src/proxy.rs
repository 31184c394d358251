//! D-Bus proxy trait definitions for the BlueZ interfaces
//!
//! These traits feed the zbus `#[proxy]` macro, which generates async proxy
//! types for talking to the BlueZ daemon on the **system** bus. Interface,
//! method, and property names are part of the wire contract and must match
//! the daemon exactly.
//!
//! Signals are not declared here: all signal traffic is consumed through
//! match rules on the connection (see [`crate::connection`]), so that the
//! vendor `Connected`/`Disconnected` device signals and the arg0-filtered
//! `PropertiesChanged` subscriptions go through one mechanism.

use std::collections::HashMap;

use zbus::proxy;
use zbus::zvariant::{ObjectPath, Value};

/// Well-known name of the BlueZ daemon.
pub const BLUEZ_SERVICE: &str = "org.bluez";

pub const INTERFACE_ADAPTER: &str = "org.bluez.Adapter1";
pub const INTERFACE_DEVICE: &str = "org.bluez.Device1";
pub const INTERFACE_MEDIA_TRANSPORT: &str = "org.bluez.MediaTransport1";
pub const INTERFACE_MEDIA_PLAYER: &str = "org.bluez.MediaPlayer1";
pub const INTERFACE_PROPERTIES: &str = "org.freedesktop.DBus.Properties";
pub const INTERFACE_OBJECT_MANAGER: &str = "org.freedesktop.DBus.ObjectManager";

pub const SIGNAL_PROPERTIES_CHANGED: &str = "PropertiesChanged";
pub const SIGNAL_INTERFACES_ADDED: &str = "InterfacesAdded";
pub const SIGNAL_INTERFACES_REMOVED: &str = "InterfacesRemoved";
pub const SIGNAL_DEVICE_CONNECTED: &str = "Connected";
pub const SIGNAL_DEVICE_DISCONNECTED: &str = "Disconnected";

/// Proxy for `org.bluez.Adapter1`, a local controller such as `hci0`.
#[proxy(interface = "org.bluez.Adapter1", default_service = "org.bluez")]
pub trait Adapter1 {
    /// Start scanning for nearby devices.
    fn start_discovery(&self) -> zbus::Result<()>;

    /// Stop an ongoing discovery session.
    fn stop_discovery(&self) -> zbus::Result<()>;

    /// Narrow what `StartDiscovery` reports. An empty dict clears the filter.
    fn set_discovery_filter(&self, filter: HashMap<&str, Value<'_>>) -> zbus::Result<()>;

    /// Remove a device and its pairing information from the adapter.
    fn remove_device(&self, device: &ObjectPath<'_>) -> zbus::Result<()>;

    #[zbus(property)]
    fn address(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn alias(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn powered(&self) -> zbus::Result<bool>;

    /// Request a power state change; confirmation arrives through the
    /// `PowerState` property echo.
    #[zbus(property)]
    fn set_powered(&self, powered: bool) -> zbus::Result<()>;

    /// Richer power state than `Powered`; the source of truth for the
    /// power-on/off confirmation events.
    #[zbus(property)]
    fn power_state(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn discoverable(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn set_discoverable(&self, discoverable: bool) -> zbus::Result<()>;

    #[zbus(property)]
    fn connectable(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn set_connectable(&self, connectable: bool) -> zbus::Result<()>;

    #[zbus(property)]
    fn set_alias(&self, alias: &str) -> zbus::Result<()>;

    #[zbus(property)]
    fn discovering(&self) -> zbus::Result<bool>;
}

/// Proxy for `org.bluez.Device1`, a remote peer.
#[proxy(interface = "org.bluez.Device1", default_service = "org.bluez")]
pub trait Device1 {
    /// Connect all auto-connectable profiles.
    fn connect(&self) -> zbus::Result<()>;

    /// Disconnect all profiles and drop the link.
    fn disconnect(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn address(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn address_type(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn name(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn alias(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn paired(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn trusted(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn connected(&self) -> zbus::Result<bool>;

    #[zbus(property, name = "RSSI")]
    fn rssi(&self) -> zbus::Result<i16>;

    #[zbus(property, name = "TxPower")]
    fn tx_power(&self) -> zbus::Result<i16>;

    #[zbus(property, name = "UUIDs")]
    fn uuids(&self) -> zbus::Result<Vec<String>>;
}

/// Proxy for `org.bluez.MediaTransport1`, one audio data path.
#[proxy(interface = "org.bluez.MediaTransport1", default_service = "org.bluez")]
pub trait MediaTransport1 {
    /// Select a broadcast stream for reception. Only valid while idle.
    fn select(&self) -> zbus::Result<()>;

    /// Deselect an acquired broadcast stream. Only valid while active.
    fn unselect(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn device(&self) -> zbus::Result<zbus::zvariant::OwnedObjectPath>;

    #[zbus(property, name = "UUID")]
    fn uuid(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn state(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn volume(&self) -> zbus::Result<u16>;

    #[zbus(property)]
    fn set_volume(&self, volume: u16) -> zbus::Result<()>;

    /// Linked broadcast streams sharing a BIG.
    #[zbus(property)]
    fn links(&self) -> zbus::Result<Vec<zbus::zvariant::OwnedObjectPath>>;

    /// Link sibling broadcast streams to this one before selection.
    #[zbus(property)]
    fn set_links(&self, links: Vec<zbus::zvariant::OwnedObjectPath>) -> zbus::Result<()>;
}

/// Proxy for `org.bluez.MediaPlayer1`, one media-control endpoint.
#[proxy(interface = "org.bluez.MediaPlayer1", default_service = "org.bluez")]
pub trait MediaPlayer1 {
    fn play(&self) -> zbus::Result<()>;

    fn pause(&self) -> zbus::Result<()>;

    fn stop(&self) -> zbus::Result<()>;

    fn next(&self) -> zbus::Result<()>;

    fn previous(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn name(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn status(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn position(&self) -> zbus::Result<u32>;
}

/// Proxy for `org.bluez.LEAdvertisingManager1`, hosted on each adapter.
#[proxy(
    interface = "org.bluez.LEAdvertisingManager1",
    default_service = "org.bluez"
)]
pub trait LEAdvertisingManager1 {
    /// Register a local advertisement object with the daemon.
    fn register_advertisement(
        &self,
        advertisement: &ObjectPath<'_>,
        options: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<()>;

    /// Unregister a previously registered advertisement.
    fn unregister_advertisement(&self, advertisement: &ObjectPath<'_>) -> zbus::Result<()>;
}

/// Proxy for `org.bluez.AgentManager1`, hosted at `/org/bluez`.
#[proxy(
    interface = "org.bluez.AgentManager1",
    default_service = "org.bluez",
    default_path = "/org/bluez"
)]
pub trait AgentManager1 {
    /// Register a pairing agent with the given IO capability.
    fn register_agent(&self, agent: &ObjectPath<'_>, capability: &str) -> zbus::Result<()>;

    /// Make a registered agent the default agent.
    fn request_default_agent(&self, agent: &ObjectPath<'_>) -> zbus::Result<()>;

    /// Unregister a pairing agent.
    fn unregister_agent(&self, agent: &ObjectPath<'_>) -> zbus::Result<()>;
}
