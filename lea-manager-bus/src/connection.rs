//! The bus boundary trait and its zbus backend
//!
//! [`Bus`] is everything the manager core may ask of the wire. Blocking
//! operations run on the caller's thread; fire-and-forget operations return
//! immediately and deliver a [`BusEvent::CallCompleted`] into the worker
//! queue when the daemon answers, preserving per-object call order.
//!
//! [`ZbusBus`] is the production implementation: it owns a single-worker
//! tokio runtime, the system-bus connection, and one signal pump task per
//! subscription. The pump set mirrors the daemon-side contract: adapter /
//! device / transport / player `PropertiesChanged`, ObjectManager
//! `InterfacesAdded`/`InterfacesRemoved`, and the vendor device
//! `Connected`/`Disconnected` signals.

use std::collections::HashMap;
use std::future::Future;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use futures::StreamExt;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::MatchRule;

use crate::advertisement::Advertisement;
use crate::agent::Agent;
use crate::decode::{
    decode_device_properties, decode_interface, decode_interfaces, decode_managed_objects,
    RawInterfaces,
};
use crate::error::BusError;
use crate::event::{
    BusEvent, InterfaceKind, ManagedObject, PendingCall, PlayerCommand,
};
use crate::ids::{AdapterPath, DevicePath, PlayerPath, TransportPath};
use crate::proxy::{
    Adapter1Proxy, AgentManager1Proxy, Device1Proxy, LEAdvertisingManager1Proxy,
    MediaPlayer1Proxy, MediaTransport1Proxy, BLUEZ_SERVICE, INTERFACE_DEVICE,
    INTERFACE_OBJECT_MANAGER, INTERFACE_PROPERTIES, SIGNAL_DEVICE_CONNECTED,
    SIGNAL_DEVICE_DISCONNECTED, SIGNAL_INTERFACES_ADDED, SIGNAL_INTERFACES_REMOVED,
    SIGNAL_PROPERTIES_CHANGED,
};

/// Wire arguments for `SetDiscoveryFilter`. Local-only filter fields
/// (device cap, timeout) never reach the daemon and live in the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFilterArgs {
    pub rssi: i16,
    pub pattern: Option<String>,
    pub service_uuids: Vec<String>,
}

/// Blocking adapter property writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterWrite {
    Discoverable(bool),
    Connectable(bool),
    Alias(String),
}

/// Everything the synchronization engine and command surface need from the
/// wire. Implemented by [`ZbusBus`] in production and by a recording mock in
/// tests.
pub trait Bus: Send + Sync {
    /// One blocking `GetManagedObjects` snapshot.
    fn enumerate(&self) -> Result<Vec<ManagedObject>, BusError>;

    /// Asynchronous `GetAll` backfill for a lazily created device; the reply
    /// arrives as [`BusEvent::DevicePropertiesLoaded`].
    fn load_device_properties(&self, device: &DevicePath);

    fn start_discovery(&self, adapter: &AdapterPath);

    fn stop_discovery(&self, adapter: &AdapterPath);

    /// `None` clears the daemon-side filter.
    fn set_discovery_filter(&self, adapter: &AdapterPath, filter: Option<DiscoveryFilterArgs>);

    /// Asynchronous `Powered` property write.
    fn set_powered(&self, adapter: &AdapterPath, powered: bool);

    /// Blocking adapter property write.
    fn write_adapter_property(
        &self,
        adapter: &AdapterPath,
        write: AdapterWrite,
    ) -> Result<(), BusError>;

    fn connect_device(&self, device: &DevicePath);

    fn disconnect_device(&self, device: &DevicePath);

    fn connect_device_blocking(&self, device: &DevicePath) -> Result<(), BusError>;

    fn disconnect_device_blocking(&self, device: &DevicePath) -> Result<(), BusError>;

    fn remove_device(&self, adapter: &AdapterPath, device: &DevicePath);

    fn select_transport(&self, transport: &TransportPath);

    fn unselect_transport(&self, transport: &TransportPath);

    /// Blocking `Volume` property write with the raw (profile-scaled) value.
    fn set_transport_volume(&self, transport: &TransportPath, volume: u16)
        -> Result<(), BusError>;

    /// Blocking `Links` property write on `head`, linking `links` to it.
    fn link_transports(
        &self,
        head: &TransportPath,
        links: &[TransportPath],
    ) -> Result<(), BusError>;

    fn player_command(&self, player: &PlayerPath, command: PlayerCommand);

    /// Export the advertisement object and register it with the adapter's
    /// advertising manager.
    fn register_advertisement(&self, adapter: &AdapterPath, advertisement: &Advertisement);

    fn unregister_advertisement(&self, adapter: &AdapterPath, advertisement_path: &str);

    fn register_agent(&self, agent: &Agent) -> Result<(), BusError>;

    fn unregister_agent(&self, agent_path: &str) -> Result<(), BusError>;

    /// Tear down signal subscriptions and stop delivering events.
    fn shutdown(&self);
}

enum PumpKind {
    Properties(InterfaceKind),
    InterfacesAdded,
    InterfacesRemoved,
    Connected,
    Disconnected,
}

/// Production [`Bus`] backed by zbus on the system bus.
pub struct ZbusBus {
    conn: zbus::Connection,
    runtime: tokio::runtime::Runtime,
    pumps: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    events: Mutex<Option<Sender<BusEvent>>>,
}

impl ZbusBus {
    /// Connect to the system bus and start the signal pumps. Decoded signals
    /// and call completions are delivered through `events`.
    pub fn new(events: Sender<BusEvent>) -> Result<Self, BusError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("lea-bus")
            .enable_all()
            .build()
            .map_err(|e| BusError::local(e.to_string()))?;

        let conn = runtime
            .block_on(zbus::Connection::system())
            .map_err(BusError::from)?;

        let pumps = runtime
            .block_on(Self::subscribe(conn.clone(), events.clone()))
            .map_err(BusError::from)?;

        tracing::info!("connected to the system bus");

        Ok(Self {
            conn,
            runtime,
            pumps: Mutex::new(pumps),
            events: Mutex::new(Some(events)),
        })
    }

    async fn subscribe(
        conn: zbus::Connection,
        events: Sender<BusEvent>,
    ) -> zbus::Result<Vec<tokio::task::JoinHandle<()>>> {
        let mut pumps = Vec::new();
        let subscriptions = [
            (
                PumpKind::Properties(InterfaceKind::Adapter),
                properties_rule(InterfaceKind::Adapter)?,
            ),
            (
                PumpKind::Properties(InterfaceKind::Device),
                properties_rule(InterfaceKind::Device)?,
            ),
            (
                PumpKind::Properties(InterfaceKind::MediaTransport),
                properties_rule(InterfaceKind::MediaTransport)?,
            ),
            (
                PumpKind::Properties(InterfaceKind::MediaPlayer),
                properties_rule(InterfaceKind::MediaPlayer)?,
            ),
            (
                PumpKind::InterfacesAdded,
                object_manager_rule(SIGNAL_INTERFACES_ADDED)?,
            ),
            (
                PumpKind::InterfacesRemoved,
                object_manager_rule(SIGNAL_INTERFACES_REMOVED)?,
            ),
            (
                PumpKind::Connected,
                device_signal_rule(SIGNAL_DEVICE_CONNECTED)?,
            ),
            (
                PumpKind::Disconnected,
                device_signal_rule(SIGNAL_DEVICE_DISCONNECTED)?,
            ),
        ];

        for (kind, rule) in subscriptions {
            let stream = zbus::MessageStream::for_match_rule(rule, &conn, Some(64)).await?;
            pumps.push(tokio::spawn(run_pump(stream, kind, events.clone())));
        }
        Ok(pumps)
    }

    fn events(&self) -> Option<Sender<BusEvent>> {
        self.events.lock().expect("events sender lock").clone()
    }

    /// Fire an asynchronous call; the completion is reported back as a
    /// [`BusEvent::CallCompleted`] carrying `call`.
    fn spawn_call<F>(&self, call: PendingCall, fut: F)
    where
        F: Future<Output = zbus::Result<()>> + Send + 'static,
    {
        let events = self.events();
        self.runtime.spawn(async move {
            let result = fut.await.map_err(BusError::from);
            if let Err(err) = &result {
                tracing::error!("bus call {:?} failed: {}", call, err);
            }
            if let Some(events) = events {
                let _ = events.send(BusEvent::CallCompleted { call, result });
            }
        });
    }
}

fn properties_rule(interface: InterfaceKind) -> zbus::Result<MatchRule<'static>> {
    Ok(MatchRule::builder()
        .msg_type(zbus::message::Type::Signal)
        .interface(INTERFACE_PROPERTIES)?
        .member(SIGNAL_PROPERTIES_CHANGED)?
        .arg(0, interface.name())?
        .build())
}

fn object_manager_rule(member: &'static str) -> zbus::Result<MatchRule<'static>> {
    Ok(MatchRule::builder()
        .msg_type(zbus::message::Type::Signal)
        .sender(BLUEZ_SERVICE)?
        .interface(INTERFACE_OBJECT_MANAGER)?
        .member(member)?
        .build())
}

fn device_signal_rule(member: &'static str) -> zbus::Result<MatchRule<'static>> {
    Ok(MatchRule::builder()
        .msg_type(zbus::message::Type::Signal)
        .interface(INTERFACE_DEVICE)?
        .member(member)?
        .build())
}

async fn run_pump(
    mut stream: zbus::MessageStream,
    kind: PumpKind,
    events: Sender<BusEvent>,
) {
    while let Some(msg) = stream.next().await {
        let Ok(msg) = msg else {
            continue;
        };
        let path = {
            let header = msg.header();
            match header.path() {
                Some(path) => path.to_string(),
                None => continue,
            }
        };

        let event = match &kind {
            PumpKind::Properties(interface) => {
                let (iface, changed, _invalidated): (
                    String,
                    HashMap<String, OwnedValue>,
                    Vec<String>,
                ) = msg
                    .body()
                    .deserialize()
                    .expect("protocol violation: malformed PropertiesChanged payload");
                debug_assert_eq!(iface, interface.name());
                match decode_interface(&iface, changed) {
                    Some(props) => BusEvent::PropertiesChanged { path, props },
                    None => continue,
                }
            }
            PumpKind::InterfacesAdded => {
                let (object, interfaces): (OwnedObjectPath, RawInterfaces) = msg
                    .body()
                    .deserialize()
                    .expect("protocol violation: malformed InterfacesAdded payload");
                BusEvent::InterfacesAdded {
                    path: object.to_string(),
                    interfaces: decode_interfaces(interfaces),
                }
            }
            PumpKind::InterfacesRemoved => {
                let (object, interfaces): (OwnedObjectPath, Vec<String>) = msg
                    .body()
                    .deserialize()
                    .expect("protocol violation: malformed InterfacesRemoved payload");
                BusEvent::InterfacesRemoved {
                    path: object.to_string(),
                    interfaces: interfaces
                        .iter()
                        .filter_map(|name| InterfaceKind::from_name(name))
                        .collect(),
                }
            }
            PumpKind::Connected => {
                let (args,): (HashMap<String, OwnedValue>,) = msg
                    .body()
                    .deserialize()
                    .expect("protocol violation: malformed Connected payload");
                BusEvent::DeviceConnected {
                    path,
                    bearer: dict_string(&args, "bearer"),
                }
            }
            PumpKind::Disconnected => {
                let (args,): (HashMap<String, OwnedValue>,) = msg
                    .body()
                    .deserialize()
                    .expect("protocol violation: malformed Disconnected payload");
                BusEvent::DeviceDisconnected {
                    path,
                    bearer: dict_string(&args, "bearer"),
                    reason: dict_string(&args, "reason"),
                }
            }
        };

        if events.send(event).is_err() {
            break;
        }
    }
}

fn dict_string(dict: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    dict.get(key).map(|value| {
        <&str>::try_from(&**value)
            .map(str::to_owned)
            .unwrap_or_else(|_| panic!("protocol violation: '{key}' is not a string"))
    })
}

impl Bus for ZbusBus {
    fn enumerate(&self) -> Result<Vec<ManagedObject>, BusError> {
        self.runtime.block_on(async {
            let reply = self
                .conn
                .call_method(
                    Some(BLUEZ_SERVICE),
                    "/",
                    Some(INTERFACE_OBJECT_MANAGER),
                    "GetManagedObjects",
                    &(),
                )
                .await?;
            let objects: HashMap<OwnedObjectPath, RawInterfaces> = reply
                .body()
                .deserialize()
                .map_err(|e| BusError::local(e.to_string()))?;
            Ok(decode_managed_objects(objects))
        })
    }

    fn load_device_properties(&self, device: &DevicePath) {
        let conn = self.conn.clone();
        let path = device.clone();
        let events = self.events();
        self.runtime.spawn(async move {
            let reply = conn
                .call_method(
                    Some(BLUEZ_SERVICE),
                    path.as_str(),
                    Some(INTERFACE_PROPERTIES),
                    "GetAll",
                    &(INTERFACE_DEVICE,),
                )
                .await;
            match reply {
                Ok(msg) => {
                    let props: HashMap<String, OwnedValue> = msg
                        .body()
                        .deserialize()
                        .expect("protocol violation: malformed GetAll reply");
                    if let Some(events) = events {
                        let _ = events.send(BusEvent::DevicePropertiesLoaded {
                            path: path.as_str().to_owned(),
                            props: decode_device_properties(props),
                        });
                    }
                }
                Err(err) => tracing::error!("GetAll failed for '{}': {}", path, err),
            }
        });
    }

    fn start_discovery(&self, adapter: &AdapterPath) {
        let conn = self.conn.clone();
        let path = adapter.as_str().to_owned();
        self.spawn_call(PendingCall::StartDiscovery(adapter.clone()), async move {
            let proxy = Adapter1Proxy::builder(&conn).path(path)?.build().await?;
            proxy.start_discovery().await
        });
    }

    fn stop_discovery(&self, adapter: &AdapterPath) {
        let conn = self.conn.clone();
        let path = adapter.as_str().to_owned();
        self.spawn_call(PendingCall::StopDiscovery(adapter.clone()), async move {
            let proxy = Adapter1Proxy::builder(&conn).path(path)?.build().await?;
            proxy.stop_discovery().await
        });
    }

    fn set_discovery_filter(&self, adapter: &AdapterPath, filter: Option<DiscoveryFilterArgs>) {
        let conn = self.conn.clone();
        let path = adapter.as_str().to_owned();
        self.spawn_call(
            PendingCall::SetDiscoveryFilter(adapter.clone()),
            async move {
                let proxy = Adapter1Proxy::builder(&conn).path(path)?.build().await?;
                let mut dict: HashMap<&str, Value<'_>> = HashMap::new();
                if let Some(args) = &filter {
                    dict.insert("Transport", Value::from("le"));
                    dict.insert("RSSI", Value::from(args.rssi));
                    dict.insert("DuplicateData", Value::from(false));
                    dict.insert("Discoverable", Value::from(false));
                    if let Some(pattern) = &args.pattern {
                        dict.insert("Pattern", Value::from(pattern.as_str()));
                    }
                    if !args.service_uuids.is_empty() {
                        dict.insert("UUIDs", Value::from(args.service_uuids.clone()));
                    }
                }
                proxy.set_discovery_filter(dict).await
            },
        );
    }

    fn set_powered(&self, adapter: &AdapterPath, powered: bool) {
        let conn = self.conn.clone();
        let path = adapter.as_str().to_owned();
        self.spawn_call(
            PendingCall::SetPowered {
                adapter: adapter.clone(),
                powered,
            },
            async move {
                let proxy = Adapter1Proxy::builder(&conn).path(path)?.build().await?;
                proxy.set_powered(powered).await?;
                Ok(())
            },
        );
    }

    fn write_adapter_property(
        &self,
        adapter: &AdapterPath,
        write: AdapterWrite,
    ) -> Result<(), BusError> {
        self.runtime.block_on(async {
            let proxy = Adapter1Proxy::builder(&self.conn)
                .path(adapter.as_str().to_owned())?
                .build()
                .await?;
            match write {
                AdapterWrite::Discoverable(value) => proxy.set_discoverable(value).await?,
                AdapterWrite::Connectable(value) => proxy.set_connectable(value).await?,
                AdapterWrite::Alias(value) => proxy.set_alias(&value).await?,
            }
            Ok::<_, zbus::Error>(())
        })?;
        Ok(())
    }

    fn connect_device(&self, device: &DevicePath) {
        let conn = self.conn.clone();
        let path = device.as_str().to_owned();
        self.spawn_call(PendingCall::Connect(device.clone()), async move {
            let proxy = Device1Proxy::builder(&conn).path(path)?.build().await?;
            proxy.connect().await
        });
    }

    fn disconnect_device(&self, device: &DevicePath) {
        let conn = self.conn.clone();
        let path = device.as_str().to_owned();
        self.spawn_call(PendingCall::Disconnect(device.clone()), async move {
            let proxy = Device1Proxy::builder(&conn).path(path)?.build().await?;
            proxy.disconnect().await
        });
    }

    fn connect_device_blocking(&self, device: &DevicePath) -> Result<(), BusError> {
        self.runtime.block_on(async {
            let proxy = Device1Proxy::builder(&self.conn)
                .path(device.as_str().to_owned())?
                .build()
                .await?;
            proxy.connect().await
        })?;
        Ok(())
    }

    fn disconnect_device_blocking(&self, device: &DevicePath) -> Result<(), BusError> {
        self.runtime.block_on(async {
            let proxy = Device1Proxy::builder(&self.conn)
                .path(device.as_str().to_owned())?
                .build()
                .await?;
            proxy.disconnect().await
        })?;
        Ok(())
    }

    fn remove_device(&self, adapter: &AdapterPath, device: &DevicePath) {
        let conn = self.conn.clone();
        let adapter_path = adapter.as_str().to_owned();
        let device_path = device.as_str().to_owned();
        self.spawn_call(
            PendingCall::RemoveDevice {
                adapter: adapter.clone(),
                device: device.clone(),
            },
            async move {
                let proxy = Adapter1Proxy::builder(&conn)
                    .path(adapter_path)?
                    .build()
                    .await?;
                let device = ObjectPath::try_from(device_path)?;
                proxy.remove_device(&device).await
            },
        );
    }

    fn select_transport(&self, transport: &TransportPath) {
        let conn = self.conn.clone();
        let path = transport.as_str().to_owned();
        self.spawn_call(PendingCall::SelectTransport(transport.clone()), async move {
            let proxy = MediaTransport1Proxy::builder(&conn)
                .path(path)?
                .build()
                .await?;
            proxy.select().await
        });
    }

    fn unselect_transport(&self, transport: &TransportPath) {
        let conn = self.conn.clone();
        let path = transport.as_str().to_owned();
        self.spawn_call(
            PendingCall::UnselectTransport(transport.clone()),
            async move {
                let proxy = MediaTransport1Proxy::builder(&conn)
                    .path(path)?
                    .build()
                    .await?;
                proxy.unselect().await
            },
        );
    }

    fn set_transport_volume(
        &self,
        transport: &TransportPath,
        volume: u16,
    ) -> Result<(), BusError> {
        self.runtime.block_on(async {
            let proxy = MediaTransport1Proxy::builder(&self.conn)
                .path(transport.as_str().to_owned())?
                .build()
                .await?;
            proxy.set_volume(volume).await?;
            Ok::<_, zbus::Error>(())
        })?;
        Ok(())
    }

    fn link_transports(
        &self,
        head: &TransportPath,
        links: &[TransportPath],
    ) -> Result<(), BusError> {
        let linked: Result<Vec<OwnedObjectPath>, _> = links
            .iter()
            .map(|path| OwnedObjectPath::try_from(path.as_str().to_owned()))
            .collect();
        let linked = linked.map_err(|e| BusError::local(e.to_string()))?;
        self.runtime.block_on(async {
            let proxy = MediaTransport1Proxy::builder(&self.conn)
                .path(head.as_str().to_owned())?
                .build()
                .await?;
            proxy.set_links(linked).await?;
            Ok::<_, zbus::Error>(())
        })?;
        Ok(())
    }

    fn player_command(&self, player: &PlayerPath, command: PlayerCommand) {
        let conn = self.conn.clone();
        let path = player.as_str().to_owned();
        self.spawn_call(
            PendingCall::Player {
                player: player.clone(),
                command,
            },
            async move {
                let proxy = MediaPlayer1Proxy::builder(&conn).path(path)?.build().await?;
                match command {
                    PlayerCommand::Play => proxy.play().await,
                    PlayerCommand::Pause => proxy.pause().await,
                    PlayerCommand::Stop => proxy.stop().await,
                    PlayerCommand::Next => proxy.next().await,
                    PlayerCommand::Previous => proxy.previous().await,
                }
            },
        );
    }

    fn register_advertisement(&self, adapter: &AdapterPath, advertisement: &Advertisement) {
        let conn = self.conn.clone();
        let adapter_path = adapter.as_str().to_owned();
        let advertisement = advertisement.clone();
        self.spawn_call(
            PendingCall::RegisterAdvertisement(adapter.clone()),
            async move {
                let adv_path = ObjectPath::try_from(advertisement.path().to_owned())?;
                conn.object_server()
                    .at(adv_path.clone(), AdvertisementIface { advertisement })
                    .await?;
                let proxy = LEAdvertisingManager1Proxy::builder(&conn)
                    .path(adapter_path)?
                    .build()
                    .await?;
                proxy.register_advertisement(&adv_path, HashMap::new()).await
            },
        );
    }

    fn unregister_advertisement(&self, adapter: &AdapterPath, advertisement_path: &str) {
        let conn = self.conn.clone();
        let adapter_path = adapter.as_str().to_owned();
        let advertisement_path = advertisement_path.to_owned();
        self.spawn_call(
            PendingCall::UnregisterAdvertisement(adapter.clone()),
            async move {
                let adv_path = ObjectPath::try_from(advertisement_path)?;
                let proxy = LEAdvertisingManager1Proxy::builder(&conn)
                    .path(adapter_path)?
                    .build()
                    .await?;
                proxy.unregister_advertisement(&adv_path).await?;
                conn.object_server()
                    .remove::<AdvertisementIface, _>(adv_path.clone())
                    .await?;
                Ok(())
            },
        );
    }

    fn register_agent(&self, agent: &Agent) -> Result<(), BusError> {
        self.runtime.block_on(async {
            let proxy = AgentManager1Proxy::new(&self.conn).await?;
            let path = ObjectPath::try_from(agent.path().to_owned())?;
            proxy
                .register_agent(&path, agent.io_capability.as_wire())
                .await?;
            proxy.request_default_agent(&path).await?;
            Ok::<_, zbus::Error>(())
        })?;
        Ok(())
    }

    fn unregister_agent(&self, agent_path: &str) -> Result<(), BusError> {
        self.runtime.block_on(async {
            let proxy = AgentManager1Proxy::new(&self.conn).await?;
            let path = ObjectPath::try_from(agent_path.to_owned())?;
            proxy.unregister_agent(&path).await?;
            Ok::<_, zbus::Error>(())
        })?;
        Ok(())
    }

    fn shutdown(&self) {
        for pump in self.pumps.lock().expect("pump lock").drain(..) {
            pump.abort();
        }
        self.events.lock().expect("events sender lock").take();
        tracing::info!("bus signal subscriptions torn down");
    }
}

/// Server-side view of the advertisement property bag, read back by the
/// daemon over `org.bluez.LEAdvertisement1`.
struct AdvertisementIface {
    advertisement: Advertisement,
}

#[zbus::interface(name = "org.bluez.LEAdvertisement1")]
impl AdvertisementIface {
    /// Called by the daemon when the advertisement is released.
    fn release(&self) {
        tracing::debug!("advertisement '{}' released", self.advertisement.path());
    }

    #[zbus(property, name = "Type")]
    fn kind(&self) -> String {
        self.advertisement.kind.as_wire().to_owned()
    }

    #[zbus(property)]
    fn local_name(&self) -> String {
        self.advertisement.local_name.clone().unwrap_or_default()
    }

    #[zbus(property, name = "ServiceUUIDs")]
    fn service_uuids(&self) -> Vec<String> {
        self.advertisement.service_uuids.clone()
    }

    #[zbus(property)]
    fn manufacturer_data(&self) -> HashMap<u16, Vec<u8>> {
        self.advertisement.manufacturer_data.clone()
    }

    #[zbus(property)]
    fn service_data(&self) -> HashMap<String, Vec<u8>> {
        self.advertisement.service_data.clone()
    }

    #[zbus(property)]
    fn min_interval(&self) -> u32 {
        self.advertisement.min_interval.unwrap_or(100)
    }

    #[zbus(property)]
    fn max_interval(&self) -> u32 {
        self.advertisement.max_interval.unwrap_or(1000)
    }

    #[zbus(property)]
    fn appearance(&self) -> u16 {
        self.advertisement.appearance.unwrap_or(0)
    }

    #[zbus(property)]
    fn discoverable(&self) -> bool {
        self.advertisement.discoverable.unwrap_or(false)
    }

    #[zbus(property)]
    fn discoverable_timeout(&self) -> u16 {
        self.advertisement.discoverable_timeout.unwrap_or(0)
    }

    #[zbus(property)]
    fn tx_power(&self) -> i16 {
        self.advertisement.tx_power.unwrap_or(0)
    }

    #[zbus(property)]
    fn includes(&self) -> Vec<String> {
        self.advertisement.includes.clone()
    }

    #[zbus(property)]
    fn secondary_channel(&self) -> String {
        self.advertisement
            .secondary_channel
            .map(|c| c.as_wire().to_owned())
            .unwrap_or_default()
    }
}
