//! Synchronization engine
//!
//! Applies decoded bus events to the entity world, runs the discovery /
//! connection / broadcast-sync state machines, recomputes active-entity
//! selection, and produces the application events each mutation warrants.
//! The engine is synchronous and clock-free: callers pass `now` in, timers
//! are plain deadlines in the world, and every mutation returns the events
//! to fan out, which the caller dispatches only after releasing the world
//! lock.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lea_bus::{
    uuids, AdapterPath, AdapterProperty, AdapterWrite, Advertisement, Bearer, Bus, BusEvent,
    DevicePath, DeviceProperty, DiscoveryFilterArgs, InterfaceKind, InterfaceProps, PendingCall,
    PlayerCommand, PlayerPath, PlayerProperty, PlayerStatus, PowerState, TransportPath,
    TransportProfile, TransportProperty, TransportState, ERROR_IN_PROGRESS,
};

use crate::error::{Error, Result, Status};
use crate::event::{BcastDiscoveryMethod, Event};
use crate::model::{
    volume_from_percentage, Adapter, ConnectionState, Device, DiscoveryFilter, DiscoveryState,
    Player, Transport,
};

/// Settle time for related broadcast transports to finish appearing before
/// a device is classified as a discovered broadcast source.
pub(crate) const BCAST_DEBOUNCE: Duration = Duration::from_millis(100);

/// An event paired with the status it is dispatched with.
pub(crate) type Emit = (Event, Status);

/// The mirrored object graph.
#[derive(Default)]
pub(crate) struct World {
    pub adapters: BTreeMap<AdapterPath, Adapter>,
}

/// Event-application and command core. All mutation of [`World`] funnels
/// through here, under the caller's lock.
pub(crate) struct Engine {
    bus: Arc<dyn Bus>,
    pub world: World,
}

impl Engine {
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self {
            bus,
            world: World::default(),
        }
    }

    /// One blocking enumeration pass. A failed bus call yields zero
    /// adapters; events produced while populating entities are not fanned
    /// out, since nothing observed the pre-enumeration state.
    pub fn initialize(&mut self, now: Instant) -> usize {
        let objects = match self.bus.enumerate() {
            Ok(objects) => objects,
            Err(err) => {
                tracing::error!("GetManagedObjects failed: {}", err);
                return 0;
            }
        };

        // Adapters first, so nested objects find their owner.
        for object in &objects {
            for interface in &object.interfaces {
                if let InterfaceProps::Adapter(props) = interface {
                    let key = AdapterPath::from(object.path.as_str());
                    let mut adapter = Adapter::new(key.clone());
                    let mut sink = Vec::new();
                    for prop in props.clone() {
                        apply_adapter_property(&mut adapter, prop, &mut sink);
                    }
                    tracing::info!("found adapter '{}'", object.path);
                    self.world.adapters.insert(key, adapter);
                }
            }
        }

        let mut sink = Vec::new();
        for object in objects {
            let path = object.path;
            for interface in object.interfaces {
                match interface {
                    InterfaceProps::Adapter(_) => {}
                    InterfaceProps::Device(props) => self.device_added(&path, props, &mut sink),
                    InterfaceProps::Transport(props) => {
                        self.transport_added(&path, props, now, &mut sink)
                    }
                    InterfaceProps::Player(props) => self.player_added(&path, props, &mut sink),
                }
            }
        }

        tracing::info!("found {} adapter(s)", self.world.adapters.len());
        self.world.adapters.len()
    }

    // ------------------------------------------------------------------
    // Bus event application
    // ------------------------------------------------------------------

    pub fn handle_event(&mut self, event: BusEvent, now: Instant) -> Vec<Emit> {
        let mut out = Vec::new();
        match event {
            BusEvent::InterfacesAdded { path, interfaces } => {
                for interface in interfaces {
                    match interface {
                        InterfaceProps::Adapter(_) => {
                            tracing::debug!("ignoring late adapter object '{}'", path);
                        }
                        InterfaceProps::Device(props) => self.device_added(&path, props, &mut out),
                        InterfaceProps::Transport(props) => {
                            self.transport_added(&path, props, now, &mut out)
                        }
                        InterfaceProps::Player(props) => self.player_added(&path, props, &mut out),
                    }
                }
            }
            BusEvent::InterfacesRemoved { path, interfaces } => {
                for kind in interfaces {
                    self.interface_removed(&path, kind, &mut out);
                }
            }
            BusEvent::PropertiesChanged { path, props } => match props {
                InterfaceProps::Adapter(props) => {
                    self.adapter_properties_changed(&path, props, &mut out)
                }
                InterfaceProps::Device(props) => {
                    self.device_properties_changed(&path, props, &mut out)
                }
                InterfaceProps::Transport(props) => {
                    self.transport_properties_changed(&path, props, &mut out)
                }
                InterfaceProps::Player(props) => {
                    self.player_properties_changed(&path, props, &mut out)
                }
            },
            BusEvent::DeviceConnected { path, bearer } => {
                self.device_connected(&path, bearer.as_deref(), &mut out)
            }
            BusEvent::DeviceDisconnected {
                path,
                bearer,
                reason,
            } => self.device_disconnected(&path, bearer.as_deref(), reason, &mut out),
            BusEvent::DevicePropertiesLoaded { path, props } => {
                self.device_properties_loaded(&path, props, &mut out)
            }
            BusEvent::CallCompleted { call, result } => {
                self.call_completed(call, result, now, &mut out)
            }
        }
        out
    }

    fn device_added(&mut self, path: &str, props: Vec<DeviceProperty>, out: &mut Vec<Emit>) {
        let Some(adapter_key) = self.adapter_key_for(path) else {
            return;
        };
        let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
        let device_key = DevicePath::from(path);
        if adapter.devices.contains_key(&device_key) {
            return;
        }

        let mut device = Device::new(adapter_key.clone(), device_key.clone());
        for prop in props {
            apply_device_property(&mut device, prop, out);
        }
        let deliver = adapter.discovery_state == DiscoveryState::Started
            && device.connection_state == ConnectionState::Disconnected;
        adapter.devices.insert(device_key.clone(), device);

        if deliver {
            self.deliver_discovery_result(&adapter_key, &device_key, out);
        }
    }

    fn transport_added(
        &mut self,
        path: &str,
        props: Vec<TransportProperty>,
        now: Instant,
        out: &mut Vec<Emit>,
    ) {
        if let Some((adapter_key, device_key)) = self.owner_device_key(path) {
            let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
            let device = adapter.devices.get_mut(&device_key).expect("device");
            let transport_key = TransportPath::from(path);
            device
                .transports
                .entry(transport_key.clone())
                .or_insert_with(|| {
                    Transport::new(Some(device_key.clone()), transport_key.clone())
                });
            apply_transport_properties(device, &transport_key, props, out);
            update_active_transport(device, out);

            if device.transports[&transport_key].profile == TransportProfile::BapBcastSink {
                // PA sync complete; wait for the sibling streams.
                tracing::debug!("broadcast transport '{}' appeared", path);
                if device.bcast_debounce_deadline.is_none() {
                    device.bcast_debounce_deadline = Some(now + BCAST_DEBOUNCE);
                }
            }
            return;
        }

        // Not under any device: adapter-scoped transports only matter when
        // they carry the broadcast-source announcement.
        let Some(adapter_key) = self.adapter_key_for(path) else {
            return;
        };
        let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
        if adapter.broadcast_source.is_some() {
            return;
        }
        let mut transport = Transport::new(None, TransportPath::from(path));
        for prop in props {
            apply_bare_transport_property(&mut transport, prop);
        }
        if transport.uuid.as_deref() == Some(uuids::BROADCAST_AUDIO_ANNOUNCEMENT_UUID) {
            tracing::info!("broadcast source transport '{}' added", path);
            adapter.broadcast_source = Some(transport);
        }
    }

    fn player_added(&mut self, path: &str, props: Vec<PlayerProperty>, out: &mut Vec<Emit>) {
        let Some((adapter_key, device_key)) = self.owner_device_key(path) else {
            return;
        };
        let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
        let device = adapter.devices.get_mut(&device_key).expect("device");
        let player_key = PlayerPath::from(path);
        tracing::debug!("media player '{}' added", path);
        device
            .players
            .entry(player_key.clone())
            .or_insert_with(|| Player::new(device_key.clone(), player_key.clone()));
        apply_player_properties(device, &player_key, props, out);
        update_active_player(device, out);
    }

    fn interface_removed(&mut self, path: &str, kind: InterfaceKind, out: &mut Vec<Emit>) {
        match kind {
            InterfaceKind::Adapter => {}
            InterfaceKind::Device => {
                let device_key = DevicePath::from(path);
                let owner = self
                    .world
                    .adapters
                    .iter()
                    .find(|(_, a)| a.devices.contains_key(&device_key))
                    .map(|(k, _)| k.clone());
                if let Some(adapter_key) = owner {
                    tracing::debug!("device '{}' removed", path);
                    out.push((
                        Event::DeviceRemoved {
                            adapter: adapter_key.clone(),
                            device: device_key.clone(),
                        },
                        Status::Success,
                    ));
                    let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
                    adapter.devices.remove(&device_key);
                }
            }
            InterfaceKind::MediaTransport => {
                let bis_owner = self
                    .world
                    .adapters
                    .iter()
                    .find(|(_, a)| {
                        a.broadcast_source
                            .as_ref()
                            .is_some_and(|t| t.path.as_str() == path)
                    })
                    .map(|(k, _)| k.clone());
                if let Some(adapter_key) = bis_owner {
                    tracing::info!("broadcast source transport '{}' removed", path);
                    let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
                    adapter.broadcast_source = None;
                    return;
                }

                let Some((adapter_key, device_key)) = self.owner_device_key(path) else {
                    return;
                };
                let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
                let device = adapter.devices.get_mut(&device_key).expect("device");
                let transport_key = TransportPath::from(path);
                let Some(removed) = device.transports.remove(&transport_key) else {
                    return;
                };
                tracing::debug!("media transport '{}' removed", path);
                update_active_transport(device, out);
                if removed.profile == TransportProfile::BapBcastSink
                    && device.find_transport(TransportProfile::BapBcastSink).is_none()
                {
                    out.push((
                        Event::BcastSyncLost {
                            device: device_key.clone(),
                        },
                        Status::Success,
                    ));
                }
            }
            InterfaceKind::MediaPlayer => {
                let Some((adapter_key, device_key)) = self.owner_device_key(path) else {
                    return;
                };
                let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
                let device = adapter.devices.get_mut(&device_key).expect("device");
                let player_key = PlayerPath::from(path);
                if device.players.remove(&player_key).is_none() {
                    return;
                }
                tracing::debug!("media player '{}' removed", path);
                update_active_player(device, out);
            }
        }
    }

    fn adapter_properties_changed(
        &mut self,
        path: &str,
        props: Vec<AdapterProperty>,
        out: &mut Vec<Emit>,
    ) {
        let Some(adapter) = self.world.adapters.get_mut(&AdapterPath::from(path)) else {
            return;
        };
        for prop in props {
            apply_adapter_property(adapter, prop, out);
        }
    }

    fn device_properties_changed(
        &mut self,
        path: &str,
        props: Vec<DeviceProperty>,
        out: &mut Vec<Emit>,
    ) {
        let device_key = DevicePath::from(path);
        let Some(adapter_key) = self.adapter_key_for(path) else {
            return;
        };
        let bus = Arc::clone(&self.bus);
        let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");

        if !adapter.devices.contains_key(&device_key) {
            tracing::warn!("property change for unseen device '{}'", path);
            adapter.devices.insert(
                device_key.clone(),
                Device::new(adapter_key.clone(), device_key.clone()),
            );
            bus.load_device_properties(&device_key);
            return;
        }

        let device = adapter.devices.get_mut(&device_key).expect("device");
        let mut is_discovery_result = false;
        for prop in props {
            is_discovery_result |= matches!(
                prop,
                DeviceProperty::Rssi(_)
                    | DeviceProperty::ManufacturerData(_)
                    | DeviceProperty::ServiceData(_)
            );
            apply_device_property(device, prop, out);
        }
        let deliver = adapter.discovery_state == DiscoveryState::Started && is_discovery_result;

        if deliver {
            self.deliver_discovery_result(&adapter_key, &device_key, out);
        }
    }

    fn transport_properties_changed(
        &mut self,
        path: &str,
        props: Vec<TransportProperty>,
        out: &mut Vec<Emit>,
    ) {
        // Adapter-scoped broadcast source first.
        let bis_owner = self
            .world
            .adapters
            .iter()
            .find(|(_, a)| {
                a.broadcast_source
                    .as_ref()
                    .is_some_and(|t| t.path.as_str() == path)
            })
            .map(|(k, _)| k.clone());
        if let Some(adapter_key) = bis_owner {
            let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
            let transport = adapter.broadcast_source.as_mut().expect("broadcast source");
            for prop in props {
                let is_state = matches!(prop, TransportProperty::State(_));
                apply_bare_transport_property(transport, prop);
                if is_state {
                    out.push((
                        Event::LocalBcastTransportStateChanged {
                            adapter: adapter_key.clone(),
                            transport: transport.path.clone(),
                            state: transport.state,
                        },
                        Status::Success,
                    ));
                }
            }
            return;
        }

        let Some((adapter_key, device_key)) = self.owner_device_key(path) else {
            return;
        };
        let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
        let device = adapter.devices.get_mut(&device_key).expect("device");
        let transport_key = TransportPath::from(path);
        let Some(old_state) = device.transports.get(&transport_key).map(|t| t.state) else {
            tracing::error!(
                "transport not found for path '{}' on device '{}'",
                path,
                device_key
            );
            return;
        };

        apply_transport_properties(device, &transport_key, props, out);

        let transport = &device.transports[&transport_key];
        if transport.state == TransportState::Active
            && old_state != TransportState::Active
            && transport.profile == TransportProfile::BapBcastSink
            && !device.bcast_sync_notified
        {
            device.bcast_sync_notified = true;
            out.push((
                Event::BcastSyncUp {
                    device: device_key.clone(),
                },
                Status::Success,
            ));
        }
    }

    fn player_properties_changed(
        &mut self,
        path: &str,
        props: Vec<PlayerProperty>,
        out: &mut Vec<Emit>,
    ) {
        let Some((adapter_key, device_key)) = self.owner_device_key(path) else {
            return;
        };
        let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
        let device = adapter.devices.get_mut(&device_key).expect("device");
        let player_key = PlayerPath::from(path);
        if !device.players.contains_key(&player_key) {
            tracing::error!(
                "player not found for path '{}' on device '{}'",
                path,
                device_key
            );
            return;
        }
        apply_player_properties(device, &player_key, props, out);
    }

    fn device_connected(&mut self, path: &str, bearer: Option<&str>, out: &mut Vec<Emit>) {
        let Some((adapter_key, device_key, bearer)) =
            self.conn_signal_target(path, bearer, "Connected")
        else {
            return;
        };
        let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
        let device = adapter.devices.get_mut(&device_key).expect("device");
        if device.bearers.insert(bearer) {
            tracing::debug!("device '{}' bearer {} set", path, bearer.as_tag());
        }
        tracing::info!("device '{}' connected via '{}'", path, bearer.as_tag());
        out.push((
            Event::DeviceConnected {
                adapter: adapter_key,
                device: device_key,
                bearer,
            },
            Status::Success,
        ));
    }

    fn device_disconnected(
        &mut self,
        path: &str,
        bearer: Option<&str>,
        reason: Option<String>,
        out: &mut Vec<Emit>,
    ) {
        let Some((adapter_key, device_key, bearer)) =
            self.conn_signal_target(path, bearer, "Disconnected")
        else {
            return;
        };
        let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
        let device = adapter.devices.get_mut(&device_key).expect("device");
        if device.bearers.remove(bearer) {
            tracing::debug!("device '{}' bearer {} cleared", path, bearer.as_tag());
        }
        tracing::info!(
            "device '{}' disconnected via '{}', reason '{}'",
            path,
            bearer.as_tag(),
            reason.as_deref().unwrap_or("")
        );
        out.push((
            Event::DeviceDisconnected {
                adapter: adapter_key,
                device: device_key,
                bearer,
                reason,
            },
            Status::Success,
        ));
    }

    /// Shared validation for the vendor connect/disconnect signals: lazily
    /// creates the device, suppresses special devices, rejects unknown
    /// bearer tags.
    fn conn_signal_target(
        &mut self,
        path: &str,
        bearer: Option<&str>,
        signal: &str,
    ) -> Option<(AdapterPath, DevicePath, Bearer)> {
        let adapter_key = self.adapter_key_for(path)?;
        let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
        let device_key = DevicePath::from(path);
        let device = adapter
            .devices
            .entry(device_key.clone())
            .or_insert_with(|| Device::new(adapter_key.clone(), device_key.clone()));

        if device.is_special() {
            tracing::warn!(
                "device '{}' is the local broadcast pseudo-device, skipping {} indication",
                path,
                signal
            );
            return None;
        }
        let Some(tag) = bearer else {
            tracing::error!("missing bearer in {} signal for '{}'", signal, path);
            return None;
        };
        let Some(bearer) = Bearer::from_tag(tag) else {
            tracing::error!("unknown bearer '{}' for device '{}'", tag, path);
            return None;
        };
        Some((adapter_key, device_key, bearer))
    }

    fn device_properties_loaded(
        &mut self,
        path: &str,
        props: Vec<DeviceProperty>,
        out: &mut Vec<Emit>,
    ) {
        let device_key = DevicePath::from(path);
        for adapter in self.world.adapters.values_mut() {
            if let Some(device) = adapter.devices.get_mut(&device_key) {
                for prop in props {
                    apply_device_property(device, prop, out);
                }
                return;
            }
        }
    }

    fn call_completed(
        &mut self,
        call: PendingCall,
        result: std::result::Result<(), lea_bus::BusError>,
        now: Instant,
        out: &mut Vec<Emit>,
    ) {
        match call {
            PendingCall::StartDiscovery(adapter_key) => {
                let Some(adapter) = self.world.adapters.get_mut(&adapter_key) else {
                    return;
                };
                match result {
                    Ok(()) => set_discovery_state(adapter, DiscoveryState::Started, now, out),
                    Err(err) if err.is_remote(ERROR_IN_PROGRESS) => {
                        set_discovery_state(adapter, DiscoveryState::Started, now, out)
                    }
                    Err(err) => {
                        tracing::error!("StartDiscovery failed: {}", err);
                        adapter.discovery_state = DiscoveryState::Stopped;
                    }
                }
            }
            PendingCall::StopDiscovery(adapter_key) => {
                let Some(adapter) = self.world.adapters.get_mut(&adapter_key) else {
                    return;
                };
                match result {
                    Ok(()) => set_discovery_state(adapter, DiscoveryState::Stopped, now, out),
                    Err(err) if err.is_remote(ERROR_IN_PROGRESS) => {
                        set_discovery_state(adapter, DiscoveryState::Stopped, now, out)
                    }
                    Err(err) => {
                        tracing::error!("StopDiscovery failed: {}", err);
                        adapter.discovery_state = DiscoveryState::Started;
                    }
                }
            }
            PendingCall::SetPowered { adapter, powered } => {
                // State settles through the PowerState echo, not here.
                if let Err(err) = result {
                    tracing::error!(
                        "failed to set adapter '{}' powered={}: {}",
                        adapter,
                        powered,
                        err
                    );
                }
            }
            PendingCall::Connect(device_key) => {
                if let Err(err) = result {
                    tracing::error!("failed to connect '{}': {}", device_key, err);
                    self.revert_connection_state(&device_key, ConnectionState::Disconnected, out);
                }
            }
            PendingCall::Disconnect(device_key) => {
                if let Err(err) = result {
                    tracing::error!("failed to disconnect '{}': {}", device_key, err);
                    self.revert_connection_state(&device_key, ConnectionState::Connected, out);
                }
            }
            PendingCall::RegisterAdvertisement(adapter_key) => {
                let Some(adapter) = self.world.adapters.get_mut(&adapter_key) else {
                    return;
                };
                match result {
                    Ok(()) => {
                        adapter.advertising = true;
                        tracing::info!("started advertising on '{}'", adapter_key);
                    }
                    Err(err) => tracing::error!("failed to register advertisement: {}", err),
                }
            }
            PendingCall::UnregisterAdvertisement(adapter_key) => {
                let Some(adapter) = self.world.adapters.get_mut(&adapter_key) else {
                    return;
                };
                match result {
                    Ok(()) => {
                        adapter.advertising = false;
                        adapter.advertisement_path = None;
                        tracing::info!("stopped advertising on '{}'", adapter_key);
                    }
                    Err(err) => tracing::error!("failed to unregister advertisement: {}", err),
                }
            }
            PendingCall::SetDiscoveryFilter(adapter_key) => {
                if let Err(err) = result {
                    tracing::error!("SetDiscoveryFilter failed on '{}': {}", adapter_key, err);
                }
            }
            PendingCall::RemoveDevice { device, .. } => {
                if let Err(err) = result {
                    tracing::error!("RemoveDevice failed for '{}': {}", device, err);
                }
            }
            PendingCall::SelectTransport(transport) => {
                if let Err(err) = result {
                    tracing::error!("Select failed for '{}': {}", transport, err);
                }
            }
            PendingCall::UnselectTransport(transport) => {
                if let Err(err) = result {
                    tracing::error!("Unselect failed for '{}': {}", transport, err);
                }
            }
            PendingCall::Player { player, command } => {
                if let Err(err) = result {
                    tracing::error!("{} failed for '{}': {}", command.method_name(), player, err);
                }
            }
        }
    }

    fn revert_connection_state(
        &mut self,
        device_key: &DevicePath,
        state: ConnectionState,
        out: &mut Vec<Emit>,
    ) {
        for adapter in self.world.adapters.values_mut() {
            if let Some(device) = adapter.devices.get_mut(device_key) {
                set_connection_state(device, state, out);
                return;
            }
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Earliest armed deadline in the world, for the worker's wait.
    pub fn next_deadline(&self) -> Option<Instant> {
        let mut next: Option<Instant> = None;
        let mut consider = |deadline: Option<Instant>| {
            if let Some(deadline) = deadline {
                next = Some(match next {
                    Some(current) => current.min(deadline),
                    None => deadline,
                });
            }
        };
        for adapter in self.world.adapters.values() {
            consider(adapter.discovery_deadline);
            for device in adapter.devices.values() {
                consider(device.bcast_debounce_deadline);
            }
        }
        next
    }

    /// Fire every deadline at or before `now`.
    pub fn handle_timers(&mut self, now: Instant) -> Vec<Emit> {
        let mut out = Vec::new();

        let due: Vec<AdapterPath> = self
            .world
            .adapters
            .iter()
            .filter(|(_, a)| a.discovery_deadline.is_some_and(|d| d <= now))
            .map(|(k, _)| k.clone())
            .collect();
        for adapter_key in due {
            {
                let adapter = self.world.adapters.get_mut(&adapter_key).expect("adapter");
                adapter.discovery_deadline = None;
                adapter.discovery_devices_found = 0;
                tracing::info!("adapter '{}' discovery timeout reached", adapter_key);
            }
            let _ = self.stop_discovery(&adapter_key, now, &mut out);
            out.push((
                Event::DiscoveryComplete {
                    adapter: adapter_key,
                },
                Status::Success,
            ));
        }

        let due: Vec<(AdapterPath, DevicePath)> = self
            .world
            .adapters
            .iter()
            .flat_map(|(ak, a)| {
                a.devices
                    .iter()
                    .filter(|(_, d)| d.bcast_debounce_deadline.is_some_and(|t| t <= now))
                    .map(|(dk, _)| (ak.clone(), dk.clone()))
            })
            .collect();
        for (adapter_key, device_key) in due {
            self.bcast_debounce_fired(&adapter_key, &device_key, &mut out);
        }

        out
    }

    fn bcast_debounce_fired(
        &mut self,
        adapter_key: &AdapterPath,
        device_key: &DevicePath,
        out: &mut Vec<Emit>,
    ) {
        let adapter = self.world.adapters.get_mut(adapter_key).expect("adapter");
        let transports: Vec<TransportPath> = {
            let Some(device) = adapter.devices.get_mut(device_key) else {
                return;
            };
            device.bcast_debounce_deadline = None;
            device
                .transports
                .values()
                .filter(|t| t.profile == TransportProfile::BapBcastSink)
                .map(|t| t.path.clone())
                .collect()
        };
        tracing::info!("broadcast sink transport count {}", transports.len());
        if transports.is_empty() {
            // Streams vanished while settling; nothing to report.
            return;
        }

        let discovering = adapter.discovery_state == DiscoveryState::Started;
        let has_connected = !adapter.connected_devices().is_empty();
        let method = if discovering || !has_connected {
            BcastDiscoveryMethod::SinkScan
        } else {
            BcastDiscoveryMethod::Assistant
        };
        out.push((
            Event::BcastDiscovered {
                device: device_key.clone(),
                method,
                transports,
            },
            Status::Success,
        ));
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub fn power_on(&mut self, adapter_key: &AdapterPath) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let adapter = self.world.adapters.get_mut(adapter_key).ok_or(Error::Fail)?;
        if adapter.powered {
            tracing::warn!("adapter '{}' is already powered on", adapter_key);
            return Ok(());
        }
        bus.set_powered(adapter_key, true);
        Ok(())
    }

    pub fn power_off(&mut self, adapter_key: &AdapterPath) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let adapter = self.world.adapters.get_mut(adapter_key).ok_or(Error::Fail)?;
        if !adapter.powered {
            tracing::warn!("adapter '{}' is already powered off", adapter_key);
            return Ok(());
        }
        bus.set_powered(adapter_key, false);
        Ok(())
    }

    pub fn start_discovery(
        &mut self,
        adapter_key: &AdapterPath,
        now: Instant,
        out: &mut Vec<Emit>,
    ) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let adapter = self.world.adapters.get_mut(adapter_key).ok_or(Error::Fail)?;
        match adapter.discovery_state {
            DiscoveryState::Started => return Ok(()),
            DiscoveryState::Stopped => {}
            state => {
                tracing::warn!(
                    "adapter '{}' cannot start discovery in state '{}'",
                    adapter_key,
                    state.name()
                );
                return Err(Error::Busy);
            }
        }
        set_discovery_state(adapter, DiscoveryState::Starting, now, out);
        bus.start_discovery(adapter_key);
        Ok(())
    }

    pub fn stop_discovery(
        &mut self,
        adapter_key: &AdapterPath,
        now: Instant,
        out: &mut Vec<Emit>,
    ) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let adapter = self.world.adapters.get_mut(adapter_key).ok_or(Error::Fail)?;
        match adapter.discovery_state {
            DiscoveryState::Stopped => return Ok(()),
            DiscoveryState::Started => {}
            state => {
                tracing::warn!(
                    "adapter '{}' cannot stop discovery in state '{}'",
                    adapter_key,
                    state.name()
                );
                return Err(Error::Busy);
            }
        }
        set_discovery_state(adapter, DiscoveryState::Stopping, now, out);
        bus.stop_discovery(adapter_key);
        Ok(())
    }

    pub fn set_discovery_filter(
        &mut self,
        adapter_key: &AdapterPath,
        filter: DiscoveryFilter,
    ) -> Result<()> {
        if !(-127..=20).contains(&filter.rssi_floor) {
            return Err(Error::InvalidArgs);
        }
        let bus = Arc::clone(&self.bus);
        let adapter = self.world.adapters.get_mut(adapter_key).ok_or(Error::Fail)?;
        let args = DiscoveryFilterArgs {
            rssi: filter.rssi_floor,
            pattern: filter.pattern.clone(),
            service_uuids: filter.service_uuids.clone(),
        };
        adapter.discovery_filter = Some(filter);
        bus.set_discovery_filter(adapter_key, Some(args));
        Ok(())
    }

    pub fn clear_discovery_filter(&mut self, adapter_key: &AdapterPath) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let adapter = self.world.adapters.get_mut(adapter_key).ok_or(Error::Fail)?;
        adapter.discovery_filter = None;
        bus.set_discovery_filter(adapter_key, None);
        Ok(())
    }

    pub fn set_discoverable(&mut self, adapter_key: &AdapterPath, value: bool) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let adapter = self.world.adapters.get_mut(adapter_key).ok_or(Error::Fail)?;
        if adapter.discoverable == value {
            tracing::warn!(
                "adapter '{}' is already {}",
                adapter_key,
                if value { "discoverable" } else { "undiscoverable" }
            );
            return Ok(());
        }
        bus.write_adapter_property(adapter_key, AdapterWrite::Discoverable(value))
            .map_err(|err| {
                tracing::error!("failed to set discoverable on '{}': {}", adapter_key, err);
                Error::Fail
            })
    }

    pub fn set_connectable(&mut self, adapter_key: &AdapterPath, value: bool) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let adapter = self.world.adapters.get_mut(adapter_key).ok_or(Error::Fail)?;
        if adapter.connectable == value {
            tracing::warn!(
                "adapter '{}' is already {}",
                adapter_key,
                if value { "connectable" } else { "unconnectable" }
            );
            return Ok(());
        }
        bus.write_adapter_property(adapter_key, AdapterWrite::Connectable(value))
            .map_err(|err| {
                tracing::error!("failed to set connectable on '{}': {}", adapter_key, err);
                Error::Fail
            })
    }

    pub fn set_alias(&mut self, adapter_key: &AdapterPath, alias: &str) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        self.world.adapters.get_mut(adapter_key).ok_or(Error::Fail)?;
        bus.write_adapter_property(adapter_key, AdapterWrite::Alias(alias.to_owned()))
            .map_err(|err| {
                tracing::error!("failed to set alias on '{}': {}", adapter_key, err);
                Error::Fail
            })
    }

    pub fn start_advertising(
        &mut self,
        adapter_key: &AdapterPath,
        advertisement: &Advertisement,
    ) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let adapter = self.world.adapters.get_mut(adapter_key).ok_or(Error::Fail)?;
        if adapter.advertising {
            tracing::warn!("adapter '{}' is already advertising", adapter_key);
            return Err(Error::Busy);
        }
        adapter.advertisement_path = Some(advertisement.path().to_owned());
        bus.register_advertisement(adapter_key, advertisement);
        Ok(())
    }

    pub fn stop_advertising(&mut self, adapter_key: &AdapterPath) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let adapter = self.world.adapters.get_mut(adapter_key).ok_or(Error::Fail)?;
        if !adapter.advertising {
            tracing::error!("adapter '{}' is not advertising", adapter_key);
            return Err(Error::Fail);
        }
        let path = adapter.advertisement_path.clone().ok_or(Error::Fail)?;
        bus.unregister_advertisement(adapter_key, &path);
        Ok(())
    }

    pub fn remove_device(&mut self, device_key: &DevicePath) -> Result<()> {
        let (adapter_key, _) = self
            .owner_device_key(device_key.as_str())
            .ok_or(Error::Fail)?;
        tracing::debug!("removing device '{}'", device_key);
        self.bus.remove_device(&adapter_key, device_key);
        Ok(())
    }

    pub fn connect_sync(&mut self, device_key: &DevicePath, out: &mut Vec<Emit>) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let device = self.device_mut(device_key).ok_or(Error::Fail)?;
        if device.connection_state != ConnectionState::Disconnected {
            return Err(Error::Fail);
        }
        tracing::debug!("connecting '{}'", device_key);
        bus.connect_device_blocking(device_key).map_err(|err| {
            tracing::error!("failed to connect device '{}': {}", device_key, err);
            Error::Fail
        })?;
        let device = self.device_mut(device_key).ok_or(Error::Fail)?;
        set_connection_state(device, ConnectionState::Connected, out);
        Ok(())
    }

    pub fn disconnect_sync(&mut self, device_key: &DevicePath, out: &mut Vec<Emit>) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let device = self.device_mut(device_key).ok_or(Error::Fail)?;
        if device.connection_state != ConnectionState::Connected {
            return Err(Error::Fail);
        }
        tracing::debug!("disconnecting '{}'", device_key);
        bus.disconnect_device_blocking(device_key).map_err(|err| {
            tracing::error!("failed to disconnect device '{}': {}", device_key, err);
            Error::Fail
        })?;
        let device = self.device_mut(device_key).ok_or(Error::Fail)?;
        set_connection_state(device, ConnectionState::Disconnected, out);
        Ok(())
    }

    /// Optimistic asynchronous connect; the failure completion reverts to
    /// `Disconnected`.
    pub fn connect(&mut self, device_key: &DevicePath, out: &mut Vec<Emit>) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let device = self.device_mut(device_key).ok_or(Error::Fail)?;
        if device.connection_state != ConnectionState::Disconnected {
            return Ok(());
        }
        set_connection_state(device, ConnectionState::Connecting, out);
        bus.connect_device(device_key);
        Ok(())
    }

    /// Optimistic asynchronous disconnect; the failure completion reverts
    /// to `Connected`.
    pub fn disconnect(&mut self, device_key: &DevicePath, out: &mut Vec<Emit>) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let device = self.device_mut(device_key).ok_or(Error::Fail)?;
        if device.connection_state != ConnectionState::Connected {
            return Ok(());
        }
        set_connection_state(device, ConnectionState::Disconnecting, out);
        bus.disconnect_device(device_key);
        Ok(())
    }

    pub fn player_command(&mut self, player_key: &PlayerPath, command: PlayerCommand) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let player = self.find_player(player_key).ok_or(Error::Fail)?;
        match command {
            PlayerCommand::Play if player.status == PlayerStatus::Playing => {
                tracing::warn!("player '{}' is already playing", player_key);
                return Ok(());
            }
            PlayerCommand::Pause if player.status == PlayerStatus::Paused => {
                tracing::warn!("player '{}' is already paused", player_key);
                return Ok(());
            }
            PlayerCommand::Stop if player.status == PlayerStatus::Stopped => {
                tracing::warn!("player '{}' is already stopped", player_key);
                return Ok(());
            }
            PlayerCommand::Next | PlayerCommand::Previous
                if !matches!(
                    player.status,
                    PlayerStatus::Playing | PlayerStatus::Paused
                ) =>
            {
                tracing::error!(
                    "player '{}' cannot skip tracks in its current status",
                    player_key
                );
                return Err(Error::Fail);
            }
            _ => {}
        }
        bus.player_command(player_key, command);
        Ok(())
    }

    pub fn select_transport(&mut self, transport_key: &TransportPath) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let transport = self.find_transport(transport_key).ok_or(Error::Fail)?;
        if transport.state != TransportState::Idle {
            tracing::error!("transport '{}' is not ready to select", transport_key);
            return Err(Error::Fail);
        }
        bus.select_transport(transport_key);
        Ok(())
    }

    pub fn unselect_transport(&mut self, transport_key: &TransportPath) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let transport = self.find_transport(transport_key).ok_or(Error::Fail)?;
        if transport.state != TransportState::Active {
            tracing::error!("transport '{}' is not ready to unselect", transport_key);
            return Err(Error::Fail);
        }
        bus.unselect_transport(transport_key);
        Ok(())
    }

    pub fn set_volume_percentage(
        &mut self,
        transport_key: &TransportPath,
        percent: f32,
    ) -> Result<()> {
        let bus = Arc::clone(&self.bus);
        let profile = self
            .find_transport(transport_key)
            .ok_or(Error::Fail)?
            .profile;
        let raw = volume_from_percentage(profile, percent)?;
        bus.set_transport_volume(transport_key, raw).map_err(|err| {
            tracing::error!("failed to set volume on '{}': {}", transport_key, err);
            Error::Fail
        })?;
        if let Some(transport) = self.find_transport_mut(transport_key) {
            transport.volume = raw;
        }
        tracing::info!(
            "transport '{}' volume set to {:.1}% ({})",
            transport_key,
            percent,
            raw
        );
        Ok(())
    }

    pub fn start_broadcast_sync(
        &mut self,
        device_key: &DevicePath,
        location: lea_bus::AudioLocation,
    ) -> Result<()> {
        let transports: Vec<TransportPath> = {
            let device = self.device_mut(device_key).ok_or(Error::Fail)?;
            let transports: Vec<TransportPath> = device
                .transports
                .values()
                .filter(|t| t.profile == TransportProfile::BapBcastSink)
                .map(|t| t.path.clone())
                .collect();
            if transports.is_empty() {
                tracing::error!("no broadcast transports available on '{}'", device_key);
                return Err(Error::Fail);
            }
            device.bcast_audio_location = Some(location);
            transports
        };
        tracing::info!(
            "start syncing broadcast with device '{}', location {:?}",
            device_key,
            location
        );

        match location {
            lea_bus::AudioLocation::MonoLeft | lea_bus::AudioLocation::MonoRight => {
                let index = usize::from(location == lea_bus::AudioLocation::MonoRight);
                match transports.get(index) {
                    Some(path) => {
                        let _ = self.select_transport(path);
                    }
                    None => tracing::warn!("no broadcast transport at index {}", index),
                }
            }
            lea_bus::AudioLocation::Stereo => {
                if transports.len() >= 2 {
                    let links: Vec<TransportPath> = transports[1..].to_vec();
                    if let Err(err) = self.bus.link_transports(&transports[0], &links) {
                        tracing::error!("failed to link transports: {}", err);
                    }
                } else {
                    tracing::error!("no need to link transports");
                }
                for path in &transports {
                    let _ = self.select_transport(path);
                }
            }
        }
        Ok(())
    }

    /// Stopping reception has no finer-grained detach: the device is removed
    /// from the adapter entirely.
    pub fn stop_broadcast_sync(&mut self, device_key: &DevicePath) -> Result<()> {
        {
            let device = self.device_mut(device_key).ok_or(Error::Fail)?;
            if device
                .find_transport(TransportProfile::BapBcastSink)
                .is_none()
            {
                tracing::error!("no broadcast transports available on '{}'", device_key);
                return Err(Error::Fail);
            }
        }
        tracing::info!("stop syncing broadcast with device '{}'", device_key);
        self.remove_device(device_key)
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn default_adapter(&self) -> Option<AdapterPath> {
        self.world.adapters.keys().next().cloned()
    }

    fn adapter_key_for(&self, path: &str) -> Option<AdapterPath> {
        self.world
            .adapters
            .keys()
            .find(|key| key.is_prefix_of(path))
            .cloned()
    }

    fn owner_device_key(&self, path: &str) -> Option<(AdapterPath, DevicePath)> {
        for (adapter_key, adapter) in &self.world.adapters {
            if !adapter_key.is_prefix_of(path) {
                continue;
            }
            if let Some(device_key) = adapter
                .devices
                .keys()
                .find(|device_key| device_key.is_prefix_of(path))
            {
                return Some((adapter_key.clone(), device_key.clone()));
            }
        }
        None
    }

    pub fn device(&self, device_key: &DevicePath) -> Option<&Device> {
        self.world
            .adapters
            .values()
            .find_map(|adapter| adapter.devices.get(device_key))
    }

    fn device_mut(&mut self, device_key: &DevicePath) -> Option<&mut Device> {
        self.world
            .adapters
            .values_mut()
            .find_map(|adapter| adapter.devices.get_mut(device_key))
    }

    pub fn find_player(&self, player_key: &PlayerPath) -> Option<&Player> {
        self.world.adapters.values().find_map(|adapter| {
            adapter
                .devices
                .values()
                .find_map(|device| device.players.get(player_key))
        })
    }

    pub fn find_transport(&self, transport_key: &TransportPath) -> Option<&Transport> {
        self.world.adapters.values().find_map(|adapter| {
            adapter
                .broadcast_source
                .as_ref()
                .filter(|t| &t.path == transport_key)
                .or_else(|| {
                    adapter
                        .devices
                        .values()
                        .find_map(|device| device.transports.get(transport_key))
                })
        })
    }

    fn find_transport_mut(&mut self, transport_key: &TransportPath) -> Option<&mut Transport> {
        self.world.adapters.values_mut().find_map(|adapter| {
            adapter
                .broadcast_source
                .as_mut()
                .filter(|t| &t.path == transport_key)
                .or_else(|| {
                    adapter
                        .devices
                        .values_mut()
                        .find_map(|device| device.transports.get_mut(transport_key))
                })
        })
    }

    fn deliver_discovery_result(
        &mut self,
        adapter_key: &AdapterPath,
        device_key: &DevicePath,
        out: &mut Vec<Emit>,
    ) {
        let stop = {
            let adapter = self.world.adapters.get_mut(adapter_key).expect("adapter");
            let Some(device) = adapter.devices.get(device_key) else {
                return;
            };
            if device.connection_state != ConnectionState::Disconnected {
                return;
            }
            if !adapter.matches_discovery_filter(device) {
                return;
            }
            out.push((
                Event::DiscoveryResult {
                    adapter: adapter_key.clone(),
                    device: device_key.clone(),
                },
                Status::Success,
            ));
            match &adapter.discovery_filter {
                Some(filter) if filter.max_devices > 0 => {
                    adapter.discovery_devices_found += 1;
                    adapter.discovery_devices_found >= filter.max_devices
                }
                _ => false,
            }
        };
        if stop {
            tracing::info!("max devices found, stopping discovery");
            let _ = self.stop_discovery(adapter_key, Instant::now(), out);
            out.push((
                Event::DiscoveryComplete {
                    adapter: adapter_key.clone(),
                },
                Status::Success,
            ));
        }
    }
}

// ----------------------------------------------------------------------
// Property application
// ----------------------------------------------------------------------

fn apply_adapter_property(adapter: &mut Adapter, prop: AdapterProperty, out: &mut Vec<Emit>) {
    match prop {
        AdapterProperty::Address(address) => adapter.address = Some(address),
        AdapterProperty::Alias(alias) => adapter.alias = Some(alias),
        AdapterProperty::Powered(powered) => adapter.powered = powered,
        AdapterProperty::PowerState(state) => {
            tracing::info!(
                "adapter '{}' power state changed to '{}'",
                adapter.path,
                state.name()
            );
            adapter.power_state = state;
            match state {
                PowerState::On => out.push((
                    Event::PowerOnCnf {
                        adapter: adapter.path.clone(),
                    },
                    Status::Success,
                )),
                PowerState::Off => out.push((
                    Event::PowerOffCnf {
                        adapter: adapter.path.clone(),
                    },
                    Status::Success,
                )),
                _ => {}
            }
        }
        AdapterProperty::Discoverable(value) => adapter.discoverable = value,
        AdapterProperty::Connectable(value) => adapter.connectable = value,
        AdapterProperty::Discovering(value) => adapter.discovering = value,
    }
}

fn apply_device_property(device: &mut Device, prop: DeviceProperty, out: &mut Vec<Emit>) {
    match prop {
        DeviceProperty::Address(address) => device.address = Some(address),
        DeviceProperty::AddressType(address_type) => device.address_type = Some(address_type),
        DeviceProperty::Name(name) => device.name = Some(name),
        DeviceProperty::Alias(alias) => device.alias = Some(alias),
        DeviceProperty::Paired(paired) => {
            device.paired = paired;
            device.bonding_state = if paired {
                crate::model::BondingState::Bonded
            } else {
                crate::model::BondingState::None
            };
        }
        DeviceProperty::Trusted(trusted) => device.trusted = trusted,
        DeviceProperty::Connected(connected) => {
            let state = if connected {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            };
            set_connection_state(device, state, out);
        }
        DeviceProperty::Rssi(rssi) => device.rssi = rssi,
        DeviceProperty::TxPower(tx_power) => device.tx_power = tx_power,
        DeviceProperty::Uuids(uuids) => device.uuids = uuids,
        DeviceProperty::ManufacturerData(data) => device.manufacturer_data = data,
        DeviceProperty::ServiceData(data) => device.service_data = data,
    }
}

fn set_connection_state(device: &mut Device, state: ConnectionState, out: &mut Vec<Emit>) {
    if device.connection_state == state {
        return;
    }
    device.connection_state = state;
    tracing::debug!("device '{}' connection state '{}'", device.path, state.name());
    out.push((
        Event::ConnStateChanged {
            adapter: device.adapter.clone(),
            device: device.path.clone(),
            state,
        },
        Status::Success,
    ));
}

/// Apply transport properties on a device-owned transport, emitting the
/// state/volume/QoS events only when the transport is the device's active
/// one.
fn apply_transport_properties(
    device: &mut Device,
    transport_key: &TransportPath,
    props: Vec<TransportProperty>,
    out: &mut Vec<Emit>,
) {
    let is_active = device.active_transport.as_ref() == Some(transport_key);
    let Some(transport) = device.transports.get_mut(transport_key) else {
        return;
    };
    for prop in props {
        match prop {
            TransportProperty::State(state) => {
                transport.state = state;
                tracing::info!("transport '{}' state '{}'", transport_key, state.name());
                if is_active {
                    out.push((
                        Event::TransportStateChanged {
                            transport: transport_key.clone(),
                            state,
                        },
                        Status::Success,
                    ));
                }
            }
            TransportProperty::Volume(volume) => {
                transport.volume = volume;
                tracing::info!(
                    "transport '{}' volume {} ({:.1}%)",
                    transport_key,
                    volume,
                    transport.volume_percentage()
                );
                if is_active {
                    out.push((
                        Event::TransportVolumeChanged {
                            transport: transport_key.clone(),
                            volume_percent: transport.volume_percentage(),
                        },
                        Status::Success,
                    ));
                }
            }
            TransportProperty::Qos(qos) => {
                transport.qos = qos;
                if is_active {
                    out.push((
                        Event::TransportQosUpdated {
                            transport: transport_key.clone(),
                        },
                        Status::Success,
                    ));
                }
            }
            other => apply_bare_transport_property(transport, other),
        }
    }
}

/// Apply one transport property without event context (creation, or the
/// adapter-scoped source).
fn apply_bare_transport_property(transport: &mut Transport, prop: TransportProperty) {
    match prop {
        TransportProperty::Device(path) => transport.device = Some(DevicePath::from(path.as_str())),
        TransportProperty::Uuid(uuid) => {
            tracing::info!("transport '{}' uuid '{}'", transport.path, uuid);
            transport.set_uuid(uuid);
        }
        TransportProperty::Codec(codec) => transport.codec = codec,
        TransportProperty::Configuration(config) => transport.config = config,
        TransportProperty::State(state) => transport.state = state,
        TransportProperty::Delay(delay) => transport.delay = delay,
        TransportProperty::Volume(volume) => transport.volume = volume,
        TransportProperty::Endpoint(endpoint) => transport.endpoint = Some(endpoint),
        TransportProperty::Location(location) => transport.location = location,
        TransportProperty::Metadata(metadata) => transport.metadata = metadata,
        TransportProperty::Qos(qos) => transport.qos = qos,
        TransportProperty::Links(links) => transport.links = links,
    }
}

fn apply_player_properties(
    device: &mut Device,
    player_key: &PlayerPath,
    props: Vec<PlayerProperty>,
    out: &mut Vec<Emit>,
) {
    let is_active = device.active_player.as_ref() == Some(player_key);
    let Some(player) = device.players.get_mut(player_key) else {
        return;
    };
    for prop in props {
        match prop {
            PlayerProperty::Device(_) => {}
            PlayerProperty::Name(name) => player.name = Some(name),
            PlayerProperty::Type(player_type) => player.player_type = Some(player_type),
            PlayerProperty::Status(status) => {
                player.status = status;
                tracing::info!("player '{}' status {:?}", player_key, status);
                if is_active {
                    out.push((
                        Event::PlayerStatusChanged {
                            player: player_key.clone(),
                            status,
                        },
                        Status::Success,
                    ));
                }
            }
            PlayerProperty::Position(position) => player.position = position,
            PlayerProperty::Track(track) => {
                player.track.merge(track);
                if is_active {
                    out.push((
                        Event::PlayerTrackUpdated {
                            player: player_key.clone(),
                        },
                        Status::Success,
                    ));
                }
            }
        }
    }
}

/// Recompute the active player: AVRCP beats MCP. Exactly one of
/// added/removed/updated is emitted when the winner changes.
fn update_active_player(device: &mut Device, out: &mut Vec<Emit>) {
    let old = device.active_player.clone();
    let new = device
        .find_player(lea_bus::PlayerProfile::Avrcp)
        .or_else(|| device.find_player(lea_bus::PlayerProfile::Mcp))
        .map(|p| p.path.clone());
    if old == new {
        return;
    }
    device.active_player = new.clone();
    if let Some(path) = &new {
        tracing::info!("active player updated to '{}'", path);
    }
    match (old, new) {
        (None, Some(path)) => out.push((Event::PlayerAdded { player: path }, Status::Success)),
        (Some(_), None) => out.push((
            Event::PlayerRemoved {
                device: device.path.clone(),
            },
            Status::Success,
        )),
        (Some(_), Some(path)) => {
            out.push((Event::PlayerUpdated { player: path }, Status::Success))
        }
        (None, None) => {}
    }
}

/// Recompute the active transport: a2dp sink beats bap sink.
fn update_active_transport(device: &mut Device, out: &mut Vec<Emit>) {
    let old = device.active_transport.clone();
    let new = device
        .find_transport(TransportProfile::A2dpSink)
        .or_else(|| device.find_transport(TransportProfile::BapSink))
        .map(|t| t.path.clone());
    if old == new {
        return;
    }
    device.active_transport = new.clone();
    if let Some(path) = &new {
        tracing::info!("active transport updated to '{}'", path);
    }
    match (old, new) {
        (None, Some(path)) => {
            out.push((Event::TransportAdded { transport: path }, Status::Success))
        }
        (Some(_), None) => out.push((
            Event::TransportRemoved {
                device: device.path.clone(),
            },
            Status::Success,
        )),
        (Some(_), Some(path)) => {
            out.push((Event::TransportUpdated { transport: path }, Status::Success))
        }
        (None, None) => {}
    }
}

fn set_discovery_state(
    adapter: &mut Adapter,
    state: DiscoveryState,
    now: Instant,
    out: &mut Vec<Emit>,
) {
    if adapter.discovery_state == state {
        return;
    }
    adapter.discovery_state = state;
    tracing::info!(
        "adapter '{}' discovery state changed to '{}'",
        adapter.path,
        state.name()
    );
    out.push((
        Event::DiscoveryStateChanged {
            adapter: adapter.path.clone(),
            state,
        },
        Status::Success,
    ));
    // The timer and counter exist only while discovery is running.
    match state {
        DiscoveryState::Started => {
            if adapter.discovery_deadline.is_none() {
                if let Some(filter) = &adapter.discovery_filter {
                    if !filter.timeout.is_zero() {
                        adapter.discovery_deadline = Some(now + filter.timeout);
                    }
                }
            }
        }
        _ => {
            adapter.discovery_deadline = None;
            adapter.discovery_devices_found = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lea_bus::{AdvertisementKind, AudioLocation, BusCall, BusError, MockBus};

    const HCI0: &str = "/org/bluez/hci0";
    const DEV1: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_01";
    const DEV2: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_02";

    fn hci0() -> AdapterPath {
        AdapterPath::from(HCI0)
    }

    fn dev1() -> DevicePath {
        DevicePath::from(DEV1)
    }

    fn engine() -> (Arc<MockBus>, Engine) {
        let bus = Arc::new(MockBus::new());
        let mut engine = Engine::new(bus.clone());
        engine
            .world
            .adapters
            .insert(hci0(), Adapter::new(hci0()));
        (bus, engine)
    }

    fn evs(emits: Vec<Emit>) -> Vec<Event> {
        emits.into_iter().map(|(event, _)| event).collect()
    }

    fn add_device(engine: &mut Engine, path: &str, props: Vec<DeviceProperty>) -> Vec<Event> {
        evs(engine.handle_event(
            BusEvent::InterfacesAdded {
                path: path.to_owned(),
                interfaces: vec![InterfaceProps::Device(props)],
            },
            Instant::now(),
        ))
    }

    fn add_transport(engine: &mut Engine, path: &str, uuid: &str, now: Instant) -> Vec<Event> {
        evs(engine.handle_event(
            BusEvent::InterfacesAdded {
                path: path.to_owned(),
                interfaces: vec![InterfaceProps::Transport(vec![TransportProperty::Uuid(
                    uuid.to_owned(),
                )])],
            },
            now,
        ))
    }

    fn add_player(engine: &mut Engine, path: &str) -> Vec<Event> {
        evs(engine.handle_event(
            BusEvent::InterfacesAdded {
                path: path.to_owned(),
                interfaces: vec![InterfaceProps::Player(Vec::new())],
            },
            Instant::now(),
        ))
    }

    fn change(engine: &mut Engine, path: &str, props: InterfaceProps) -> Vec<Event> {
        evs(engine.handle_event(
            BusEvent::PropertiesChanged {
                path: path.to_owned(),
                props,
            },
            Instant::now(),
        ))
    }

    fn remove(engine: &mut Engine, path: &str, kind: InterfaceKind) -> Vec<Event> {
        evs(engine.handle_event(
            BusEvent::InterfacesRemoved {
                path: path.to_owned(),
                interfaces: vec![kind],
            },
            Instant::now(),
        ))
    }

    fn complete(
        engine: &mut Engine,
        call: PendingCall,
        result: std::result::Result<(), BusError>,
        now: Instant,
    ) -> Vec<Event> {
        evs(engine.handle_event(BusEvent::CallCompleted { call, result }, now))
    }

    fn started(engine: &mut Engine, now: Instant) {
        let mut out = Vec::new();
        engine.start_discovery(&hci0(), now, &mut out).unwrap();
        complete(engine, PendingCall::StartDiscovery(hci0()), Ok(()), now);
        assert_eq!(
            engine.world.adapters[&hci0()].discovery_state,
            DiscoveryState::Started
        );
    }

    fn remote_error(name: &str) -> BusError {
        BusError {
            name: Some(name.to_owned()),
            message: name.to_owned(),
        }
    }

    // ------------------------------------------------------------------
    // Object lifecycle
    // ------------------------------------------------------------------

    #[test]
    fn presence_tracks_lifecycle_signals() {
        let (_bus, mut engine) = engine();

        add_device(&mut engine, DEV1, vec![DeviceProperty::Name("A".into())]);
        assert!(engine.device(&dev1()).is_some());

        // Duplicate creation is a no-op, existing state is untouched.
        add_device(&mut engine, DEV1, vec![DeviceProperty::Name("B".into())]);
        assert_eq!(engine.device(&dev1()).unwrap().name.as_deref(), Some("A"));

        let events = remove(&mut engine, DEV1, InterfaceKind::Device);
        assert_eq!(
            events,
            vec![Event::DeviceRemoved {
                adapter: hci0(),
                device: dev1()
            }]
        );
        assert!(engine.device(&dev1()).is_none());

        // Removal of an unknown path emits nothing.
        assert!(remove(&mut engine, DEV1, InterfaceKind::Device).is_empty());

        add_device(&mut engine, DEV1, Vec::new());
        assert!(engine.device(&dev1()).is_some());
    }

    #[test]
    fn device_outside_adapter_tree_is_ignored() {
        let (_bus, mut engine) = engine();
        add_device(&mut engine, "/org/bluez/hci9/dev_01_02_03_04_05_06", Vec::new());
        assert!(engine.world.adapters[&hci0()].devices.is_empty());
    }

    #[test]
    fn property_application_is_idempotent() {
        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());

        let first = change(
            &mut engine,
            DEV1,
            InterfaceProps::Device(vec![DeviceProperty::Connected(true)]),
        );
        assert_eq!(
            first,
            vec![Event::ConnStateChanged {
                adapter: hci0(),
                device: dev1(),
                state: ConnectionState::Connected
            }]
        );

        let second = change(
            &mut engine,
            DEV1,
            InterfaceProps::Device(vec![DeviceProperty::Connected(true)]),
        );
        assert!(second.is_empty());
    }

    // ------------------------------------------------------------------
    // Active-entity selection
    // ------------------------------------------------------------------

    #[test]
    fn avrcp_player_wins_regardless_of_order() {
        let avrcp = format!("{DEV1}/avrcp/player0");
        let mcp = format!("{DEV1}/mcp/player1");

        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        let events = add_player(&mut engine, &mcp);
        assert_eq!(
            events,
            vec![Event::PlayerAdded {
                player: PlayerPath::from(mcp.as_str())
            }]
        );
        let events = add_player(&mut engine, &avrcp);
        assert_eq!(
            events,
            vec![Event::PlayerUpdated {
                player: PlayerPath::from(avrcp.as_str())
            }]
        );

        // Opposite order: the avrcp player stays active, no update event.
        let (_bus, mut engine) = self::engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_player(&mut engine, &avrcp);
        assert!(add_player(&mut engine, &mcp).is_empty());
        assert_eq!(
            engine.device(&dev1()).unwrap().active_player().unwrap().path,
            PlayerPath::from(avrcp.as_str())
        );
    }

    #[test]
    fn a2dp_transport_beats_bap_and_reassigns_on_removal() {
        let bap = format!("{DEV1}/fd1");
        let a2dp = format!("{DEV1}/fd2");
        let now = Instant::now();

        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        let events = add_transport(&mut engine, &bap, uuids::SINK_PAC_UUID, now);
        assert_eq!(
            events,
            vec![Event::TransportAdded {
                transport: TransportPath::from(bap.as_str())
            }]
        );
        let events = add_transport(&mut engine, &a2dp, uuids::AUDIO_SINK_UUID, now);
        assert_eq!(
            events,
            vec![Event::TransportUpdated {
                transport: TransportPath::from(a2dp.as_str())
            }]
        );

        // Removing the winner falls back to the bap sink.
        let events = remove(&mut engine, &a2dp, InterfaceKind::MediaTransport);
        assert_eq!(
            events,
            vec![Event::TransportUpdated {
                transport: TransportPath::from(bap.as_str())
            }]
        );

        let events = remove(&mut engine, &bap, InterfaceKind::MediaTransport);
        assert_eq!(events, vec![Event::TransportRemoved { device: dev1() }]);
        assert!(engine.device(&dev1()).unwrap().active_transport.is_none());
    }

    #[test]
    fn background_transports_stay_silent() {
        let bap = format!("{DEV1}/fd1");
        let bcast = format!("{DEV1}/fd2");
        let now = Instant::now();

        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_transport(&mut engine, &bap, uuids::SINK_PAC_UUID, now);
        add_transport(&mut engine, &bcast, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);

        // Not the active transport: no state-change event.
        let events = change(
            &mut engine,
            &bcast,
            InterfaceProps::Transport(vec![TransportProperty::State(TransportState::Pending)]),
        );
        assert!(events.is_empty());

        let events = change(
            &mut engine,
            &bap,
            InterfaceProps::Transport(vec![TransportProperty::State(TransportState::Active)]),
        );
        assert_eq!(
            events,
            vec![Event::TransportStateChanged {
                transport: TransportPath::from(bap.as_str()),
                state: TransportState::Active
            }]
        );
    }

    // ------------------------------------------------------------------
    // Discovery state machine
    // ------------------------------------------------------------------

    #[test]
    fn discovery_walks_through_intermediate_states() {
        let now = Instant::now();
        let (bus, mut engine) = engine();
        let mut out = Vec::new();

        engine.start_discovery(&hci0(), now, &mut out).unwrap();
        assert_eq!(
            evs(std::mem::take(&mut out)),
            vec![Event::DiscoveryStateChanged {
                adapter: hci0(),
                state: DiscoveryState::Starting
            }]
        );
        assert!(bus
            .calls()
            .contains(&BusCall::Async(PendingCall::StartDiscovery(hci0()))));

        // Starting a scan while one is starting is a busy error.
        assert_eq!(
            engine.start_discovery(&hci0(), now, &mut out),
            Err(Error::Busy)
        );

        let events = complete(&mut engine, PendingCall::StartDiscovery(hci0()), Ok(()), now);
        assert_eq!(
            events,
            vec![Event::DiscoveryStateChanged {
                adapter: hci0(),
                state: DiscoveryState::Started
            }]
        );

        // Starting while started is an idempotent success.
        assert_eq!(engine.start_discovery(&hci0(), now, &mut out), Ok(()));
        assert!(out.is_empty());

        engine.stop_discovery(&hci0(), now, &mut out).unwrap();
        assert_eq!(
            evs(std::mem::take(&mut out)),
            vec![Event::DiscoveryStateChanged {
                adapter: hci0(),
                state: DiscoveryState::Stopping
            }]
        );
        let events = complete(&mut engine, PendingCall::StopDiscovery(hci0()), Ok(()), now);
        assert_eq!(
            events,
            vec![Event::DiscoveryStateChanged {
                adapter: hci0(),
                state: DiscoveryState::Stopped
            }]
        );

        // Stopping while stopped succeeds without any event.
        assert_eq!(engine.stop_discovery(&hci0(), now, &mut out), Ok(()));
        assert!(out.is_empty());
    }

    #[test]
    fn in_progress_error_reconciles_to_target_state() {
        let now = Instant::now();
        let (_bus, mut engine) = engine();
        let mut out = Vec::new();
        engine.start_discovery(&hci0(), now, &mut out).unwrap();
        complete(
            &mut engine,
            PendingCall::StartDiscovery(hci0()),
            Err(remote_error(ERROR_IN_PROGRESS)),
            now,
        );
        assert_eq!(
            engine.world.adapters[&hci0()].discovery_state,
            DiscoveryState::Started
        );
    }

    #[test]
    fn start_failure_rolls_back_without_event() {
        let now = Instant::now();
        let (_bus, mut engine) = engine();
        let mut out = Vec::new();
        engine.start_discovery(&hci0(), now, &mut out).unwrap();
        let events = complete(
            &mut engine,
            PendingCall::StartDiscovery(hci0()),
            Err(BusError::local("no adapter")),
            now,
        );
        assert!(events.is_empty());
        assert_eq!(
            engine.world.adapters[&hci0()].discovery_state,
            DiscoveryState::Stopped
        );
    }

    #[test]
    fn discovery_results_respect_rssi_floor() {
        let now = Instant::now();
        let (_bus, mut engine) = engine();
        engine
            .set_discovery_filter(
                &hci0(),
                DiscoveryFilter {
                    rssi_floor: -70,
                    ..DiscoveryFilter::default()
                },
            )
            .unwrap();
        started(&mut engine, now);

        let events = add_device(&mut engine, DEV1, vec![DeviceProperty::Rssi(-80)]);
        assert!(events.is_empty());

        let events = change(
            &mut engine,
            DEV1,
            InterfaceProps::Device(vec![DeviceProperty::Rssi(-60)]),
        );
        assert_eq!(
            events,
            vec![Event::DiscoveryResult {
                adapter: hci0(),
                device: dev1()
            }]
        );
    }

    #[test]
    fn no_results_while_stopped_or_connected() {
        let (_bus, mut engine) = engine();
        assert!(add_device(&mut engine, DEV1, vec![DeviceProperty::Rssi(-40)]).is_empty());

        let now = Instant::now();
        started(&mut engine, now);
        let events = add_device(
            &mut engine,
            DEV2,
            vec![DeviceProperty::Connected(true), DeviceProperty::Rssi(-40)],
        );
        // Connected devices never produce discovery results.
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::DiscoveryResult { .. })));
    }

    #[test]
    fn max_devices_stops_discovery_once() {
        let now = Instant::now();
        let (bus, mut engine) = engine();
        engine
            .set_discovery_filter(
                &hci0(),
                DiscoveryFilter {
                    rssi_floor: -127,
                    max_devices: 1,
                    ..DiscoveryFilter::default()
                },
            )
            .unwrap();
        started(&mut engine, now);

        let events = add_device(&mut engine, DEV1, vec![DeviceProperty::Rssi(-40)]);
        assert_eq!(
            events,
            vec![
                Event::DiscoveryResult {
                    adapter: hci0(),
                    device: dev1()
                },
                Event::DiscoveryStateChanged {
                    adapter: hci0(),
                    state: DiscoveryState::Stopping
                },
                Event::DiscoveryComplete { adapter: hci0() },
            ]
        );
        assert!(bus
            .calls()
            .contains(&BusCall::Async(PendingCall::StopDiscovery(hci0()))));

        let events = complete(&mut engine, PendingCall::StopDiscovery(hci0()), Ok(()), now);
        assert_eq!(
            events,
            vec![Event::DiscoveryStateChanged {
                adapter: hci0(),
                state: DiscoveryState::Stopped
            }]
        );
        assert_eq!(
            engine.world.adapters[&hci0()].discovery_devices_found,
            0
        );
    }

    #[test]
    fn discovery_timeout_fires_on_deadline() {
        let now = Instant::now();
        let (bus, mut engine) = engine();
        engine
            .set_discovery_filter(
                &hci0(),
                DiscoveryFilter {
                    rssi_floor: -127,
                    timeout: Duration::from_secs(5),
                    ..DiscoveryFilter::default()
                },
            )
            .unwrap();
        started(&mut engine, now);
        assert_eq!(engine.next_deadline(), Some(now + Duration::from_secs(5)));

        // Not due yet.
        assert!(engine.handle_timers(now + Duration::from_secs(4)).is_empty());

        let events = evs(engine.handle_timers(now + Duration::from_secs(6)));
        assert_eq!(
            events,
            vec![
                Event::DiscoveryStateChanged {
                    adapter: hci0(),
                    state: DiscoveryState::Stopping
                },
                Event::DiscoveryComplete { adapter: hci0() },
            ]
        );
        assert!(bus
            .calls()
            .contains(&BusCall::Async(PendingCall::StopDiscovery(hci0()))));
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn leaving_started_disarms_the_timeout() {
        let now = Instant::now();
        let (_bus, mut engine) = engine();
        engine
            .set_discovery_filter(
                &hci0(),
                DiscoveryFilter {
                    rssi_floor: -127,
                    timeout: Duration::from_secs(5),
                    ..DiscoveryFilter::default()
                },
            )
            .unwrap();
        started(&mut engine, now);

        let mut out = Vec::new();
        engine.stop_discovery(&hci0(), now, &mut out).unwrap();
        assert_eq!(engine.next_deadline(), None);

        // The stale deadline never fires a stray completion.
        assert!(engine.handle_timers(now + Duration::from_secs(6)).is_empty());
    }

    #[test]
    fn rejects_out_of_range_rssi_floor() {
        let (_bus, mut engine) = engine();
        assert_eq!(
            engine.set_discovery_filter(
                &hci0(),
                DiscoveryFilter {
                    rssi_floor: 40,
                    ..DiscoveryFilter::default()
                }
            ),
            Err(Error::InvalidArgs)
        );
    }

    // ------------------------------------------------------------------
    // Power
    // ------------------------------------------------------------------

    #[test]
    fn power_confirmation_follows_the_echo() {
        let (bus, mut engine) = engine();
        engine.power_on(&hci0()).unwrap();
        assert!(bus.calls().contains(&BusCall::Async(PendingCall::SetPowered {
            adapter: hci0(),
            powered: true
        })));

        // No confirmation until the PowerState property echoes "on".
        let events = change(
            &mut engine,
            HCI0,
            InterfaceProps::Adapter(vec![AdapterProperty::PowerState(PowerState::TurningOn)]),
        );
        assert!(events.is_empty());

        let events = change(
            &mut engine,
            HCI0,
            InterfaceProps::Adapter(vec![
                AdapterProperty::Powered(true),
                AdapterProperty::PowerState(PowerState::On),
            ]),
        );
        assert_eq!(events, vec![Event::PowerOnCnf { adapter: hci0() }]);

        // Already powered: idempotent, no second bus call.
        bus.clear_calls();
        engine.power_on(&hci0()).unwrap();
        assert!(bus.calls().is_empty());
    }

    // ------------------------------------------------------------------
    // Connection tracking
    // ------------------------------------------------------------------

    #[test]
    fn lazy_device_created_on_property_change() {
        let (bus, mut engine) = engine();
        let events = change(
            &mut engine,
            DEV1,
            InterfaceProps::Device(vec![DeviceProperty::Rssi(-50)]),
        );
        assert!(events.is_empty());
        assert!(engine.device(&dev1()).is_some());
        assert!(bus.calls().contains(&BusCall::LoadDeviceProperties(dev1())));

        // The backfill applies through the normal update path.
        evs(engine.handle_event(
            BusEvent::DevicePropertiesLoaded {
                path: DEV1.to_owned(),
                props: vec![DeviceProperty::Name("Earbuds".into())],
            },
            Instant::now(),
        ));
        assert_eq!(
            engine.device(&dev1()).unwrap().name.as_deref(),
            Some("Earbuds")
        );
    }

    #[test]
    fn bearer_signals_drive_the_bitmask() {
        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());

        let events = evs(engine.handle_event(
            BusEvent::DeviceConnected {
                path: DEV1.to_owned(),
                bearer: Some("le".to_owned()),
            },
            Instant::now(),
        ));
        assert_eq!(
            events,
            vec![Event::DeviceConnected {
                adapter: hci0(),
                device: dev1(),
                bearer: Bearer::Le
            }]
        );
        let events = evs(engine.handle_event(
            BusEvent::DeviceConnected {
                path: DEV1.to_owned(),
                bearer: Some("bredr".to_owned()),
            },
            Instant::now(),
        ));
        assert_eq!(events.len(), 1);
        let device = engine.device(&dev1()).unwrap();
        assert!(device.bearers.contains(Bearer::Le));
        assert!(device.bearers.contains(Bearer::BrEdr));

        let events = evs(engine.handle_event(
            BusEvent::DeviceDisconnected {
                path: DEV1.to_owned(),
                bearer: Some("le".to_owned()),
                reason: Some("timeout".to_owned()),
            },
            Instant::now(),
        ));
        assert_eq!(
            events,
            vec![Event::DeviceDisconnected {
                adapter: hci0(),
                device: dev1(),
                bearer: Bearer::Le,
                reason: Some("timeout".to_owned())
            }]
        );
        let device = engine.device(&dev1()).unwrap();
        assert!(!device.bearers.contains(Bearer::Le));
        assert!(device.bearers.contains(Bearer::BrEdr));
    }

    #[test]
    fn unknown_or_missing_bearer_is_dropped_locally() {
        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        let events = evs(engine.handle_event(
            BusEvent::DeviceConnected {
                path: DEV1.to_owned(),
                bearer: Some("infrared".to_owned()),
            },
            Instant::now(),
        ));
        assert!(events.is_empty());
        let events = evs(engine.handle_event(
            BusEvent::DeviceConnected {
                path: DEV1.to_owned(),
                bearer: None,
            },
            Instant::now(),
        ));
        assert!(events.is_empty());
    }

    #[test]
    fn special_device_is_invisible_to_connection_accounting() {
        let (_bus, mut engine) = engine();
        add_device(
            &mut engine,
            DEV1,
            vec![
                DeviceProperty::Uuids(vec![uuids::BROADCAST_AUDIO_ANNOUNCEMENT_UUID.to_owned()]),
                DeviceProperty::Connected(true),
            ],
        );

        // Connected but excluded from connected-device enumeration.
        assert!(engine.world.adapters[&hci0()].connected_devices().is_empty());

        // The explicit connected signal is suppressed entirely.
        let events = evs(engine.handle_event(
            BusEvent::DeviceConnected {
                path: DEV1.to_owned(),
                bearer: Some("le".to_owned()),
            },
            Instant::now(),
        ));
        assert!(events.is_empty());
    }

    #[test]
    fn sync_connect_and_disconnect_advance_state() {
        let (bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        let mut out = Vec::new();

        engine.connect_sync(&dev1(), &mut out).unwrap();
        assert!(bus.calls().contains(&BusCall::ConnectBlocking(dev1())));
        assert_eq!(
            evs(std::mem::take(&mut out)),
            vec![Event::ConnStateChanged {
                adapter: hci0(),
                device: dev1(),
                state: ConnectionState::Connected
            }]
        );

        // Connecting a connected device fails.
        assert_eq!(engine.connect_sync(&dev1(), &mut out), Err(Error::Fail));

        engine.disconnect_sync(&dev1(), &mut out).unwrap();
        assert_eq!(
            engine.device(&dev1()).unwrap().connection_state,
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn sync_connect_failure_leaves_state_alone() {
        let (bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        bus.fail_blocking(BusError::local("page timeout"));
        let mut out = Vec::new();
        assert_eq!(engine.connect_sync(&dev1(), &mut out), Err(Error::Fail));
        assert!(out.is_empty());
        assert_eq!(
            engine.device(&dev1()).unwrap().connection_state,
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn async_disconnect_reverts_on_failure_completion() {
        let now = Instant::now();
        let (bus, mut engine) = engine();
        add_device(&mut engine, DEV1, vec![DeviceProperty::Connected(true)]);
        let mut out = Vec::new();

        engine.disconnect(&dev1(), &mut out).unwrap();
        assert!(bus
            .calls()
            .contains(&BusCall::Async(PendingCall::Disconnect(dev1()))));
        assert_eq!(
            engine.device(&dev1()).unwrap().connection_state,
            ConnectionState::Disconnecting
        );

        let events = complete(
            &mut engine,
            PendingCall::Disconnect(dev1()),
            Err(BusError::local("busy")),
            now,
        );
        assert_eq!(
            events,
            vec![Event::ConnStateChanged {
                adapter: hci0(),
                device: dev1(),
                state: ConnectionState::Connected
            }]
        );
    }

    // ------------------------------------------------------------------
    // Broadcast sync
    // ------------------------------------------------------------------

    #[test]
    fn sync_up_is_latched_and_sync_lost_fires_once() {
        let fd1 = format!("{DEV1}/fd1");
        let fd2 = format!("{DEV1}/fd2");
        let now = Instant::now();
        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_transport(&mut engine, &fd1, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);
        add_transport(&mut engine, &fd2, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);

        let events = change(
            &mut engine,
            &fd1,
            InterfaceProps::Transport(vec![TransportProperty::State(TransportState::Active)]),
        );
        assert_eq!(events, vec![Event::BcastSyncUp { device: dev1() }]);

        // Re-entering active never re-fires the latch.
        change(
            &mut engine,
            &fd1,
            InterfaceProps::Transport(vec![TransportProperty::State(TransportState::Idle)]),
        );
        let events = change(
            &mut engine,
            &fd1,
            InterfaceProps::Transport(vec![TransportProperty::State(TransportState::Active)]),
        );
        assert!(events.is_empty());

        let events = remove(&mut engine, &fd1, InterfaceKind::MediaTransport);
        assert!(events.is_empty());
        let events = remove(&mut engine, &fd2, InterfaceKind::MediaTransport);
        assert_eq!(events, vec![Event::BcastSyncLost { device: dev1() }]);
    }

    #[test]
    fn debounce_reports_by_sink_scan_without_connections() {
        let fd1 = format!("{DEV1}/fd1");
        let now = Instant::now();
        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_transport(&mut engine, &fd1, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);
        assert_eq!(engine.next_deadline(), Some(now + BCAST_DEBOUNCE));

        let events = evs(engine.handle_timers(now + BCAST_DEBOUNCE));
        assert_eq!(
            events,
            vec![Event::BcastDiscovered {
                device: dev1(),
                method: BcastDiscoveryMethod::SinkScan,
                transports: vec![TransportPath::from(fd1.as_str())]
            }]
        );
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn debounce_reports_by_assistant_with_a_connected_device() {
        let fd1 = format!("{DEV1}/fd1");
        let now = Instant::now();
        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV2, vec![DeviceProperty::Connected(true)]);
        add_device(&mut engine, DEV1, Vec::new());
        add_transport(&mut engine, &fd1, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);

        let events = evs(engine.handle_timers(now + BCAST_DEBOUNCE));
        assert_eq!(
            events,
            vec![Event::BcastDiscovered {
                device: dev1(),
                method: BcastDiscoveryMethod::Assistant,
                transports: vec![TransportPath::from(fd1.as_str())]
            }]
        );
    }

    #[test]
    fn debounce_disarms_silently_when_streams_vanish() {
        let fd1 = format!("{DEV1}/fd1");
        let now = Instant::now();
        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_transport(&mut engine, &fd1, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);
        remove(&mut engine, &fd1, InterfaceKind::MediaTransport);

        let events = evs(engine.handle_timers(now + BCAST_DEBOUNCE));
        // The sync-lost event already fired at removal; the timer is mute.
        assert!(events.is_empty());
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn stereo_sync_links_then_selects_every_stream() {
        let fd1 = format!("{DEV1}/fd1");
        let fd2 = format!("{DEV1}/fd2");
        let now = Instant::now();
        let (bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_transport(&mut engine, &fd1, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);
        add_transport(&mut engine, &fd2, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);
        bus.clear_calls();

        engine
            .start_broadcast_sync(&dev1(), AudioLocation::Stereo)
            .unwrap();
        assert_eq!(
            bus.calls(),
            vec![
                BusCall::LinkTransports(
                    TransportPath::from(fd1.as_str()),
                    vec![TransportPath::from(fd2.as_str())]
                ),
                BusCall::Async(PendingCall::SelectTransport(TransportPath::from(
                    fd1.as_str()
                ))),
                BusCall::Async(PendingCall::SelectTransport(TransportPath::from(
                    fd2.as_str()
                ))),
            ]
        );
    }

    #[test]
    fn mono_sync_selects_one_stream() {
        let fd1 = format!("{DEV1}/fd1");
        let fd2 = format!("{DEV1}/fd2");
        let now = Instant::now();
        let (bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_transport(&mut engine, &fd1, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);
        add_transport(&mut engine, &fd2, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);
        bus.clear_calls();

        engine
            .start_broadcast_sync(&dev1(), AudioLocation::MonoRight)
            .unwrap();
        assert_eq!(
            bus.calls(),
            vec![BusCall::Async(PendingCall::SelectTransport(
                TransportPath::from(fd2.as_str())
            ))]
        );
    }

    #[test]
    fn broadcast_sync_requires_sink_transports() {
        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        assert_eq!(
            engine.start_broadcast_sync(&dev1(), AudioLocation::Stereo),
            Err(Error::Fail)
        );
        assert_eq!(engine.stop_broadcast_sync(&dev1()), Err(Error::Fail));
    }

    #[test]
    fn stopping_sync_removes_the_device() {
        let fd1 = format!("{DEV1}/fd1");
        let now = Instant::now();
        let (bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_transport(&mut engine, &fd1, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);

        engine.stop_broadcast_sync(&dev1()).unwrap();
        assert!(bus.calls().contains(&BusCall::Async(PendingCall::RemoveDevice {
            adapter: hci0(),
            device: dev1()
        })));
    }

    // ------------------------------------------------------------------
    // Local broadcast source
    // ------------------------------------------------------------------

    #[test]
    fn adapter_scoped_source_lifecycle() {
        let path = format!("{HCI0}/fd9");
        let now = Instant::now();
        let (_bus, mut engine) = engine();

        add_transport(
            &mut engine,
            &path,
            uuids::BROADCAST_AUDIO_ANNOUNCEMENT_UUID,
            now,
        );
        assert!(engine.world.adapters[&hci0()].broadcast_source.is_some());

        let events = change(
            &mut engine,
            &path,
            InterfaceProps::Transport(vec![TransportProperty::State(
                TransportState::Broadcasting,
            )]),
        );
        assert_eq!(
            events,
            vec![Event::LocalBcastTransportStateChanged {
                adapter: hci0(),
                transport: TransportPath::from(path.as_str()),
                state: TransportState::Broadcasting
            }]
        );

        remove(&mut engine, &path, InterfaceKind::MediaTransport);
        assert!(engine.world.adapters[&hci0()].broadcast_source.is_none());
    }

    #[test]
    fn adapter_scoped_transport_without_announcement_is_dropped() {
        let path = format!("{HCI0}/fd9");
        let now = Instant::now();
        let (_bus, mut engine) = engine();
        add_transport(&mut engine, &path, uuids::AUDIO_SINK_UUID, now);
        assert!(engine.world.adapters[&hci0()].broadcast_source.is_none());
    }

    // ------------------------------------------------------------------
    // Volume, players, selection commands
    // ------------------------------------------------------------------

    #[test]
    fn volume_round_trips_through_the_raw_scale() {
        let fd1 = format!("{DEV1}/fd1");
        let now = Instant::now();
        let (bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_transport(&mut engine, &fd1, uuids::AUDIO_SINK_UUID, now);
        let transport_key = TransportPath::from(fd1.as_str());

        engine.set_volume_percentage(&transport_key, 50.0).unwrap();
        assert!(bus
            .calls()
            .contains(&BusCall::SetTransportVolume(transport_key.clone(), 64)));
        let transport = engine.find_transport(&transport_key).unwrap();
        assert_eq!(transport.volume, 64);
        assert_eq!(transport.volume_percentage(), 50.0);
    }

    #[test]
    fn volume_needs_a_volume_capable_profile() {
        let fd1 = format!("{DEV1}/fd1");
        let now = Instant::now();
        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_transport(&mut engine, &fd1, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);
        assert_eq!(
            engine.set_volume_percentage(&TransportPath::from(fd1.as_str()), 50.0),
            Err(Error::InvalidArgs)
        );
    }

    #[test]
    fn volume_echo_reports_only_the_active_transport() {
        let fd1 = format!("{DEV1}/fd1");
        let now = Instant::now();
        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_transport(&mut engine, &fd1, uuids::AUDIO_SINK_UUID, now);

        let events = change(
            &mut engine,
            &fd1,
            InterfaceProps::Transport(vec![TransportProperty::Volume(64)]),
        );
        assert_eq!(
            events,
            vec![Event::TransportVolumeChanged {
                transport: TransportPath::from(fd1.as_str()),
                volume_percent: 50.0
            }]
        );
    }

    #[test]
    fn player_commands_gate_on_status() {
        let avrcp = format!("{DEV1}/avrcp/player0");
        let (bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_player(&mut engine, &avrcp);
        let player_key = PlayerPath::from(avrcp.as_str());
        bus.clear_calls();

        // Stopped: skipping tracks is refused locally.
        assert_eq!(
            engine.player_command(&player_key, PlayerCommand::Next),
            Err(Error::Fail)
        );
        assert!(bus.calls().is_empty());

        engine
            .player_command(&player_key, PlayerCommand::Play)
            .unwrap();
        assert_eq!(bus.calls().len(), 1);

        change(
            &mut engine,
            &avrcp,
            InterfaceProps::Player(vec![PlayerProperty::Status(PlayerStatus::Playing)]),
        );
        // Already playing: idempotent success without a bus call.
        bus.clear_calls();
        engine
            .player_command(&player_key, PlayerCommand::Play)
            .unwrap();
        assert!(bus.calls().is_empty());
        engine
            .player_command(&player_key, PlayerCommand::Next)
            .unwrap();
        assert_eq!(bus.calls().len(), 1);
    }

    #[test]
    fn player_events_fire_for_the_active_player_only() {
        let avrcp = format!("{DEV1}/avrcp/player0");
        let mcp = format!("{DEV1}/mcp/player1");
        let (_bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_player(&mut engine, &avrcp);
        add_player(&mut engine, &mcp);

        let events = change(
            &mut engine,
            &mcp,
            InterfaceProps::Player(vec![PlayerProperty::Status(PlayerStatus::Playing)]),
        );
        assert!(events.is_empty());

        let events = change(
            &mut engine,
            &avrcp,
            InterfaceProps::Player(vec![
                PlayerProperty::Status(PlayerStatus::Playing),
                PlayerProperty::Track(lea_bus::Track {
                    title: Some("Song".into()),
                    ..lea_bus::Track::default()
                }),
            ]),
        );
        assert_eq!(
            events,
            vec![
                Event::PlayerStatusChanged {
                    player: PlayerPath::from(avrcp.as_str()),
                    status: PlayerStatus::Playing
                },
                Event::PlayerTrackUpdated {
                    player: PlayerPath::from(avrcp.as_str())
                },
            ]
        );
    }

    #[test]
    fn selection_requires_matching_transport_state() {
        let fd1 = format!("{DEV1}/fd1");
        let now = Instant::now();
        let (bus, mut engine) = engine();
        add_device(&mut engine, DEV1, Vec::new());
        add_transport(&mut engine, &fd1, uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID, now);
        let transport_key = TransportPath::from(fd1.as_str());

        // Idle: selectable, not unselectable.
        engine.select_transport(&transport_key).unwrap();
        assert_eq!(
            engine.unselect_transport(&transport_key),
            Err(Error::Fail)
        );

        change(
            &mut engine,
            &fd1,
            InterfaceProps::Transport(vec![TransportProperty::State(TransportState::Active)]),
        );
        bus.clear_calls();
        assert_eq!(engine.select_transport(&transport_key), Err(Error::Fail));
        engine.unselect_transport(&transport_key).unwrap();
        assert_eq!(
            bus.calls(),
            vec![BusCall::Async(PendingCall::UnselectTransport(
                transport_key
            ))]
        );
    }

    // ------------------------------------------------------------------
    // Advertising
    // ------------------------------------------------------------------

    #[test]
    fn advertising_lifecycle() {
        let now = Instant::now();
        let (bus, mut engine) = engine();
        let advertisement = Advertisement::new(AdvertisementKind::Broadcast);

        engine.start_advertising(&hci0(), &advertisement).unwrap();
        assert!(bus.calls().iter().any(|c| matches!(
            c,
            BusCall::RegisterAdvertisement(_, _)
        )));

        complete(
            &mut engine,
            PendingCall::RegisterAdvertisement(hci0()),
            Ok(()),
            now,
        );
        assert!(engine.world.adapters[&hci0()].advertising);

        // Second start while advertising is busy.
        assert_eq!(
            engine.start_advertising(&hci0(), &advertisement),
            Err(Error::Busy)
        );

        engine.stop_advertising(&hci0()).unwrap();
        complete(
            &mut engine,
            PendingCall::UnregisterAdvertisement(hci0()),
            Ok(()),
            now,
        );
        assert!(!engine.world.adapters[&hci0()].advertising);
        assert_eq!(engine.stop_advertising(&hci0()), Err(Error::Fail));
    }

    // ------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------

    #[test]
    fn initialize_builds_the_world_from_the_snapshot() {
        use lea_bus::ManagedObject;
        let now = Instant::now();
        let fd1 = format!("{DEV1}/fd1");
        let bis = format!("{HCI0}/fd9");
        let objects = vec![
            ManagedObject {
                path: HCI0.to_owned(),
                interfaces: vec![InterfaceProps::Adapter(vec![
                    AdapterProperty::Address("00:11:22:33:44:55".to_owned()),
                    AdapterProperty::Powered(true),
                ])],
            },
            ManagedObject {
                path: DEV1.to_owned(),
                interfaces: vec![InterfaceProps::Device(vec![DeviceProperty::Name(
                    "Earbuds".to_owned(),
                )])],
            },
            ManagedObject {
                path: fd1.clone(),
                interfaces: vec![InterfaceProps::Transport(vec![TransportProperty::Uuid(
                    uuids::SINK_PAC_UUID.to_owned(),
                )])],
            },
            ManagedObject {
                path: bis.clone(),
                interfaces: vec![InterfaceProps::Transport(vec![TransportProperty::Uuid(
                    uuids::BROADCAST_AUDIO_ANNOUNCEMENT_UUID.to_owned(),
                )])],
            },
        ];
        let bus = Arc::new(MockBus::with_objects(objects));
        let mut engine = Engine::new(bus);

        assert_eq!(engine.initialize(now), 1);
        let adapter = &engine.world.adapters[&hci0()];
        assert!(adapter.powered);
        assert_eq!(adapter.devices.len(), 1);
        assert!(adapter.broadcast_source.is_some());
        let device = engine.device(&dev1()).unwrap();
        assert_eq!(device.name.as_deref(), Some("Earbuds"));
        assert!(device
            .transports
            .contains_key(&TransportPath::from(fd1.as_str())));
        assert_eq!(
            device.active_transport,
            Some(TransportPath::from(fd1.as_str()))
        );
    }

    #[test]
    fn enumeration_failure_reports_zero_adapters() {
        let bus = Arc::new(MockBus::new());
        bus.fail_enumerate(BusError::local("no daemon"));
        let mut engine = Engine::new(bus);
        assert_eq!(engine.initialize(Instant::now()), 0);
        assert!(engine.world.adapters.is_empty());
    }
}
