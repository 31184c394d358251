//! Public manager surface
//!
//! [`Manager`] is the application's entry point: it owns the bus backend,
//! the entity world, the callback registry, and the worker thread. The API
//! is sync-first: commands either block until the daemon answers or fire
//! an asynchronous call whose outcome arrives as an event.
//!
//! # Example
//!
//! ```rust,ignore
//! use lea_manager::{Manager, Event, MODULE_MASK_ADAPTER, MODULE_MASK_DEVICE};
//! use std::sync::Arc;
//!
//! let manager = Manager::new()?;
//! manager.register_callback(
//!     MODULE_MASK_ADAPTER | MODULE_MASK_DEVICE,
//!     Arc::new(|event, _status| println!("{event:?}")),
//! )?;
//!
//! let adapter = manager.default_adapter().expect("no adapter");
//! manager.power_on(&adapter)?;
//! manager.start_discovery(&adapter)?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::Mutex;

use lea_bus::{
    AdapterPath, Advertisement, Agent, AudioLocation, Bus, BusEvent, DevicePath, PlayerCommand,
    PlayerPath, PowerState, TransportPath, TransportProfile, ZbusBus,
};

use crate::engine::{Emit, Engine};
use crate::error::{Error, Result};
use crate::model::{Adapter, Device, DiscoveryFilter, DiscoveryState, Player, Transport};
use crate::registry::{
    AudioLocationProvider, CallbackId, CallbackRegistry, EventHandler,
};

/// Client-side manager of the BlueZ LE Audio stack.
pub struct Manager {
    engine: Arc<Mutex<Engine>>,
    registry: Arc<CallbackRegistry>,
    bus: Arc<dyn Bus>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Manager {
    /// Connect to the system bus, enumerate the existing object graph, and
    /// start the worker loop.
    pub fn new() -> Result<Self> {
        let (events_tx, events_rx) = mpsc::channel();
        let bus: Arc<dyn Bus> = Arc::new(ZbusBus::new(events_tx).map_err(|err| {
            tracing::error!("failed to connect to the system bus: {}", err);
            Error::NotReady
        })?);
        Self::with_bus(bus, events_rx)
    }

    /// Build a manager over any [`Bus`] implementation. The implementation
    /// delivers decoded signals and call completions through `events`.
    pub fn with_bus(bus: Arc<dyn Bus>, events: Receiver<BusEvent>) -> Result<Self> {
        let mut engine = Engine::new(Arc::clone(&bus));
        engine.initialize(Instant::now());

        let engine = Arc::new(Mutex::new(engine));
        let registry = Arc::new(CallbackRegistry::new());
        let stop = Arc::new(AtomicBool::new(false));
        let worker = crate::worker::spawn(
            Arc::clone(&engine),
            Arc::clone(&registry),
            events,
            Arc::clone(&stop),
        );

        Ok(Self {
            engine,
            registry,
            bus,
            stop,
            worker: Some(worker),
        })
    }

    /// Run a command under the world lock, then dispatch whatever events it
    /// produced with the lock released.
    fn run<T>(&self, f: impl FnOnce(&mut Engine, &mut Vec<Emit>) -> Result<T>) -> Result<T> {
        let mut out = Vec::new();
        let result = {
            let mut engine = self.engine.lock();
            f(&mut engine, &mut out)
        };
        self.registry.dispatch_all(out);
        result
    }

    // ------------------------------------------------------------------
    // Callbacks
    // ------------------------------------------------------------------

    /// Register a general event handler for the modules in `mask`.
    pub fn register_callback(
        &self,
        mask: crate::event::ModuleMask,
        handler: EventHandler,
    ) -> Result<CallbackId> {
        self.registry.register(mask, handler)
    }

    pub fn unregister_callback(&self, id: CallbackId) -> Result<()> {
        self.registry.unregister(id)
    }

    /// Install the synchronous audio-location provider.
    pub fn set_audio_location_provider(&self, provider: AudioLocationProvider) -> Result<()> {
        self.registry.set_audio_location_provider(provider)
    }

    pub fn clear_audio_location_provider(&self) {
        self.registry.clear_audio_location_provider()
    }

    /// Ask the application which audio location profile `profile` should
    /// render. Fails when no provider is installed.
    pub fn audio_location_config(&self, profile: TransportProfile) -> Result<AudioLocation> {
        self.registry.audio_location(profile)
    }

    // ------------------------------------------------------------------
    // Adapter queries
    // ------------------------------------------------------------------

    pub fn adapters(&self) -> Vec<AdapterPath> {
        self.engine.lock().world.adapters.keys().cloned().collect()
    }

    /// The first adapter found, in path order.
    pub fn default_adapter(&self) -> Option<AdapterPath> {
        self.engine.lock().default_adapter()
    }

    /// Snapshot of one adapter and everything it owns.
    pub fn adapter(&self, adapter: &AdapterPath) -> Option<Adapter> {
        self.engine.lock().world.adapters.get(adapter).cloned()
    }

    pub fn is_powered(&self, adapter: &AdapterPath) -> Option<bool> {
        self.engine
            .lock()
            .world
            .adapters
            .get(adapter)
            .map(|a| a.powered)
    }

    pub fn power_state(&self, adapter: &AdapterPath) -> Option<PowerState> {
        self.engine
            .lock()
            .world
            .adapters
            .get(adapter)
            .map(|a| a.power_state)
    }

    pub fn discovery_state(&self, adapter: &AdapterPath) -> Option<DiscoveryState> {
        self.engine
            .lock()
            .world
            .adapters
            .get(adapter)
            .map(|a| a.discovery_state)
    }

    pub fn is_advertising(&self, adapter: &AdapterPath) -> Option<bool> {
        self.engine
            .lock()
            .world
            .adapters
            .get(adapter)
            .map(|a| a.advertising)
    }

    /// Connected devices, excluding the local broadcast pseudo-device.
    pub fn connected_devices(&self, adapter: &AdapterPath) -> Vec<DevicePath> {
        self.engine
            .lock()
            .world
            .adapters
            .get(adapter)
            .map(|a| {
                a.connected_devices()
                    .into_iter()
                    .map(|d| d.path.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Adapter commands
    // ------------------------------------------------------------------

    /// Request power-on. Confirmation arrives as [`crate::Event::PowerOnCnf`]
    /// once the daemon's power state echoes fully on.
    pub fn power_on(&self, adapter: &AdapterPath) -> Result<()> {
        self.run(|engine, _| engine.power_on(adapter))
    }

    pub fn power_off(&self, adapter: &AdapterPath) -> Result<()> {
        self.run(|engine, _| engine.power_off(adapter))
    }

    pub fn start_discovery(&self, adapter: &AdapterPath) -> Result<()> {
        self.run(|engine, out| engine.start_discovery(adapter, Instant::now(), out))
    }

    pub fn stop_discovery(&self, adapter: &AdapterPath) -> Result<()> {
        self.run(|engine, out| engine.stop_discovery(adapter, Instant::now(), out))
    }

    pub fn set_discovery_filter(
        &self,
        adapter: &AdapterPath,
        filter: DiscoveryFilter,
    ) -> Result<()> {
        self.run(|engine, _| engine.set_discovery_filter(adapter, filter))
    }

    pub fn clear_discovery_filter(&self, adapter: &AdapterPath) -> Result<()> {
        self.run(|engine, _| engine.clear_discovery_filter(adapter))
    }

    pub fn set_discoverable(&self, adapter: &AdapterPath, value: bool) -> Result<()> {
        self.run(|engine, _| engine.set_discoverable(adapter, value))
    }

    pub fn set_connectable(&self, adapter: &AdapterPath, value: bool) -> Result<()> {
        self.run(|engine, _| engine.set_connectable(adapter, value))
    }

    pub fn set_alias(&self, adapter: &AdapterPath, alias: &str) -> Result<()> {
        self.run(|engine, _| engine.set_alias(adapter, alias))
    }

    pub fn start_advertising(
        &self,
        adapter: &AdapterPath,
        advertisement: &Advertisement,
    ) -> Result<()> {
        self.run(|engine, _| engine.start_advertising(adapter, advertisement))
    }

    pub fn stop_advertising(&self, adapter: &AdapterPath) -> Result<()> {
        self.run(|engine, _| engine.stop_advertising(adapter))
    }

    /// Remove a device and its pairing information from its adapter.
    pub fn remove_device(&self, device: &DevicePath) -> Result<()> {
        self.run(|engine, _| engine.remove_device(device))
    }

    // ------------------------------------------------------------------
    // Agent
    // ------------------------------------------------------------------

    /// Register a pairing agent and make it the default agent. The agent
    /// object itself is served by a collaborator.
    pub fn register_agent(&self, agent: &Agent) -> Result<()> {
        self.bus.register_agent(agent).map_err(|err| {
            tracing::error!("failed to register agent '{}': {}", agent.path(), err);
            Error::Fail
        })
    }

    pub fn unregister_agent(&self, agent: &Agent) -> Result<()> {
        self.bus.unregister_agent(agent.path()).map_err(|err| {
            tracing::error!("failed to unregister agent '{}': {}", agent.path(), err);
            Error::Fail
        })
    }

    // ------------------------------------------------------------------
    // Devices
    // ------------------------------------------------------------------

    /// Snapshot of one device and its transports/players.
    pub fn device(&self, device: &DevicePath) -> Option<Device> {
        self.engine.lock().device(device).cloned()
    }

    /// Blocking connect; fails unless the device is disconnected.
    pub fn connect_sync(&self, device: &DevicePath) -> Result<()> {
        self.run(|engine, out| engine.connect_sync(device, out))
    }

    /// Blocking disconnect; fails unless the device is connected.
    pub fn disconnect_sync(&self, device: &DevicePath) -> Result<()> {
        self.run(|engine, out| engine.disconnect_sync(device, out))
    }

    /// Fire-and-forget connect; state advances optimistically and reverts
    /// if the completion reports failure.
    pub fn connect(&self, device: &DevicePath) -> Result<()> {
        self.run(|engine, out| engine.connect(device, out))
    }

    /// Fire-and-forget disconnect, same optimistic contract.
    pub fn disconnect(&self, device: &DevicePath) -> Result<()> {
        self.run(|engine, out| engine.disconnect(device, out))
    }

    /// Start synchronized reception of a device's broadcast streams at the
    /// requested audio location.
    pub fn start_broadcast_sync(
        &self,
        device: &DevicePath,
        location: AudioLocation,
    ) -> Result<()> {
        self.run(|engine, _| engine.start_broadcast_sync(device, location))
    }

    /// Stop synchronized reception; implemented as removing the device.
    pub fn stop_broadcast_sync(&self, device: &DevicePath) -> Result<()> {
        self.run(|engine, _| engine.stop_broadcast_sync(device))
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    pub fn player(&self, player: &PlayerPath) -> Option<Player> {
        self.engine.lock().find_player(player).cloned()
    }

    pub fn active_player(&self, device: &DevicePath) -> Option<Player> {
        self.engine
            .lock()
            .device(device)
            .and_then(|d| d.active_player())
            .cloned()
    }

    pub fn play(&self, player: &PlayerPath) -> Result<()> {
        self.run(|engine, _| engine.player_command(player, PlayerCommand::Play))
    }

    pub fn pause(&self, player: &PlayerPath) -> Result<()> {
        self.run(|engine, _| engine.player_command(player, PlayerCommand::Pause))
    }

    pub fn stop(&self, player: &PlayerPath) -> Result<()> {
        self.run(|engine, _| engine.player_command(player, PlayerCommand::Stop))
    }

    pub fn next(&self, player: &PlayerPath) -> Result<()> {
        self.run(|engine, _| engine.player_command(player, PlayerCommand::Next))
    }

    pub fn previous(&self, player: &PlayerPath) -> Result<()> {
        self.run(|engine, _| engine.player_command(player, PlayerCommand::Previous))
    }

    // ------------------------------------------------------------------
    // Transports
    // ------------------------------------------------------------------

    pub fn transport(&self, transport: &TransportPath) -> Option<Transport> {
        self.engine.lock().find_transport(transport).cloned()
    }

    pub fn active_transport(&self, device: &DevicePath) -> Option<Transport> {
        self.engine
            .lock()
            .device(device)
            .and_then(|d| d.active_transport())
            .cloned()
    }

    /// Select a broadcast stream for reception; the transport must be idle.
    pub fn select_transport(&self, transport: &TransportPath) -> Result<()> {
        self.run(|engine, _| engine.select_transport(transport))
    }

    /// Deselect an acquired broadcast stream; the transport must be active.
    pub fn unselect_transport(&self, transport: &TransportPath) -> Result<()> {
        self.run(|engine, _| engine.unselect_transport(transport))
    }

    /// Link broadcast streams into one group; the first transport carries
    /// the links.
    pub fn link_transports(&self, transports: &[TransportPath]) -> Result<()> {
        if transports.len() < 2 {
            tracing::error!("no need to link transports");
            return Err(Error::Fail);
        }
        self.bus
            .link_transports(&transports[0], &transports[1..])
            .map_err(|err| {
                tracing::error!("failed to link transports: {}", err);
                Error::Fail
            })
    }

    /// Set the volume as a percentage (0–100), scaled to the transport's
    /// profile range. Fails with [`Error::InvalidArgs`] on profiles without
    /// volume support.
    pub fn set_volume_percentage(&self, transport: &TransportPath, percent: f32) -> Result<()> {
        self.run(|engine, _| engine.set_volume_percentage(transport, percent))
    }

    /// Current volume as a percentage; 0 for profiles without volume
    /// support.
    pub fn volume_percentage(&self, transport: &TransportPath) -> Option<f32> {
        self.engine
            .lock()
            .find_transport(transport)
            .map(|t| t.volume_percentage())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Tear everything down: signal subscriptions, entities, the worker
    /// loop, and finally the bus connection.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        tracing::info!("shutting down");
        self.bus.shutdown();
        self.engine.lock().world.adapters.clear();
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.teardown();
        }
    }
}
