//! Recording mock for the [`Bus`] trait
//!
//! Used by downstream tests (enable the `mock` feature). Blocking calls
//! answer with a configurable result; asynchronous calls only record, and
//! the test injects the matching [`crate::event::BusEvent::CallCompleted`]
//! when it wants the completion to land.

use std::sync::Mutex;

use crate::advertisement::Advertisement;
use crate::agent::Agent;
use crate::connection::{AdapterWrite, Bus, DiscoveryFilterArgs};
use crate::error::BusError;
use crate::event::{ManagedObject, PendingCall, PlayerCommand};
use crate::ids::{AdapterPath, DevicePath, PlayerPath, TransportPath};

/// Everything a [`MockBus`] saw, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum BusCall {
    Enumerate,
    LoadDeviceProperties(DevicePath),
    Async(PendingCall),
    SetDiscoveryFilter(AdapterPath, Option<DiscoveryFilterArgs>),
    WriteAdapterProperty(AdapterPath, AdapterWrite),
    ConnectBlocking(DevicePath),
    DisconnectBlocking(DevicePath),
    SetTransportVolume(TransportPath, u16),
    LinkTransports(TransportPath, Vec<TransportPath>),
    RegisterAdvertisement(AdapterPath, String),
    UnregisterAdvertisement(AdapterPath, String),
    RegisterAgent(String),
    UnregisterAgent(String),
    Shutdown,
}

pub struct MockBus {
    calls: Mutex<Vec<BusCall>>,
    /// Returned by `enumerate`.
    pub objects: Mutex<Vec<ManagedObject>>,
    /// Returned by every blocking operation; `Ok(())` by default.
    blocking_result: Mutex<Result<(), BusError>>,
    enumerate_error: Mutex<Option<BusError>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            objects: Mutex::new(Vec::new()),
            blocking_result: Mutex::new(Ok(())),
            enumerate_error: Mutex::new(None),
        }
    }

    pub fn with_objects(objects: Vec<ManagedObject>) -> Self {
        let bus = Self::new();
        *bus.objects.lock().unwrap() = objects;
        bus
    }

    /// Make subsequent blocking calls fail.
    pub fn fail_blocking(&self, error: BusError) {
        *self.blocking_result.lock().unwrap() = Err(error);
    }

    /// Make `enumerate` fail.
    pub fn fail_enumerate(&self, error: BusError) {
        *self.enumerate_error.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> Vec<BusCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: BusCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn blocking(&self) -> Result<(), BusError> {
        self.blocking_result.lock().unwrap().clone()
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for MockBus {
    fn enumerate(&self) -> Result<Vec<ManagedObject>, BusError> {
        self.record(BusCall::Enumerate);
        if let Some(err) = self.enumerate_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.objects.lock().unwrap().clone())
    }

    fn load_device_properties(&self, device: &DevicePath) {
        self.record(BusCall::LoadDeviceProperties(device.clone()));
    }

    fn start_discovery(&self, adapter: &AdapterPath) {
        self.record(BusCall::Async(PendingCall::StartDiscovery(adapter.clone())));
    }

    fn stop_discovery(&self, adapter: &AdapterPath) {
        self.record(BusCall::Async(PendingCall::StopDiscovery(adapter.clone())));
    }

    fn set_discovery_filter(&self, adapter: &AdapterPath, filter: Option<DiscoveryFilterArgs>) {
        self.record(BusCall::SetDiscoveryFilter(adapter.clone(), filter));
    }

    fn set_powered(&self, adapter: &AdapterPath, powered: bool) {
        self.record(BusCall::Async(PendingCall::SetPowered {
            adapter: adapter.clone(),
            powered,
        }));
    }

    fn write_adapter_property(
        &self,
        adapter: &AdapterPath,
        write: AdapterWrite,
    ) -> Result<(), BusError> {
        self.record(BusCall::WriteAdapterProperty(adapter.clone(), write));
        self.blocking()
    }

    fn connect_device(&self, device: &DevicePath) {
        self.record(BusCall::Async(PendingCall::Connect(device.clone())));
    }

    fn disconnect_device(&self, device: &DevicePath) {
        self.record(BusCall::Async(PendingCall::Disconnect(device.clone())));
    }

    fn connect_device_blocking(&self, device: &DevicePath) -> Result<(), BusError> {
        self.record(BusCall::ConnectBlocking(device.clone()));
        self.blocking()
    }

    fn disconnect_device_blocking(&self, device: &DevicePath) -> Result<(), BusError> {
        self.record(BusCall::DisconnectBlocking(device.clone()));
        self.blocking()
    }

    fn remove_device(&self, adapter: &AdapterPath, device: &DevicePath) {
        self.record(BusCall::Async(PendingCall::RemoveDevice {
            adapter: adapter.clone(),
            device: device.clone(),
        }));
    }

    fn select_transport(&self, transport: &TransportPath) {
        self.record(BusCall::Async(PendingCall::SelectTransport(
            transport.clone(),
        )));
    }

    fn unselect_transport(&self, transport: &TransportPath) {
        self.record(BusCall::Async(PendingCall::UnselectTransport(
            transport.clone(),
        )));
    }

    fn set_transport_volume(
        &self,
        transport: &TransportPath,
        volume: u16,
    ) -> Result<(), BusError> {
        self.record(BusCall::SetTransportVolume(transport.clone(), volume));
        self.blocking()
    }

    fn link_transports(
        &self,
        head: &TransportPath,
        links: &[TransportPath],
    ) -> Result<(), BusError> {
        self.record(BusCall::LinkTransports(head.clone(), links.to_vec()));
        self.blocking()
    }

    fn player_command(&self, player: &PlayerPath, command: PlayerCommand) {
        self.record(BusCall::Async(PendingCall::Player {
            player: player.clone(),
            command,
        }));
    }

    fn register_advertisement(&self, adapter: &AdapterPath, advertisement: &Advertisement) {
        self.record(BusCall::RegisterAdvertisement(
            adapter.clone(),
            advertisement.path().to_owned(),
        ));
    }

    fn unregister_advertisement(&self, adapter: &AdapterPath, advertisement_path: &str) {
        self.record(BusCall::UnregisterAdvertisement(
            adapter.clone(),
            advertisement_path.to_owned(),
        ));
    }

    fn register_agent(&self, agent: &Agent) -> Result<(), BusError> {
        self.record(BusCall::RegisterAgent(agent.path().to_owned()));
        self.blocking()
    }

    fn unregister_agent(&self, agent_path: &str) -> Result<(), BusError> {
        self.record(BusCall::UnregisterAgent(agent_path.to_owned()));
        self.blocking()
    }

    fn shutdown(&self) {
        self.record(BusCall::Shutdown);
    }
}
