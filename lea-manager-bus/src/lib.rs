//! BlueZ D-Bus boundary for the LE Audio manager
//!
//! This crate owns everything that touches the wire: zbus proxy definitions
//! for the BlueZ interfaces, decoding of signals and property values into
//! typed per-interface enums, the [`Bus`] trait the manager core drives its
//! commands through, and the production [`ZbusBus`] backend.
//!
//! # Architecture
//!
//! ```text
//! BlueZ (system bus) → ZbusBus signal pumps → decode → BusEvent → mpsc queue
//!                      ZbusBus async calls  → CallCompleted     ↗
//! ```
//!
//! The manager core never sees a `zbus` type: signals and asynchronous call
//! completions arrive as [`BusEvent`] values on an `mpsc` channel, decoded
//! exactly once at this boundary. Unknown property names are silently
//! ignored for forward compatibility; a *known* property carrying a value of
//! the wrong shape is a protocol violation and panics, since it indicates a
//! version mismatch the client cannot safely continue past.

pub mod address;
pub mod advertisement;
pub mod agent;
pub mod connection;
pub mod decode;
pub mod error;
pub mod event;
pub mod ids;
pub mod proxy;
pub mod types;
pub mod uuids;

#[cfg(feature = "mock")]
pub mod mock;

pub use address::Address;
pub use advertisement::{Advertisement, AdvertisementKind, SecondaryChannel};
pub use agent::{Agent, IoCapability};
pub use connection::{AdapterWrite, Bus, DiscoveryFilterArgs, ZbusBus};
pub use error::{BusError, ERROR_IN_PROGRESS};
pub use event::{
    AdapterProperty, BusEvent, DeviceProperty, InterfaceKind, InterfaceProps, ManagedObject,
    PendingCall, PlayerCommand, PlayerProperty, TransportProperty,
};
pub use ids::{AdapterPath, DevicePath, PlayerPath, TransportPath};
pub use types::{
    AudioLocation, Bearer, PlayerProfile, PlayerStatus, PowerState, Track, TransportProfile,
    TransportQos, TransportState,
};

#[cfg(feature = "mock")]
pub use mock::{BusCall, MockBus};
