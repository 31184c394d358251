//! LE Audio manager
//!
//! A sync-first client of the BlueZ LE Audio stack: it mirrors the daemon's
//! object graph (adapters, devices, media transports, media players) into
//! typed entities, derives the interesting state (discovery progress,
//! connection and bonding, active player/transport selection, broadcast
//! sync), and fans typed events out to registered callbacks.
//!
//! # Architecture
//!
//! ```text
//! BlueZ signals ─→ lea_bus (decode) ─→ worker loop ─→ engine ─→ entities
//!                                                        │
//!                                  callback registry ←───┘ (events)
//! ```
//!
//! One worker thread applies every bus-driven mutation; synchronous
//! commands run on the caller's thread and serialize with it on the world
//! lock. Callbacks are always invoked with the lock released, so handlers
//! may call back into the manager.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use lea_manager::{Manager, LoggingMode, MODULE_MASK_ADAPTER, MODULE_MASK_DEVICE};
//! use std::sync::Arc;
//!
//! lea_manager::init_logging(LoggingMode::Development)?;
//!
//! let manager = Manager::new()?;
//! manager.register_callback(
//!     MODULE_MASK_ADAPTER | MODULE_MASK_DEVICE,
//!     Arc::new(|event, _status| println!("event: {event:?}")),
//! )?;
//!
//! let adapter = manager.default_adapter().expect("no adapter");
//! manager.power_on(&adapter)?;
//! manager.start_discovery(&adapter)?;
//! ```

mod engine;
mod worker;

pub mod error;
pub mod event;
pub mod logging;
pub mod manager;
pub mod model;
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result, Status};
pub use event::{
    BcastDiscoveryMethod, Event, Module, ModuleMask, MODULE_MASK_ADAPTER, MODULE_MASK_ADV,
    MODULE_MASK_AGENT, MODULE_MASK_ALL, MODULE_MASK_DEVICE, MODULE_MASK_GENERAL,
    MODULE_MASK_PLAYER, MODULE_MASK_TRANSPORT,
};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use manager::Manager;
pub use model::{
    Adapter, BearerSet, BondingState, ConnectionState, Device, DiscoveryFilter, DiscoveryState,
    Player, Transport,
};
pub use registry::{
    AudioLocationProvider, CallbackId, CallbackRegistry, EventHandler, APP_CALLBACK_MAX,
};

// Wire-level vocabulary shared with the bus crate.
pub use lea_bus::{
    uuids, AdapterPath, Address, Advertisement, AdvertisementKind, Agent, AudioLocation, Bearer,
    DevicePath, IoCapability, PlayerPath, PlayerProfile, PlayerStatus, PowerState, SecondaryChannel,
    Track, TransportPath, TransportProfile, TransportQos, TransportState,
};

/// Commonly used types for convenient importing.
pub mod prelude {
    pub use crate::error::{Error, Result, Status};
    pub use crate::event::{BcastDiscoveryMethod, Event, ModuleMask};
    pub use crate::manager::Manager;
    pub use crate::model::{
        Adapter, ConnectionState, Device, DiscoveryFilter, DiscoveryState, Player, Transport,
    };
    pub use lea_bus::{
        AdapterPath, Address, AudioLocation, Bearer, DevicePath, PlayerPath, PlayerProfile,
        PlayerStatus, PowerState, TransportPath, TransportProfile, TransportState,
    };
}
