//! In-memory mirror of the remote object graph
//!
//! Entities are arena-held: every Adapter owns its Devices, every Device
//! owns its Transports and Players, and all cross-references (`active_*`,
//! the adapter-scoped broadcast source) are object-path keys into those
//! maps, never pointers. Maps are ordered by path so that selection and
//! enumeration are deterministic.

mod adapter;
mod device;
mod player;
mod transport;

pub use adapter::{Adapter, DiscoveryFilter, DiscoveryState};
pub use device::{BearerSet, BondingState, ConnectionState, Device};
pub use player::Player;
pub use transport::{
    volume_from_percentage, volume_to_percentage, Transport, A2DP_VOLUME_MAX, BAP_VOLUME_MAX,
};
