//! Local LE advertisement
//!
//! The advertisement is a property bag exported onto the bus and handed to
//! BlueZ by object path. The daemon reads the properties back over
//! `org.bluez.LEAdvertisement1`; this client only manages the bag and its
//! register/unregister lifecycle.

use std::collections::HashMap;

/// Default export path when the application does not pick one.
pub const DEFAULT_ADVERTISEMENT_PATH: &str = "/org/bluez/lea_manager/advertisement0";

/// Broadcast vs. connectable peripheral advertising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvertisementKind {
    #[default]
    Peripheral,
    Broadcast,
}

impl AdvertisementKind {
    pub fn as_wire(&self) -> &'static str {
        match self {
            AdvertisementKind::Peripheral => "peripheral",
            AdvertisementKind::Broadcast => "broadcast",
        }
    }
}

/// Secondary advertising channel preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryChannel {
    OneM,
    TwoM,
    Coded,
}

impl SecondaryChannel {
    pub fn as_wire(&self) -> &'static str {
        match self {
            SecondaryChannel::OneM => "1M",
            SecondaryChannel::TwoM => "2M",
            SecondaryChannel::Coded => "Coded",
        }
    }
}

/// The exported advertisement property set.
#[derive(Debug, Clone, Default)]
pub struct Advertisement {
    path: String,
    pub kind: AdvertisementKind,
    pub local_name: Option<String>,
    pub service_uuids: Vec<String>,
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    pub service_data: HashMap<String, Vec<u8>>,
    /// Min/max advertising interval in milliseconds.
    pub min_interval: Option<u32>,
    pub max_interval: Option<u32>,
    pub appearance: Option<u16>,
    pub discoverable: Option<bool>,
    pub discoverable_timeout: Option<u16>,
    pub tx_power: Option<i16>,
    /// Extra fields BlueZ should include, e.g. `"tx-power"`.
    pub includes: Vec<String>,
    pub secondary_channel: Option<SecondaryChannel>,
}

impl Advertisement {
    pub fn new(kind: AdvertisementKind) -> Self {
        Self {
            path: DEFAULT_ADVERTISEMENT_PATH.to_owned(),
            kind,
            ..Self::default()
        }
    }

    /// Export under a custom object path instead of the default.
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    pub fn with_service_uuids(mut self, uuids: Vec<String>) -> Self {
        self.service_uuids = uuids;
        self
    }

    pub fn with_manufacturer_data(mut self, id: u16, data: Vec<u8>) -> Self {
        self.manufacturer_data.insert(id, data);
        self
    }

    pub fn with_service_data(mut self, uuid: impl Into<String>, data: Vec<u8>) -> Self {
        self.service_data.insert(uuid.into(), data);
        self
    }

    pub fn with_interval(mut self, min_ms: u32, max_ms: u32) -> Self {
        self.min_interval = Some(min_ms);
        self.max_interval = Some(max_ms);
        self
    }

    pub fn with_appearance(mut self, appearance: u16) -> Self {
        self.appearance = Some(appearance);
        self
    }

    pub fn with_discoverable(mut self, discoverable: bool) -> Self {
        self.discoverable = Some(discoverable);
        self
    }

    pub fn with_discoverable_timeout(mut self, timeout: u16) -> Self {
        self.discoverable_timeout = Some(timeout);
        self
    }

    pub fn with_tx_power(mut self, tx_power: i16) -> Self {
        self.tx_power = Some(tx_power);
        self
    }

    pub fn with_secondary_channel(mut self, channel: SecondaryChannel) -> Self {
        self.secondary_channel = Some(channel);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}
