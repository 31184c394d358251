//! Typed object-path identifiers
//!
//! Every entity is addressed by its D-Bus object path. Wrapping each kind in
//! its own newtype keeps adapter/device/transport/player keys from being
//! mixed up, while the underlying string stays the stable map key.

use std::fmt;

use crate::address::Address;

macro_rules! path_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(path: impl Into<String>) -> Self {
                Self(path.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether `child` lives underneath this object in the path tree.
            pub fn is_prefix_of(&self, child: &str) -> bool {
                child.starts_with(self.0.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(path: &str) -> Self {
                Self(path.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

path_id!(
    /// Object path of a local controller, e.g. `/org/bluez/hci0`.
    AdapterPath
);
path_id!(
    /// Object path of a remote device, e.g. `/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF`.
    DevicePath
);
path_id!(
    /// Object path of a media transport, e.g. `.../dev_AA_BB_CC_DD_EE_FF/fd0`.
    TransportPath
);
path_id!(
    /// Object path of a media player, e.g. `.../dev_AA_BB_CC_DD_EE_FF/avrcp/player0`.
    PlayerPath
);

impl DevicePath {
    /// Deterministic device path for an address under the given adapter.
    pub fn for_address(adapter: &AdapterPath, address: &Address) -> Self {
        Self(format!("{}/{}", adapter.as_str(), address.path_segment()))
    }

    /// The address encoded in the trailing `dev_XX_..` path segment.
    pub fn address(&self) -> Option<Address> {
        Address::from_path_segment(self.0.rsplit('/').next()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_path_from_address() {
        let adapter = AdapterPath::from("/org/bluez/hci0");
        let addr: Address = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let path = DevicePath::for_address(&adapter, &addr);
        assert_eq!(path.as_str(), "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF");
        assert_eq!(path.address(), Some(addr));
    }

    #[test]
    fn prefix_check() {
        let adapter = AdapterPath::from("/org/bluez/hci0");
        assert!(adapter.is_prefix_of("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF"));
        assert!(!adapter.is_prefix_of("/org/bluez/hci1/dev_AA_BB_CC_DD_EE_FF"));
    }
}
