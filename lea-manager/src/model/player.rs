//! Media player entity

use lea_bus::{DevicePath, PlayerPath, PlayerProfile, PlayerStatus, Track};

/// One media-control endpoint, mirrored from `org.bluez.MediaPlayer1`.
#[derive(Debug, Clone)]
pub struct Player {
    pub path: PlayerPath,
    pub device: DevicePath,
    /// Derived from the object path (`/avrcp/` vs `/mcp/`).
    pub profile: PlayerProfile,
    pub name: Option<String>,
    pub player_type: Option<String>,
    pub status: PlayerStatus,
    pub position: u32,
    pub track: Track,
}

impl Player {
    pub fn new(device: DevicePath, path: PlayerPath) -> Self {
        let profile = PlayerProfile::from_path(path.as_str());
        tracing::debug!("create player '{}' profile {:?}", path, profile);
        Self {
            path,
            device,
            profile,
            name: None,
            player_type: None,
            status: PlayerStatus::Stopped,
            position: 0,
            track: Track::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_comes_from_path() {
        let device = DevicePath::from("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF");
        let avrcp = Player::new(
            device.clone(),
            PlayerPath::from("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/avrcp/player0"),
        );
        assert_eq!(avrcp.profile, PlayerProfile::Avrcp);
        assert_eq!(avrcp.status, PlayerStatus::Stopped);

        let mcp = Player::new(
            device,
            PlayerPath::from("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/mcp/player1"),
        );
        assert_eq!(mcp.profile, PlayerProfile::Mcp);
    }
}
