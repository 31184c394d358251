//! Typed wire vocabulary shared with the manager core
//!
//! BlueZ reports most states as strings. They are mapped to enums exactly
//! once, here, so the core never does string comparison on wire values.

use crate::uuids;

/// Adapter power state, decoded from the `PowerState` property strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    On,
    #[default]
    Off,
    TurningOn,
    TurningOff,
    OffBlocked,
}

impl PowerState {
    /// Unknown strings map to `Off`, matching the most conservative reading.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "on" => PowerState::On,
            "off" => PowerState::Off,
            "off-enabling" => PowerState::TurningOn,
            "on-disabling" => PowerState::TurningOff,
            "off-blocked" => PowerState::OffBlocked,
            _ => PowerState::Off,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PowerState::On => "on",
            PowerState::Off => "off",
            PowerState::TurningOn => "off-enabling",
            PowerState::TurningOff => "on-disabling",
            PowerState::OffBlocked => "off-blocked",
        }
    }
}

/// Media transport state.
///
/// `pending` is streaming but not acquired; `broadcasting` only occurs on
/// transports created by a broadcast sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    Error,
    #[default]
    Idle,
    Pending,
    Broadcasting,
    Active,
}

impl TransportState {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "idle" => TransportState::Idle,
            "pending" => TransportState::Pending,
            "broadcasting" => TransportState::Broadcasting,
            "active" => TransportState::Active,
            _ => TransportState::Error,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransportState::Error => "error",
            TransportState::Idle => "idle",
            TransportState::Pending => "pending",
            TransportState::Broadcasting => "broadcasting",
            TransportState::Active => "active",
        }
    }
}

/// Audio profile of a media transport, derived from its service UUID and
/// never set independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportProfile {
    #[default]
    Null,
    A2dpSink,
    BapSink,
    BapBcastSink,
    BapBcastSrc,
}

impl TransportProfile {
    pub fn from_uuid(uuid: &str) -> Self {
        match uuid {
            uuids::AUDIO_SINK_UUID => TransportProfile::A2dpSink,
            uuids::SINK_PAC_UUID => TransportProfile::BapSink,
            uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID => TransportProfile::BapBcastSink,
            uuids::BROADCAST_AUDIO_ANNOUNCEMENT_UUID => TransportProfile::BapBcastSrc,
            _ => TransportProfile::Null,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransportProfile::Null => "null",
            TransportProfile::A2dpSink => "a2dp_sink",
            TransportProfile::BapSink => "bap_sink",
            TransportProfile::BapBcastSink => "bap_bcast_sink",
            TransportProfile::BapBcastSrc => "bap_bcast_src",
        }
    }
}

/// Control profile of a media player, derived from its object path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerProfile {
    #[default]
    Null,
    Avrcp,
    Mcp,
}

impl PlayerProfile {
    pub fn from_path(path: &str) -> Self {
        if path.contains("/avrcp/") {
            PlayerProfile::Avrcp
        } else if path.contains("/mcp/") {
            PlayerProfile::Mcp
        } else {
            PlayerProfile::Null
        }
    }
}

/// Media player playback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerStatus {
    Playing,
    #[default]
    Stopped,
    Paused,
    ForwardSeek,
    ReverseSeek,
    Error,
}

impl PlayerStatus {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "playing" => PlayerStatus::Playing,
            "stopped" => PlayerStatus::Stopped,
            "paused" => PlayerStatus::Paused,
            "forward-seek" => PlayerStatus::ForwardSeek,
            "reverse-seek" => PlayerStatus::ReverseSeek,
            _ => PlayerStatus::Error,
        }
    }
}

/// Physical link a device connection rides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bearer {
    Le,
    BrEdr,
}

impl Bearer {
    /// Parse the `bearer` tag carried by the Connected/Disconnected signals.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "le" => Some(Bearer::Le),
            "bredr" => Some(Bearer::BrEdr),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Bearer::Le => "le",
            Bearer::BrEdr => "bredr",
        }
    }
}

/// Requested rendering locations when syncing to a broadcast source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioLocation {
    MonoLeft,
    MonoRight,
    Stereo,
}

/// QoS parameters of a media transport, decoded from the `QoS` dict.
///
/// Broadcast-only fields stay zero for unicast transports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportQos {
    pub big: u8,
    pub bis: u8,
    pub sync_factor: u8,
    pub packing: u8,
    pub framing: u8,
    pub encryption: u8,
    pub bcode: Vec<u8>,
    pub options: u8,
    pub skip: u16,
    pub sync_timeout: u16,
    pub sync_cte_type: u8,
    pub mse: u8,
    pub timeout: u16,
    pub pa_sync: u8,
    /// Frame interval.
    pub interval: u32,
    /// Transport latency.
    pub latency: u16,
    /// Maximum SDU size.
    pub sdu: u16,
    pub phy: u8,
    /// Retransmission effort.
    pub rtn: u8,
    pub presentation_delay: u32,
}

/// Current track metadata reported by a media player.
///
/// Fields are `None` when the player's `Track` dict did not carry them, so
/// partial updates can be merged over the previous value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Track {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub number_of_tracks: Option<u32>,
    pub track_number: Option<u32>,
    pub duration: Option<u32>,
    pub image_handle: Option<String>,
}

impl Track {
    /// Overlay the fields present in `update` onto `self`.
    pub fn merge(&mut self, update: Track) {
        macro_rules! take {
            ($field:ident) => {
                if update.$field.is_some() {
                    self.$field = update.$field;
                }
            };
        }
        take!(title);
        take!(artist);
        take!(album);
        take!(genre);
        take!(number_of_tracks);
        take!(track_number);
        take!(duration);
        take!(image_handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_profile_from_uuid() {
        assert_eq!(
            TransportProfile::from_uuid(uuids::AUDIO_SINK_UUID),
            TransportProfile::A2dpSink
        );
        assert_eq!(
            TransportProfile::from_uuid(uuids::SINK_PAC_UUID),
            TransportProfile::BapSink
        );
        assert_eq!(
            TransportProfile::from_uuid(uuids::BASIC_AUDIO_ANNOUNCEMENT_UUID),
            TransportProfile::BapBcastSink
        );
        assert_eq!(
            TransportProfile::from_uuid(uuids::BROADCAST_AUDIO_ANNOUNCEMENT_UUID),
            TransportProfile::BapBcastSrc
        );
        assert_eq!(
            TransportProfile::from_uuid("00001108-0000-1000-8000-00805f9b34fb"),
            TransportProfile::Null
        );
    }

    #[test]
    fn player_profile_from_path() {
        assert_eq!(
            PlayerProfile::from_path("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/avrcp/player0"),
            PlayerProfile::Avrcp
        );
        assert_eq!(
            PlayerProfile::from_path("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/mcp/player1"),
            PlayerProfile::Mcp
        );
        assert_eq!(
            PlayerProfile::from_path("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/sep1"),
            PlayerProfile::Null
        );
    }

    #[test]
    fn wire_states_fall_back() {
        assert_eq!(PowerState::from_wire("warming-up"), PowerState::Off);
        assert_eq!(TransportState::from_wire("unheard-of"), TransportState::Error);
        assert_eq!(PlayerStatus::from_wire("scrubbing"), PlayerStatus::Error);
        assert_eq!(Bearer::from_tag("infrared"), None);
    }

    #[test]
    fn track_merge_keeps_absent_fields() {
        let mut track = Track {
            title: Some("First".into()),
            artist: Some("Band".into()),
            ..Track::default()
        };
        track.merge(Track {
            title: Some("Second".into()),
            duration: Some(180_000),
            ..Track::default()
        });
        assert_eq!(track.title.as_deref(), Some("Second"));
        assert_eq!(track.artist.as_deref(), Some("Band"));
        assert_eq!(track.duration, Some(180_000));
    }
}
