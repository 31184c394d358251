//! Media transport entity

use lea_bus::{DevicePath, TransportPath, TransportProfile, TransportQos, TransportState};

use crate::error::{Error, Result};

/// Raw volume ceiling on an AVRCP-controlled (a2dp) transport.
pub const A2DP_VOLUME_MAX: u16 = 0x7F;

/// Raw volume ceiling on a VCP-controlled (bap) transport.
pub const BAP_VOLUME_MAX: u16 = 0xFF;

const PERCENT_MAX: f32 = 100.0;

/// One audio data path, mirrored from `org.bluez.MediaTransport1`.
#[derive(Debug, Clone, Default)]
pub struct Transport {
    pub path: TransportPath,
    /// Device object the transport belongs to, as reported on the wire. The
    /// adapter-scoped broadcast source reports the local pseudo-device.
    pub device: Option<DevicePath>,
    pub uuid: Option<String>,
    /// Derived from `uuid`, never set independently.
    pub profile: TransportProfile,
    pub codec: u8,
    pub config: Vec<u8>,
    pub state: TransportState,
    /// Transport delay in 1/10 ms.
    pub delay: u16,
    /// Raw volume in profile scale.
    pub volume: u16,
    pub endpoint: Option<String>,
    /// Audio location bitmask.
    pub location: u32,
    pub metadata: Vec<u8>,
    pub qos: TransportQos,
    /// Linked broadcast streams sharing a BIG.
    pub links: Vec<String>,
}

impl Transport {
    pub fn new(device: Option<DevicePath>, path: TransportPath) -> Self {
        tracing::debug!("create transport '{}'", path);
        Self {
            path,
            device,
            ..Self::default()
        }
    }

    /// Record the transport UUID and recompute the profile from it.
    pub fn set_uuid(&mut self, uuid: String) {
        self.profile = TransportProfile::from_uuid(&uuid);
        self.uuid = Some(uuid);
    }

    /// Current volume as 0–100, or 0 for profiles without volume support.
    pub fn volume_percentage(&self) -> f32 {
        volume_to_percentage(self.profile, self.volume).unwrap_or(0.0)
    }
}

/// Raw volume → percentage for a profile with volume support.
pub fn volume_to_percentage(profile: TransportProfile, volume: u16) -> Result<f32> {
    let max = raw_volume_max(profile)?;
    Ok((f32::from(volume) * PERCENT_MAX / f32::from(max)).round())
}

/// Percentage (clamped to 0–100) → raw volume for a profile with volume
/// support.
pub fn volume_from_percentage(profile: TransportProfile, percent: f32) -> Result<u16> {
    let max = raw_volume_max(profile)?;
    let percent = percent.clamp(0.0, PERCENT_MAX);
    Ok((percent * f32::from(max) / PERCENT_MAX).round() as u16)
}

fn raw_volume_max(profile: TransportProfile) -> Result<u16> {
    match profile {
        TransportProfile::A2dpSink => Ok(A2DP_VOLUME_MAX),
        TransportProfile::BapSink => Ok(BAP_VOLUME_MAX),
        _ => Err(Error::InvalidArgs),
    }
}
