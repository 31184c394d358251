//! BlueZ service UUID vocabulary used by the LE Audio profiles.

/// A2DP audio sink (classic).
pub const AUDIO_SINK_UUID: &str = "0000110b-0000-1000-8000-00805f9b34fb";

/// Sink PAC, carried by BAP unicast sink transports.
pub const SINK_PAC_UUID: &str = "00002bc9-0000-1000-8000-00805f9b34fb";

/// Basic Audio Announcement service, carried by broadcast sink transports.
pub const BASIC_AUDIO_ANNOUNCEMENT_UUID: &str = "00001851-0000-1000-8000-00805f9b34fb";

/// Broadcast Audio Announcement service. A transport with this UUID is a
/// local broadcast source; a device advertising it is the local source's
/// pseudo-device.
pub const BROADCAST_AUDIO_ANNOUNCEMENT_UUID: &str = "00001852-0000-1000-8000-00805f9b34fb";

/// Broadcast Audio Scan service.
pub const BROADCAST_AUDIO_SCAN_UUID: &str = "0000184f-0000-1000-8000-00805f9b34fb";

/// Published Audio Capabilities service.
pub const PUBLISHED_AUDIO_CAPABILITIES_UUID: &str = "00001850-0000-1000-8000-00805f9b34fb";

/// Audio Stream Control service.
pub const AUDIO_STREAM_CONTROL_UUID: &str = "0000184e-0000-1000-8000-00805f9b34fb";

/// Volume Control service.
pub const VOLUME_CONTROL_UUID: &str = "00001844-0000-1000-8000-00805f9b34fb";

/// Microphone Control service.
pub const MICROPHONE_CONTROL_UUID: &str = "0000184d-0000-1000-8000-00805f9b34fb";

/// Common Audio service.
pub const COMMON_AUDIO_UUID: &str = "00001853-0000-1000-8000-00805f9b34fb";

/// Telephony and Media Audio service.
pub const TELEPHONY_MEDIA_AUDIO_UUID: &str = "00001855-0000-1000-8000-00805f9b34fb";
