//! Bus-level error type

/// Remote error name BlueZ returns when a discovery start/stop races the
/// daemon's own state; treated as success by the discovery state machine.
pub const ERROR_IN_PROGRESS: &str = "org.bluez.Error.InProgress";

/// A failed bus call.
///
/// `name` preserves the remote D-Bus error name when the failure came from
/// the daemon, since some names (e.g. [`ERROR_IN_PROGRESS`]) change how a
/// completion is reconciled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("bus call failed: {message}")]
pub struct BusError {
    pub name: Option<String>,
    pub message: String,
}

impl BusError {
    /// An error that did not come from the remote side.
    pub fn local(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: message.into(),
        }
    }

    pub fn is_remote(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

impl From<zbus::Error> for BusError {
    fn from(err: zbus::Error) -> Self {
        match &err {
            zbus::Error::MethodError(name, message, _) => Self {
                name: Some(name.to_string()),
                message: message.clone().unwrap_or_else(|| name.to_string()),
            },
            other => Self::local(other.to_string()),
        }
    }
}
