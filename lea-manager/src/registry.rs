//! Callback registry
//!
//! A fixed-capacity slot table for general event handlers, filtered by a
//! module bitmask, plus one named slot per single-purpose callback. Handlers
//! are invoked in slot order, always outside the entity-world lock, so a
//! handler may re-enter the manager API.

use std::sync::Arc;

use parking_lot::Mutex;

use lea_bus::{AudioLocation, TransportProfile};

use crate::error::{Error, Result, Status};
use crate::event::{Event, ModuleMask};

/// Maximum number of concurrently registered general-event handlers.
pub const APP_CALLBACK_MAX: usize = 20;

/// General event handler.
pub type EventHandler = Arc<dyn Fn(&Event, Status) + Send + Sync>;

/// Synchronously answers "which audio location should profile X render".
pub type AudioLocationProvider =
    Arc<dyn Fn(TransportProfile) -> Result<AudioLocation> + Send + Sync>;

/// Handle returned by [`CallbackRegistry::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackId(usize);

struct Registration {
    mask: ModuleMask,
    handler: EventHandler,
}

#[derive(Default)]
struct Inner {
    slots: Vec<Option<Registration>>,
    audio_location: Option<AudioLocationProvider>,
}

/// Process-wide callback table; shared behind an `Arc` by the manager and
/// its worker thread.
pub struct CallbackRegistry {
    inner: Mutex<Inner>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: (0..APP_CALLBACK_MAX).map(|_| None).collect(),
                audio_location: None,
            }),
        }
    }

    /// Register a handler for every module whose bit is set in `mask`.
    /// Fails with [`Error::Fail`] when the table is full.
    pub fn register(&self, mask: ModuleMask, handler: EventHandler) -> Result<CallbackId> {
        let mut inner = self.inner.lock();
        let slot = inner
            .slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(Error::Fail)?;
        inner.slots[slot] = Some(Registration { mask, handler });
        tracing::debug!("registered callback slot {} mask {:#010x}", slot, mask);
        Ok(CallbackId(slot))
    }

    /// Unregister a previously registered handler.
    pub fn unregister(&self, id: CallbackId) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.slots.get_mut(id.0) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                Ok(())
            }
            _ => Err(Error::Fail),
        }
    }

    /// Fan one event out to every handler whose mask intersects its module.
    ///
    /// Handlers are snapshotted before invocation so they may register or
    /// unregister callbacks from inside the callback.
    pub fn dispatch(&self, event: &Event, status: Status) {
        let mask = event.module_mask();
        tracing::debug!(
            "dispatch event {:#010x}, module mask {:#010x}",
            event.id(),
            mask
        );
        let handlers: Vec<EventHandler> = {
            let inner = self.inner.lock();
            inner
                .slots
                .iter()
                .flatten()
                .filter(|reg| reg.mask & mask != 0)
                .map(|reg| Arc::clone(&reg.handler))
                .collect()
        };
        for handler in handlers {
            handler(event, status);
        }
    }

    /// Dispatch a batch in order.
    pub fn dispatch_all(&self, events: Vec<(Event, Status)>) {
        for (event, status) in events {
            self.dispatch(&event, status);
        }
    }

    /// Install the audio-location provider. Fails when the slot is occupied.
    pub fn set_audio_location_provider(&self, provider: AudioLocationProvider) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.audio_location.is_some() {
            tracing::error!("audio location provider already registered");
            return Err(Error::Fail);
        }
        inner.audio_location = Some(provider);
        Ok(())
    }

    pub fn clear_audio_location_provider(&self) {
        self.inner.lock().audio_location = None;
    }

    /// Ask the application which audio location to configure for `profile`.
    /// Fails with [`Error::Fail`] when no provider is registered.
    pub fn audio_location(&self, profile: TransportProfile) -> Result<AudioLocation> {
        let provider = self.inner.lock().audio_location.clone();
        match provider {
            Some(provider) => provider(profile),
            None => Err(Error::Fail),
        }
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
