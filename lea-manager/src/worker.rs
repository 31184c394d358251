//! Background worker loop
//!
//! One thread consumes decoded bus events and fires due timers. It is the
//! only place bus-driven mutation happens; synchronous commands serialize
//! with it on the world lock. Events are dispatched to the registry after
//! the lock is released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use lea_bus::BusEvent;

use crate::engine::Engine;
use crate::registry::CallbackRegistry;

/// Upper bound on one wait, so a shutdown request is noticed promptly even
/// when no timer is armed.
const MAX_WAIT: Duration = Duration::from_millis(500);

pub(crate) fn spawn(
    engine: Arc<Mutex<Engine>>,
    registry: Arc<CallbackRegistry>,
    events: Receiver<BusEvent>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("lea-manager".to_owned())
        .spawn(move || {
            tracing::info!("manager worker started");
            loop {
                if stop.load(Ordering::Acquire) {
                    break;
                }

                let wait = {
                    let engine = engine.lock();
                    match engine.next_deadline() {
                        Some(deadline) => deadline
                            .saturating_duration_since(Instant::now())
                            .min(MAX_WAIT),
                        None => MAX_WAIT,
                    }
                };

                match events.recv_timeout(wait) {
                    Ok(event) => {
                        let emits = engine.lock().handle_event(event, Instant::now());
                        registry.dispatch_all(emits);
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        let emits = engine.lock().handle_timers(Instant::now());
                        registry.dispatch_all(emits);
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::info!("manager worker stopped");
        })
        .expect("spawn manager worker")
}
