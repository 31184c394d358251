//! Watch the local LE Audio stack: power the default adapter on, scan with
//! a filter, and print every event the manager emits.
//!
//! Run as root (or with D-Bus policy access to BlueZ):
//!
//! ```sh
//! cargo run --example monitor
//! ```

use std::sync::Arc;
use std::time::Duration;

use lea_manager::{
    DiscoveryFilter, Event, LoggingMode, Manager, MODULE_MASK_ADAPTER, MODULE_MASK_DEVICE,
    MODULE_MASK_PLAYER, MODULE_MASK_TRANSPORT,
};

fn main() -> lea_manager::Result<()> {
    lea_manager::init_logging(LoggingMode::Development).ok();

    let manager = Manager::new()?;
    let adapter = match manager.default_adapter() {
        Some(adapter) => adapter,
        None => {
            eprintln!("no Bluetooth adapter found");
            return Ok(());
        }
    };
    println!("using adapter {adapter}");

    manager.register_callback(
        MODULE_MASK_ADAPTER | MODULE_MASK_DEVICE | MODULE_MASK_PLAYER | MODULE_MASK_TRANSPORT,
        Arc::new(|event, _status| match event {
            Event::DiscoveryResult { device, .. } => println!("found {device}"),
            Event::DeviceConnected { device, bearer, .. } => {
                println!("{device} connected over {}", bearer.as_tag())
            }
            Event::DeviceDisconnected { device, reason, .. } => {
                println!("{device} disconnected ({})", reason.as_deref().unwrap_or("?"))
            }
            other => println!("event: {other:?}"),
        }),
    )?;

    manager.power_on(&adapter)?;
    manager.set_discovery_filter(
        &adapter,
        DiscoveryFilter {
            rssi_floor: -90,
            timeout: Duration::from_secs(30),
            ..DiscoveryFilter::default()
        },
    )?;
    manager.start_discovery(&adapter)?;

    std::thread::sleep(Duration::from_secs(35));
    manager.shutdown();
    Ok(())
}
