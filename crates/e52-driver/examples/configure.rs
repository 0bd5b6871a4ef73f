//! Configure a module, listen for traffic, and send a message.
//!
//! Usage: `cargo run --example configure -- /dev/ttyUSB0`

use std::time::Duration;

use e52_driver::{DriverResult, LoRaModule, SerialConfig};
use e52_protocol::{AtCommand, DeliveryMode};

fn main() -> DriverResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let module = LoRaModule::open(&SerialConfig::new(&path))?;
    module.on_async(|segment| println!("<< {segment}"));

    let info = module.execute(&AtCommand::GetInfo)?;
    println!("module info:\n{info}");

    module.execute(&AtCommand::SetChannel { channel: 13, save: true })?;
    module.execute(&AtCommand::SetOption {
        mode: DeliveryMode::Broadcast,
        save: true,
    })?;

    let confirmation = module.send(b"Hello from the host!")?;
    println!("delivered: {confirmation}");

    // Keep listening for incoming payload for a while.
    std::thread::sleep(Duration::from_secs(10));
    module.shutdown();
    Ok(())
}
